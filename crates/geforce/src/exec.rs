//! Method dispatch: object binding, reference updates, and the graphics
//! class handlers.
//!
//! Handlers that only latch parameters live with their state in `classes`;
//! the ones here need instance memory, DMA access, or fire a drawing
//! operation. A method bound to the software engine is not executed, it is
//! queued for the host and reported as [`Dispatch::Deferred`].

use memory::MemoryBus;
use tracing::debug;

use crate::classes::{self, Channel, ObjectClass, ENGINE_GRAPHICS, ENGINE_SOFTWARE};
use crate::clock::Clock;
use crate::device::GeForce;
use crate::dma;
use crate::ramht;

/// Outcome of dispatching one method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Executed,
    /// The method went to the software queue; the puller must rewind and
    /// wait for the host to drain it.
    Deferred,
}

impl<C: Clock> GeForce<C> {
    pub(crate) fn execute_method(
        &mut self,
        ch: &mut Channel,
        chid: u32,
        subc: u32,
        method: u32,
        param: u32,
        mem: &mut dyn MemoryBus,
    ) -> Dispatch {
        let subc = subc as usize % ch.subchannels.len();
        let mut software_method = false;

        if method == 0x000 {
            // Binding: flush the notifier back into the outgoing object's
            // context word before the subchannel is repointed.
            if ch.subchannels[subc].engine == ENGINE_GRAPHICS {
                let sch = &ch.subchannels[subc];
                let word1 = self.vram.ramin_read32(sch.object.wrapping_add(0x4));
                let patched = self.layout.pack_notifier(word1, sch.notifier);
                self.vram
                    .ramin_write32(sch.object.wrapping_add(0x4), patched);
            }

            if let Some(binding) = ramht::lookup(&self.vram, &self.layout, self.fifo.ramht, param, chid)
            {
                ch.subchannels[subc].object = binding.object;
                ch.subchannels[subc].engine = binding.engine;
            }

            if ch.subchannels[subc].engine == ENGINE_GRAPHICS {
                let word1 = self
                    .vram
                    .ramin_read32(ch.subchannels[subc].object.wrapping_add(0x4));
                ch.subchannels[subc].notifier = self.layout.unpack_notifier(word1);
            } else if ch.subchannels[subc].engine == ENGINE_SOFTWARE {
                software_method = true;
            }
        } else if method == 0x014 {
            self.fifo.cache1.ref_cnt = param;
        } else if method >= 0x040 {
            if ch.subchannels[subc].engine == ENGINE_GRAPHICS {
                let mut param = param;
                // Methods in this window carry object handles; resolve them
                // to instance addresses before the class handler sees them.
                if (0x060..0x080).contains(&method) {
                    if let Some(binding) =
                        ramht::lookup(&self.vram, &self.layout, self.fifo.ramht, param, chid)
                    {
                        param = binding.object;
                    }
                }

                let class_id =
                    self.vram.ramin_read32(ch.subchannels[subc].object) & self.layout.class_mask;
                match ObjectClass::from_id(class_id) {
                    Some(ObjectClass::Clip) => ch.clip.method(method, param),
                    Some(ObjectClass::MemToMem) => self.exec_m2mf(ch, subc, method, param, mem),
                    Some(ObjectClass::Rop) => {
                        if method == 0x0C0 {
                            ch.rop = param as u8;
                        }
                    }
                    Some(ObjectClass::Pattern) => ch.pattern.method(method, param),
                    Some(ObjectClass::Gdi) => self.exec_gdi(ch, method, param, mem),
                    Some(ObjectClass::ImageBlit) => self.exec_blit(ch, method, param, mem),
                    Some(ObjectClass::ImageFromCpu) => self.exec_ifc(ch, method, param, mem),
                    Some(ObjectClass::Surface2d) => ch.surf2d.method(method, param),
                    Some(ObjectClass::D3d) => self.exec_d3d(ch, class_id, method, param, mem),
                    None => {
                        debug!(class_id, method, "unimplemented object class");
                    }
                }

                if ch.notify_pending {
                    ch.notify_pending = false;
                    let notifier = ch.subchannels[subc].notifier;
                    if self.vram.ramin_read32(notifier) & 0xFF != 0x30 {
                        let time = self.current_time();
                        dma::write64(&mut self.vram, mem, notifier, 0x0, time);
                        dma::write32(&mut self.vram, mem, notifier, 0x8, 0);
                        dma::write32(&mut self.vram, mem, notifier, 0xC, 0);
                    }
                    if ch.notify_type != 0 {
                        self.intr.graph_intr |= 0x0000_0001;
                        self.update_irq();
                        self.graph.nsource |= 0x0000_0001;
                        self.graph.notify = 0x0011_0000;
                    }
                }

                if method == 0x041 {
                    ch.notify_pending = true;
                    ch.notify_type = param;
                } else if method == 0x060 {
                    ch.subchannels[subc].notifier = param;
                }
            } else if ch.subchannels[subc].engine == ENGINE_SOFTWARE {
                software_method = true;
            }
        }

        if software_method {
            self.intr.fifo_intr |= 0x0000_0001;
            self.update_irq();
            self.fifo.cache1.pull0 |= 0x0000_0100;
            self.fifo.cache1.enqueue(subc as u32, method, param);
            Dispatch::Deferred
        } else {
            Dispatch::Executed
        }
    }

    fn exec_m2mf(
        &mut self,
        ch: &mut Channel,
        subc: usize,
        method: u32,
        param: u32,
        mem: &mut dyn MemoryBus,
    ) {
        let m = &mut ch.m2mf;
        match method {
            0x061 => m.src = param,
            0x062 => m.dst = param,
            0x0C3 => m.src_offset = param,
            0x0C4 => m.dst_offset = param,
            0x0C5 => m.src_pitch = param,
            0x0C6 => m.dst_pitch = param,
            0x0C7 => m.line_length = param,
            0x0C8 => m.line_count = param,
            0x0C9 => m.format = param,
            0x0CA => {
                m.buffer_notify = param;
                self.op_m2mf(ch, mem);

                // The copy reports completion through its own notifier
                // record, after the standard one.
                let notifier = ch.subchannels[subc].notifier;
                if self.vram.ramin_read32(notifier) & 0xFF != 0x30 {
                    let time = self.current_time();
                    dma::write64(&mut self.vram, mem, notifier, 0x10, time);
                    dma::write32(&mut self.vram, mem, notifier, 0x18, 0);
                    dma::write32(&mut self.vram, mem, notifier, 0x1C, 0);
                }
            }
            _ => {}
        }
    }

    fn exec_gdi(&mut self, ch: &mut Channel, method: u32, param: u32, mem: &mut dyn MemoryBus) {
        match method {
            0x0BF => ch.gdi.operation = param,
            0x0C0 => ch.gdi.color_fmt = param,
            0x0C1 => ch.gdi.mono_fmt = param,
            0x0FF | 0x17F => ch.gdi.rect_color = param,
            0x17D => ch.gdi.clip_yx0 = param,
            0x17E => ch.gdi.clip_yx1 = param,
            0x100..=0x13F => {
                if method & 1 != 0 {
                    ch.gdi.rect_wh = param;
                    self.op_fill_rect(ch, false, mem);
                } else {
                    ch.gdi.rect_xy = param;
                }
            }
            0x180..=0x1BF => {
                if method & 1 != 0 {
                    ch.gdi.rect_yx1 = param;
                    self.op_fill_rect(ch, true, mem);
                } else {
                    ch.gdi.rect_yx0 = param;
                }
            }
            _ => {}
        }
    }

    fn exec_ifc(&mut self, ch: &mut Channel, method: u32, param: u32, mem: &mut dyn MemoryBus) {
        match method {
            0x061 => {
                ch.ifc.color_key_enable = self.vram.ramin_read32(param) & 0xFF != 0x30;
            }
            0x0BF => ch.ifc.operation = param,
            0x0C0 => {
                ch.ifc.color_fmt = param;
                ch.ifc.color_bytes = classes::color_bytes_for(ch.surf2d.color_fmt, param);
            }
            0x0C1 => ch.ifc.yx = param,
            0x0C2 => ch.ifc.dhw = param,
            0x0C3 => {
                ch.ifc.shw = param;
                // A 1024x4096 image onto a 4-byte 4096-pitch surface is the
                // framebuffer-upload pattern: stream the words straight
                // through instead of collecting them.
                ch.ifc.upload = param == 0x1000_0400
                    && ch.ifc.dhw == 0x1000_0400
                    && ch.surf2d.color_fmt == 0xB
                    && ch.surf2d.pitch == 0x1000_1000;
                if ch.ifc.upload {
                    let dx = ch.ifc.yx & 0xFFFF;
                    let dy = ch.ifc.yx >> 16;
                    ch.ifc.upload_offset = ch
                        .surf2d
                        .ofs_dst
                        .wrapping_add((dy << 12) | (dx << 2));
                } else {
                    let width = param & 0xFFFF;
                    let height = param >> 16;
                    let bytes = width.wrapping_mul(height).wrapping_mul(ch.ifc.color_bytes);
                    ch.ifc.expected = bytes.div_ceil(4);
                    ch.ifc.words = Vec::new();
                }
            }
            0x100..=0x7FF => {
                if ch.ifc.upload {
                    dma::write32(
                        &mut self.vram,
                        mem,
                        ch.surf2d.img_dst,
                        ch.ifc.upload_offset,
                        param,
                    );
                    ch.ifc.upload_offset = ch.ifc.upload_offset.wrapping_add(4);
                } else if (ch.ifc.words.len() as u32) < ch.ifc.expected {
                    ch.ifc.words.push(param);
                    if ch.ifc.words.len() as u32 == ch.ifc.expected {
                        self.op_ifc(ch, mem);
                        ch.ifc.words = Vec::new();
                        ch.ifc.expected = 0;
                    }
                }
            }
            _ => {}
        }
    }

    fn exec_blit(&mut self, ch: &mut Channel, method: u32, param: u32, mem: &mut dyn MemoryBus) {
        match method {
            0x061 => {
                ch.blit.color_key_enable = self.vram.ramin_read32(param) & 0xFF != 0x30;
            }
            0x0BF => ch.blit.operation = param,
            0x0C0 => ch.blit.syx = param,
            0x0C1 => ch.blit.dyx = param,
            0x0C2 => {
                ch.blit.hw = param;
                self.op_copyarea(ch, mem);
            }
            _ => {}
        }
    }

    fn exec_d3d(
        &mut self,
        ch: &mut Channel,
        class_id: u32,
        method: u32,
        param: u32,
        mem: &mut dyn MemoryBus,
    ) {
        let d = &mut ch.d3d;
        match method {
            0x061 => d.a_obj = param,
            0x062 => d.b_obj = param,
            0x065 => d.color_obj = param,
            0x066 => d.zeta_obj = param,
            0x080 => d.clip_horizontal = param,
            0x081 => d.clip_vertical = param,
            0x082 => {
                d.surface_format = param;
                let (color_fmt, depth_fmt) = if class_id == 0x0097 {
                    (param & 0x0F, (param >> 4) & 0x0F)
                } else {
                    (param & 0x1F, (param >> 5) & 0x07)
                };
                match color_fmt {
                    0x9 => d.color_bytes = 1,
                    0x3 => d.color_bytes = 2,
                    0x4 | 0x5 | 0x8 => d.color_bytes = 4,
                    _ => {}
                }
                match depth_fmt {
                    0x1 => d.depth_bytes = 2,
                    0x2 => d.depth_bytes = 4,
                    _ => {}
                }
            }
            0x083 => d.surface_pitch = param,
            0x084 => d.color_offset = param,
            0x085 => d.zeta_offset = param,
            0x763 => d.zstencil_clear_value = param,
            0x764 => d.color_clear_value = param,
            0x765 => {
                d.clear_surface = param;
                self.op_d3d_clear(ch, mem);
            }
            0x606 => {
                let (v, a, c) = (
                    d.vertex_index as usize,
                    d.attrib_index as usize,
                    d.comp_index as usize,
                );
                d.vertex_data[v % 3][a % 16][c % 4] = f32::from_bits(param);
                d.comp_index += 1;
                if d.comp_index == 4 {
                    d.comp_index = 0;
                    d.attrib_index += 1;
                    if d.attrib_index == 16 {
                        d.attrib_index = 0;
                        d.vertex_index += 1;
                        if d.vertex_index >= 3 {
                            // A full triangle is assembled; rasterization is
                            // not modeled, so just restart the window.
                            d.vertex_index = 0;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
