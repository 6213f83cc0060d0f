//! Drawing operations fired by the class handlers, and the display seam
//! they report damage through.

use std::cell::RefCell;
use std::rc::Rc;

use memory::MemoryBus;

use crate::classes::Channel;
use crate::clock::Clock;
use crate::device::GeForce;
use crate::dma;

/// Region of the destination surface touched by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Receives damage rectangles as operations complete. The scanout path
/// itself (mode timing, plane composition) lives outside this engine.
pub trait DisplaySink {
    fn update(&mut self, rect: DirtyRect);
}

/// Discards damage reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn update(&mut self, _rect: DirtyRect) {}
}

/// Test double that records every damage rectangle. Clones share the same
/// backing list, so tests can keep one handle and hand the other to the
/// device.
#[derive(Debug, Default, Clone)]
pub struct RecordingDisplay {
    rects: Rc<RefCell<Vec<DirtyRect>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_rects(&self) -> Vec<DirtyRect> {
        std::mem::take(&mut *self.rects.borrow_mut())
    }
}

impl DisplaySink for RecordingDisplay {
    fn update(&mut self, rect: DirtyRect) {
        self.rects.borrow_mut().push(rect);
    }
}

/// Scanout depth assumed when sizing framebuffer damage from a linear copy.
/// Mode programming is outside this engine, and every mode the driver sets
/// is 32-bit.
const SCANOUT_BPP: u32 = 32;

impl<C: Clock> GeForce<C> {
    fn get_pixel(
        &mut self,
        mem: &mut dyn MemoryBus,
        object: u32,
        offset: u32,
        x: u32,
        color_bytes: u32,
    ) -> u32 {
        match color_bytes {
            1 => dma::read8(&self.vram, mem, object, offset.wrapping_add(x)) as u32,
            2 => dma::read16(&self.vram, mem, object, offset.wrapping_add(x * 2)) as u32,
            _ => dma::read32(&self.vram, mem, object, offset.wrapping_add(x * 4)),
        }
    }

    fn put_pixel(
        &mut self,
        mem: &mut dyn MemoryBus,
        ch: &Channel,
        offset: u32,
        x: u32,
        value: u32,
    ) {
        let dst = ch.surf2d.img_dst;
        match ch.surf2d.color_bytes {
            1 => dma::write8(&mut self.vram, mem, dst, offset.wrapping_add(x), value as u8),
            2 => dma::write16(
                &mut self.vram,
                mem,
                dst,
                offset.wrapping_add(x * 2),
                value as u16,
            ),
            _ if ch.surf2d.color_fmt == 6 => dma::write32(
                &mut self.vram,
                mem,
                dst,
                offset.wrapping_add(x * 4),
                value & 0x00FF_FFFF,
            ),
            _ => dma::write32(&mut self.vram, mem, dst, offset.wrapping_add(x * 4), value),
        }
    }

    /// Solid rectangle fill, optionally against the latched clip rectangle.
    /// Coordinates are signed 16-bit with wrapping arithmetic, matching the
    /// register packing.
    pub(crate) fn op_fill_rect(&mut self, ch: &Channel, clipped: bool, mem: &mut dyn MemoryBus) {
        let (dx, dy, width, height, clip);
        if clipped {
            let x = (ch.gdi.rect_yx0 & 0xFFFF) as i16;
            let y = (ch.gdi.rect_yx0 >> 16) as i16;
            clip = Some((
                ((ch.gdi.clip_yx0 & 0xFFFF) as i16).wrapping_sub(x),
                ((ch.gdi.clip_yx0 >> 16) as i16).wrapping_sub(y),
                ((ch.gdi.clip_yx1 & 0xFFFF) as i16).wrapping_sub(x),
                ((ch.gdi.clip_yx1 >> 16) as i16).wrapping_sub(y),
            ));
            dx = x;
            dy = y;
            width = ((ch.gdi.rect_yx1 & 0xFFFF) as i16).wrapping_sub(x) as u16;
            height = ((ch.gdi.rect_yx1 >> 16) as i16).wrapping_sub(y) as u16;
        } else {
            dx = (ch.gdi.rect_xy >> 16) as i16;
            dy = (ch.gdi.rect_xy & 0xFFFF) as i16;
            width = (ch.gdi.rect_wh >> 16) as u16;
            height = (ch.gdi.rect_wh & 0xFFFF) as u16;
            clip = None;
        }

        let pitch = ch.surf2d.pitch >> 16;
        let color = ch.gdi.rect_color;
        let mut row_offset = ch
            .surf2d
            .ofs_dst
            .wrapping_add((dy as u32).wrapping_mul(pitch))
            .wrapping_add((dx as u32).wrapping_mul(ch.surf2d.color_bytes));

        for y in 0..height {
            for x in 0..width {
                let visible = match clip {
                    None => true,
                    Some((x0, y0, x1, y1)) => {
                        (x as i32) >= x0 as i32
                            && (x as i32) < x1 as i32
                            && (y as i32) >= y0 as i32
                            && (y as i32) < y1 as i32
                    }
                };
                if visible {
                    self.put_pixel(mem, ch, row_offset, x as u32, color);
                }
            }
            row_offset = row_offset.wrapping_add(pitch);
        }

        self.display.update(DirtyRect {
            x: dx as u32,
            y: dy as u32,
            width: width as u32,
            height: height as u32,
        });
    }

    /// Draws the collected image words onto the destination surface.
    pub(crate) fn op_ifc(&mut self, ch: &Channel, mem: &mut dyn MemoryBus) {
        let dx = (ch.ifc.yx & 0xFFFF) as u16;
        let dy = (ch.ifc.yx >> 16) as u16;
        let dwidth = ch.ifc.dhw & 0xFFFF;
        let height = ch.ifc.dhw >> 16;
        let swidth = ch.ifc.shw & 0xFFFF;
        let pitch = ch.surf2d.pitch >> 16;

        let mut row_offset = ch
            .surf2d
            .ofs_dst
            .wrapping_add((dy as u32).wrapping_mul(pitch))
            .wrapping_add((dx as u32).wrapping_mul(ch.surf2d.color_bytes));
        let mut src = 0usize;

        for _y in 0..height {
            for x in 0..dwidth {
                // The word buffer is a packed pixel stream in the source
                // format; index by pixel width.
                let color = match ch.ifc.color_bytes {
                    4 => ch.ifc.words.get(src).copied().unwrap_or(0),
                    2 => {
                        let w = ch.ifc.words.get(src / 2).copied().unwrap_or(0);
                        (w >> ((src % 2) * 16)) & 0xFFFF
                    }
                    _ => {
                        let w = ch.ifc.words.get(src / 4).copied().unwrap_or(0);
                        (w >> ((src % 4) * 8)) & 0xFF
                    }
                };
                self.put_pixel(mem, ch, row_offset, x, color);
                src += 1;
            }
            src += swidth.wrapping_sub(dwidth) as usize;
            row_offset = row_offset.wrapping_add(pitch);
        }

        self.display.update(DirtyRect {
            x: dx as u32,
            y: dy as u32,
            width: dwidth,
            height,
        });
    }

    /// Screen-to-screen blit. Row and column order flip when the regions
    /// overlap so the copy never reads bytes it has already written.
    pub(crate) fn op_copyarea(&mut self, ch: &Channel, mem: &mut dyn MemoryBus) {
        let sx = (ch.blit.syx & 0xFFFF) as u16;
        let sy = (ch.blit.syx >> 16) as u16;
        let dx = (ch.blit.dyx & 0xFFFF) as u16;
        let dy = (ch.blit.dyx >> 16) as u16;
        let width = (ch.blit.hw & 0xFFFF) as u16;
        let height = (ch.blit.hw >> 16) as u16;

        let spitch = ch.surf2d.pitch & 0xFFFF;
        let dpitch = ch.surf2d.pitch >> 16;
        let backward_x = dx > sx;
        let backward_y = dy > sy;
        let first_row = if backward_y { height.wrapping_sub(1) } else { 0 };

        let mut src_offset = ch
            .surf2d
            .ofs_src
            .wrapping_add((sy.wrapping_add(first_row) as u32).wrapping_mul(spitch))
            .wrapping_add((sx as u32).wrapping_mul(ch.surf2d.color_bytes));
        let mut dst_offset = ch
            .surf2d
            .ofs_dst
            .wrapping_add((dy.wrapping_add(first_row) as u32).wrapping_mul(dpitch))
            .wrapping_add((dx as u32).wrapping_mul(ch.surf2d.color_bytes));

        for _y in 0..height {
            for x in 0..width {
                let xa = if backward_x { (width - x - 1) as u32 } else { x as u32 };
                let color = self.get_pixel(
                    mem,
                    ch.surf2d.img_src,
                    src_offset,
                    xa,
                    ch.surf2d.color_bytes,
                );
                self.put_pixel(mem, ch, dst_offset, xa, color);
            }
            if backward_y {
                src_offset = src_offset.wrapping_sub(spitch);
                dst_offset = dst_offset.wrapping_sub(dpitch);
            } else {
                src_offset = src_offset.wrapping_add(spitch);
                dst_offset = dst_offset.wrapping_add(dpitch);
            }
        }

        self.display.update(DirtyRect {
            x: dx as u32,
            y: dy as u32,
            width: width as u32,
            height: height as u32,
        });
    }

    /// Pitched linear copy between two translated apertures.
    pub(crate) fn op_m2mf(&mut self, ch: &Channel, mem: &mut dyn MemoryBus) {
        let mut src_offset = ch.m2mf.src_offset;
        let mut dst_offset = ch.m2mf.dst_offset;

        for _y in 0..ch.m2mf.line_count {
            let mut i = 0;
            while i < ch.m2mf.line_length {
                let data = dma::read32(&self.vram, mem, ch.m2mf.src, src_offset.wrapping_add(i));
                dma::write32(
                    &mut self.vram,
                    mem,
                    ch.m2mf.dst,
                    dst_offset.wrapping_add(i),
                    data,
                );
                i += 4;
            }
            src_offset = src_offset.wrapping_add(ch.m2mf.src_pitch);
            dst_offset = dst_offset.wrapping_add(ch.m2mf.dst_pitch);
        }

        // Copies whose destination descriptor targets the framebuffer
        // apertures count as display damage.
        let dma_target = (self.vram.ramin_read32(ch.m2mf.dst) >> 12) & 0xFF;
        if dma_target == 0x03 || dma_target == 0x0B {
            let width = ch.m2mf.line_length / (SCANOUT_BPP >> 3);
            self.display.update(DirtyRect {
                x: 0,
                y: 0,
                width,
                height: ch.m2mf.line_count,
            });
        }
    }

    /// Clears the color and/or depth surface per the clear-surface mask.
    pub(crate) fn op_d3d_clear(&mut self, ch: &Channel, mem: &mut dyn MemoryBus) {
        let dx = ch.d3d.clip_horizontal & 0xFFFF;
        let dy = ch.d3d.clip_vertical & 0xFFFF;
        let width = ch.d3d.clip_horizontal >> 16;
        let height = ch.d3d.clip_vertical >> 16;

        if ch.d3d.clear_surface & 0x0000_00F0 != 0 {
            let pitch = ch.d3d.surface_pitch & 0xFFFF;
            let mut row_offset = ch
                .d3d
                .color_offset
                .wrapping_add(dy.wrapping_mul(pitch))
                .wrapping_add(dx.wrapping_mul(ch.d3d.color_bytes));

            for _y in 0..height {
                for x in 0..width {
                    if ch.d3d.color_bytes == 2 {
                        dma::write16(
                            &mut self.vram,
                            mem,
                            ch.d3d.color_obj,
                            row_offset.wrapping_add(x * 2),
                            ch.d3d.color_clear_value as u16,
                        );
                    } else {
                        dma::write32(
                            &mut self.vram,
                            mem,
                            ch.d3d.color_obj,
                            row_offset.wrapping_add(x * 4),
                            ch.d3d.color_clear_value,
                        );
                    }
                }
                row_offset = row_offset.wrapping_add(pitch);
            }

            self.display.update(DirtyRect {
                x: dx,
                y: dy,
                width,
                height,
            });
        }

        if ch.d3d.clear_surface & 0x0000_0001 != 0 {
            let pitch = ch.d3d.surface_pitch >> 16;
            let mut row_offset = ch
                .d3d
                .zeta_offset
                .wrapping_add(dy.wrapping_mul(pitch))
                .wrapping_add(dx.wrapping_mul(ch.d3d.depth_bytes));

            for _y in 0..height {
                for x in 0..width {
                    if ch.d3d.depth_bytes == 2 {
                        dma::write16(
                            &mut self.vram,
                            mem,
                            ch.d3d.zeta_obj,
                            row_offset.wrapping_add(x * 2),
                            ch.d3d.zstencil_clear_value as u16,
                        );
                    } else {
                        dma::write32(
                            &mut self.vram,
                            mem,
                            ch.d3d.zeta_obj,
                            row_offset.wrapping_add(x * 4),
                            ch.d3d.zstencil_clear_value,
                        );
                    }
                }
                row_offset = row_offset.wrapping_add(pitch);
            }
        }
    }
}
