//! Snapshot persistence for the whole engine.
//!
//! The register blocks, the channel table, and VRAM each get one TLV field.
//! Channels serialize through the nested codec in a fixed field order; the
//! PTIMER counter is captured as an absolute value and re-based against the
//! clock on restore.

use io_snapshot::codec::{Decoder, Encoder};
use io_snapshot::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};

use crate::classes::{Channel, Subchannel};
use crate::clock::Clock;
use crate::device::GeForce;
use crate::fifo::CACHE1_DEPTH;

const TAG_INTERRUPTS: u16 = 1;
const TAG_GRAPH: u16 = 2;
const TAG_PTIMER: u16 = 3;
const TAG_FIFO: u16 = 4;
const TAG_CACHE1: u16 = 5;
const TAG_CHANNELS: u16 = 6;
const TAG_ACQUIRE: u16 = 7;
const TAG_VRAM: u16 = 8;

fn encode_channel(mut enc: Encoder, ch: &Channel) -> Encoder {
    enc = enc
        .u32(ch.subr_return)
        .bool(ch.subr_active)
        .u32(ch.pending.method)
        .u32(ch.pending.subc)
        .u32(ch.pending.count)
        .bool(ch.pending.non_increment)
        .bool(ch.notify_pending)
        .u32(ch.notify_type);
    for sch in &ch.subchannels {
        enc = enc.u32(sch.object).u8(sch.engine).u32(sch.notifier);
    }

    enc = enc.u32(ch.clip.yx).u32(ch.clip.hw).u8(ch.rop);

    enc = enc
        .u32(ch.pattern.shape)
        .u32(ch.pattern.kind)
        .u32(ch.pattern.bg_color)
        .u32(ch.pattern.fg_color);
    for &bit in &ch.pattern.mono {
        enc = enc.bool(bit);
    }
    for &c in &ch.pattern.color {
        enc = enc.u32(c);
    }

    enc = enc
        .u32(ch.surf2d.img_src)
        .u32(ch.surf2d.img_dst)
        .u32(ch.surf2d.color_fmt)
        .u32(ch.surf2d.color_bytes)
        .u32(ch.surf2d.pitch)
        .u32(ch.surf2d.ofs_src)
        .u32(ch.surf2d.ofs_dst);

    enc = enc
        .u32(ch.gdi.operation)
        .u32(ch.gdi.color_fmt)
        .u32(ch.gdi.mono_fmt)
        .u32(ch.gdi.clip_yx0)
        .u32(ch.gdi.clip_yx1)
        .u32(ch.gdi.rect_color)
        .u32(ch.gdi.rect_xy)
        .u32(ch.gdi.rect_wh)
        .u32(ch.gdi.rect_yx0)
        .u32(ch.gdi.rect_yx1);

    enc = enc
        .bool(ch.ifc.color_key_enable)
        .u32(ch.ifc.operation)
        .u32(ch.ifc.color_fmt)
        .u32(ch.ifc.color_bytes)
        .u32(ch.ifc.yx)
        .u32(ch.ifc.dhw)
        .u32(ch.ifc.shw)
        .u32(ch.ifc.expected)
        .bool(ch.ifc.upload)
        .u32(ch.ifc.upload_offset)
        .u32(ch.ifc.words.len() as u32);
    for &w in &ch.ifc.words {
        enc = enc.u32(w);
    }

    enc = enc
        .bool(ch.blit.color_key_enable)
        .u32(ch.blit.operation)
        .u32(ch.blit.syx)
        .u32(ch.blit.dyx)
        .u32(ch.blit.hw);

    enc = enc
        .u32(ch.m2mf.src)
        .u32(ch.m2mf.dst)
        .u32(ch.m2mf.src_offset)
        .u32(ch.m2mf.dst_offset)
        .u32(ch.m2mf.src_pitch)
        .u32(ch.m2mf.dst_pitch)
        .u32(ch.m2mf.line_length)
        .u32(ch.m2mf.line_count)
        .u32(ch.m2mf.format)
        .u32(ch.m2mf.buffer_notify);

    enc = enc
        .u32(ch.d3d.a_obj)
        .u32(ch.d3d.b_obj)
        .u32(ch.d3d.color_obj)
        .u32(ch.d3d.zeta_obj)
        .u32(ch.d3d.clip_horizontal)
        .u32(ch.d3d.clip_vertical)
        .u32(ch.d3d.surface_format)
        .u32(ch.d3d.color_bytes)
        .u32(ch.d3d.depth_bytes)
        .u32(ch.d3d.surface_pitch)
        .u32(ch.d3d.color_offset)
        .u32(ch.d3d.zeta_offset)
        .u32(ch.d3d.zstencil_clear_value)
        .u32(ch.d3d.color_clear_value)
        .u32(ch.d3d.clear_surface)
        .u32(ch.d3d.vertex_index)
        .u32(ch.d3d.attrib_index)
        .u32(ch.d3d.comp_index);
    for vertex in &ch.d3d.vertex_data {
        for attrib in vertex {
            for &comp in attrib {
                enc = enc.u32(comp.to_bits());
            }
        }
    }

    enc
}

fn decode_channel(dec: &mut Decoder<'_>) -> SnapshotResult<Channel> {
    let mut ch = Channel::default();
    ch.subr_return = dec.u32()?;
    ch.subr_active = dec.bool()?;
    ch.pending.method = dec.u32()?;
    ch.pending.subc = dec.u32()?;
    ch.pending.count = dec.u32()?;
    ch.pending.non_increment = dec.bool()?;
    ch.notify_pending = dec.bool()?;
    ch.notify_type = dec.u32()?;
    for sch in &mut ch.subchannels {
        *sch = Subchannel {
            object: dec.u32()?,
            engine: dec.u8()?,
            notifier: dec.u32()?,
        };
    }

    ch.clip.yx = dec.u32()?;
    ch.clip.hw = dec.u32()?;
    ch.rop = dec.u8()?;

    ch.pattern.shape = dec.u32()?;
    ch.pattern.kind = dec.u32()?;
    ch.pattern.bg_color = dec.u32()?;
    ch.pattern.fg_color = dec.u32()?;
    for bit in &mut ch.pattern.mono {
        *bit = dec.bool()?;
    }
    for c in &mut ch.pattern.color {
        *c = dec.u32()?;
    }

    ch.surf2d.img_src = dec.u32()?;
    ch.surf2d.img_dst = dec.u32()?;
    ch.surf2d.color_fmt = dec.u32()?;
    ch.surf2d.color_bytes = dec.u32()?;
    ch.surf2d.pitch = dec.u32()?;
    ch.surf2d.ofs_src = dec.u32()?;
    ch.surf2d.ofs_dst = dec.u32()?;

    ch.gdi.operation = dec.u32()?;
    ch.gdi.color_fmt = dec.u32()?;
    ch.gdi.mono_fmt = dec.u32()?;
    ch.gdi.clip_yx0 = dec.u32()?;
    ch.gdi.clip_yx1 = dec.u32()?;
    ch.gdi.rect_color = dec.u32()?;
    ch.gdi.rect_xy = dec.u32()?;
    ch.gdi.rect_wh = dec.u32()?;
    ch.gdi.rect_yx0 = dec.u32()?;
    ch.gdi.rect_yx1 = dec.u32()?;

    ch.ifc.color_key_enable = dec.bool()?;
    ch.ifc.operation = dec.u32()?;
    ch.ifc.color_fmt = dec.u32()?;
    ch.ifc.color_bytes = dec.u32()?;
    ch.ifc.yx = dec.u32()?;
    ch.ifc.dhw = dec.u32()?;
    ch.ifc.shw = dec.u32()?;
    ch.ifc.expected = dec.u32()?;
    ch.ifc.upload = dec.bool()?;
    ch.ifc.upload_offset = dec.u32()?;
    let word_count = dec.u32()?;
    for _ in 0..word_count {
        ch.ifc.words.push(dec.u32()?);
    }

    ch.blit.color_key_enable = dec.bool()?;
    ch.blit.operation = dec.u32()?;
    ch.blit.syx = dec.u32()?;
    ch.blit.dyx = dec.u32()?;
    ch.blit.hw = dec.u32()?;

    ch.m2mf.src = dec.u32()?;
    ch.m2mf.dst = dec.u32()?;
    ch.m2mf.src_offset = dec.u32()?;
    ch.m2mf.dst_offset = dec.u32()?;
    ch.m2mf.src_pitch = dec.u32()?;
    ch.m2mf.dst_pitch = dec.u32()?;
    ch.m2mf.line_length = dec.u32()?;
    ch.m2mf.line_count = dec.u32()?;
    ch.m2mf.format = dec.u32()?;
    ch.m2mf.buffer_notify = dec.u32()?;

    ch.d3d.a_obj = dec.u32()?;
    ch.d3d.b_obj = dec.u32()?;
    ch.d3d.color_obj = dec.u32()?;
    ch.d3d.zeta_obj = dec.u32()?;
    ch.d3d.clip_horizontal = dec.u32()?;
    ch.d3d.clip_vertical = dec.u32()?;
    ch.d3d.surface_format = dec.u32()?;
    ch.d3d.color_bytes = dec.u32()?;
    ch.d3d.depth_bytes = dec.u32()?;
    ch.d3d.surface_pitch = dec.u32()?;
    ch.d3d.color_offset = dec.u32()?;
    ch.d3d.zeta_offset = dec.u32()?;
    ch.d3d.zstencil_clear_value = dec.u32()?;
    ch.d3d.color_clear_value = dec.u32()?;
    ch.d3d.clear_surface = dec.u32()?;
    ch.d3d.vertex_index = dec.u32()?;
    ch.d3d.attrib_index = dec.u32()?;
    ch.d3d.comp_index = dec.u32()?;
    for vertex in &mut ch.d3d.vertex_data {
        for attrib in vertex.iter_mut() {
            for comp in attrib.iter_mut() {
                *comp = f32::from_bits(dec.u32()?);
            }
        }
    }

    Ok(ch)
}

impl<C: Clock> IoSnapshot for GeForce<C> {
    const DEVICE_ID: [u8; 4] = *b"GFCE";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);

        let i = &self.intr;
        w.field_bytes(
            TAG_INTERRUPTS,
            Encoder::new()
                .u32(i.mc_intr_en)
                .u32(i.mc_enable)
                .u32(i.bus_intr)
                .u32(i.bus_intr_en)
                .u32(i.fifo_intr)
                .u32(i.fifo_intr_en)
                .u32(i.graph_intr)
                .u32(i.graph_intr_en)
                .u32(i.crtc_intr)
                .u32(i.crtc_intr_en)
                .finish(),
        );

        w.field_bytes(
            TAG_GRAPH,
            Encoder::new().u32(self.graph.nsource).u32(self.graph.notify).finish(),
        );

        let t = &self.ptimer;
        w.field_bytes(
            TAG_PTIMER,
            Encoder::new()
                .u32(t.intr)
                .u32(t.intr_en)
                .u32(t.numerator)
                .u32(t.denominator)
                .u32(t.alarm)
                .u64(t.raw_time(self.clock.now_ns()))
                .finish(),
        );

        let f = &self.fifo;
        w.field_bytes(
            TAG_FIFO,
            Encoder::new()
                .u32(f.ramht)
                .u32(f.ramfc)
                .u32(f.ramro)
                .u32(f.mode)
                .u32(f.grctx_instance)
                .finish(),
        );

        let c = &f.cache1;
        let mut enc = Encoder::new()
            .u32(c.push1)
            .u32(c.dma_push)
            .u32(c.dma_instance)
            .u32(c.dma_put)
            .u32(c.dma_get)
            .u32(c.ref_cnt)
            .u32(c.pull0)
            .u32(c.semaphore)
            .u32(c.put)
            .u32(c.get);
        for idx in 0..CACHE1_DEPTH {
            enc = enc.u32(c.method[idx]).u32(c.data[idx]);
        }
        w.field_bytes(TAG_CACHE1, enc.finish());

        let mut enc = Encoder::new();
        for ch in &self.channels {
            enc = encode_channel(enc, ch);
        }
        w.field_bytes(TAG_CHANNELS, enc.finish());

        w.field_bool(TAG_ACQUIRE, self.acquire_pending);
        w.field_bytes(TAG_VRAM, self.vram.as_slice().to_vec());

        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        if let Some(field) = r.bytes(TAG_INTERRUPTS) {
            let mut dec = Decoder::new(field);
            self.intr.mc_intr_en = dec.u32()?;
            self.intr.mc_enable = dec.u32()?;
            self.intr.bus_intr = dec.u32()?;
            self.intr.bus_intr_en = dec.u32()?;
            self.intr.fifo_intr = dec.u32()?;
            self.intr.fifo_intr_en = dec.u32()?;
            self.intr.graph_intr = dec.u32()?;
            self.intr.graph_intr_en = dec.u32()?;
            self.intr.crtc_intr = dec.u32()?;
            self.intr.crtc_intr_en = dec.u32()?;
            dec.finish()?;
        }

        if let Some(field) = r.bytes(TAG_GRAPH) {
            let mut dec = Decoder::new(field);
            self.graph.nsource = dec.u32()?;
            self.graph.notify = dec.u32()?;
            dec.finish()?;
        }

        if let Some(field) = r.bytes(TAG_PTIMER) {
            let mut dec = Decoder::new(field);
            self.ptimer.intr = dec.u32()?;
            self.ptimer.intr_en = dec.u32()?;
            self.ptimer.numerator = dec.u32()?;
            self.ptimer.denominator = dec.u32()?;
            self.ptimer.alarm = dec.u32()?;
            let time = dec.u64()?;
            self.ptimer.restore_time(self.clock.now_ns(), time);
            dec.finish()?;
        }

        if let Some(field) = r.bytes(TAG_FIFO) {
            let mut dec = Decoder::new(field);
            self.fifo.ramht = dec.u32()?;
            self.fifo.ramfc = dec.u32()?;
            self.fifo.ramro = dec.u32()?;
            self.fifo.mode = dec.u32()?;
            self.fifo.grctx_instance = dec.u32()?;
            dec.finish()?;
        }

        if let Some(field) = r.bytes(TAG_CACHE1) {
            let mut dec = Decoder::new(field);
            let c = &mut self.fifo.cache1;
            c.push1 = dec.u32()?;
            c.dma_push = dec.u32()?;
            c.dma_instance = dec.u32()?;
            c.dma_put = dec.u32()?;
            c.dma_get = dec.u32()?;
            c.ref_cnt = dec.u32()?;
            c.pull0 = dec.u32()?;
            c.semaphore = dec.u32()?;
            c.put = dec.u32()?;
            c.get = dec.u32()?;
            for idx in 0..CACHE1_DEPTH {
                c.method[idx] = dec.u32()?;
                c.data[idx] = dec.u32()?;
            }
            dec.finish()?;
        }

        if let Some(field) = r.bytes(TAG_CHANNELS) {
            let mut dec = Decoder::new(field);
            for idx in 0..self.channels.len() {
                self.channels[idx] = decode_channel(&mut dec)?;
            }
            dec.finish()?;
        }

        if let Some(v) = r.bool(TAG_ACQUIRE)? {
            self.acquire_pending = v;
        }

        if let Some(field) = r.bytes(TAG_VRAM) {
            let vram = self.vram.as_mut_slice();
            if field.len() != vram.len() {
                return Err(SnapshotError::BadFieldLength {
                    tag: TAG_VRAM,
                    expected: vram.len(),
                    found: field.len(),
                });
            }
            vram.copy_from_slice(field);
        }

        self.update_irq();
        Ok(())
    }
}
