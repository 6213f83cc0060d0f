//! Object classes and their per-channel state.
//!
//! A class handler is a small state machine: most methods latch a parameter
//! into the channel's state for that class, a designated trigger method fires
//! the actual graphics operation (see `ops`). The accumulator-only methods
//! live here; handlers that need device memory or fire operations are in
//! `exec`.

use tracing::debug;

use crate::chipset::SUBCHANNEL_COUNT;

/// Engine a subchannel binding routes to. Software objects are serviced by
/// the host driver through the deferred-method queue.
pub const ENGINE_SOFTWARE: u8 = 0x00;
pub const ENGINE_GRAPHICS: u8 = 0x01;

/// Classes the graphics engine dispatches, keyed by the low byte of the
/// masked class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Clip,
    MemToMem,
    Rop,
    Pattern,
    Gdi,
    ImageBlit,
    ImageFromCpu,
    Surface2d,
    D3d,
}

impl ObjectClass {
    pub fn from_id(class_id: u32) -> Option<Self> {
        match class_id as u8 {
            0x19 => Some(Self::Clip),
            0x39 => Some(Self::MemToMem),
            0x43 => Some(Self::Rop),
            0x44 => Some(Self::Pattern),
            0x4A => Some(Self::Gdi),
            0x5F | 0x9F => Some(Self::ImageBlit),
            0x61 | 0x65 | 0x8A => Some(Self::ImageFromCpu),
            0x62 => Some(Self::Surface2d),
            0x97 => Some(Self::D3d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Clip {
    pub yx: u32,
    pub hw: u32,
}

impl Clip {
    pub fn method(&mut self, method: u32, param: u32) {
        match method {
            0x0C0 => self.yx = param,
            0x0C1 => self.hw = param,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub shape: u32,
    pub kind: u32,
    pub bg_color: u32,
    pub fg_color: u32,
    pub mono: [bool; 64],
    pub color: [u32; 64],
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            shape: 0,
            kind: 0,
            bg_color: 0,
            fg_color: 0,
            mono: [false; 64],
            color: [0; 64],
        }
    }
}

impl Pattern {
    pub fn method(&mut self, method: u32, param: u32) {
        match method {
            0x0C2 => self.shape = param,
            0x0C3 => self.kind = param,
            0x0C4 => self.bg_color = param,
            0x0C5 => self.fg_color = param,
            // Two words of monochrome pattern, bit-reversed within each byte.
            0x0C6 | 0x0C7 => {
                let half = (method & 1) as usize * 32;
                for i in 0..32 {
                    self.mono[i + half] = (param >> (i ^ 7)) & 1 != 0;
                }
            }
            0x100..=0x10F => {
                let i = ((method - 0x100) * 4) as usize;
                self.color[i] = param & 0xFF;
                self.color[i + 1] = (param >> 8) & 0xFF;
                self.color[i + 2] = (param >> 16) & 0xFF;
                self.color[i + 3] = param >> 24;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Surface2d {
    pub img_src: u32,
    pub img_dst: u32,
    pub color_fmt: u32,
    pub color_bytes: u32,
    pub pitch: u32,
    pub ofs_src: u32,
    pub ofs_dst: u32,
}

impl Surface2d {
    pub fn method(&mut self, method: u32, param: u32) {
        match method {
            0x061 => self.img_src = param,
            0x062 => self.img_dst = param,
            0x0C0 => {
                self.color_fmt = param;
                self.color_bytes = match param {
                    0x1 => 1,              // Y8
                    0x4 => 2,              // R5G6B5
                    0x6 | 0xA | 0xB => 4,  // X8R8G8B8_Z8R8G8B8, A8R8G8B8, Y32
                    other => {
                        debug!(color_fmt = other, "unknown 2D surface color format");
                        4
                    }
                };
            }
            0x0C1 => self.pitch = param,
            0x0C2 => self.ofs_src = param,
            0x0C3 => self.ofs_dst = param,
            _ => {}
        }
    }
}

/// Shared color-format decode for the raster classes: the surface format
/// wins for Y8, otherwise the class's own format selects the width.
pub fn color_bytes_for(s2d_color_fmt: u32, color_fmt: u32) -> u32 {
    if s2d_color_fmt == 1 {
        1
    } else {
        match color_fmt {
            1 | 2 | 3 => 2, // R5G6B5, A1R5G5B5, X1R5G5B5
            4 | 5 => 4,     // A8R8G8B8, X8R8G8B8
            other => {
                debug!(color_fmt = other, "unknown color format");
                4
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gdi {
    pub operation: u32,
    pub color_fmt: u32,
    pub mono_fmt: u32,
    pub clip_yx0: u32,
    pub clip_yx1: u32,
    pub rect_color: u32,
    pub rect_xy: u32,
    pub rect_wh: u32,
    pub rect_yx0: u32,
    pub rect_yx1: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ImageFromCpu {
    pub color_key_enable: bool,
    pub operation: u32,
    pub color_fmt: u32,
    pub color_bytes: u32,
    pub yx: u32,
    pub dhw: u32,
    pub shw: u32,
    /// Collected parameter words; the draw fires when `expected` are present.
    pub words: Vec<u32>,
    pub expected: u32,
    /// Raw-stream fast path: parameters stream straight to the destination
    /// surface instead of being collected.
    pub upload: bool,
    pub upload_offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Blit {
    pub color_key_enable: bool,
    pub operation: u32,
    pub syx: u32,
    pub dyx: u32,
    pub hw: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemToMem {
    pub src: u32,
    pub dst: u32,
    pub src_offset: u32,
    pub dst_offset: u32,
    pub src_pitch: u32,
    pub dst_pitch: u32,
    pub line_length: u32,
    pub line_count: u32,
    pub format: u32,
    pub buffer_notify: u32,
}

#[derive(Debug, Clone, Default)]
pub struct D3d {
    pub a_obj: u32,
    pub b_obj: u32,
    pub color_obj: u32,
    pub zeta_obj: u32,
    pub clip_horizontal: u32,
    pub clip_vertical: u32,
    pub surface_format: u32,
    pub color_bytes: u32,
    pub depth_bytes: u32,
    pub surface_pitch: u32,
    pub color_offset: u32,
    pub zeta_offset: u32,
    pub zstencil_clear_value: u32,
    pub color_clear_value: u32,
    pub clear_surface: u32,
    pub vertex_index: u32,
    pub attrib_index: u32,
    pub comp_index: u32,
    pub vertex_data: [[[f32; 4]; 16]; 3],
}

/// Ring-decode state for a pending method header.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingMethod {
    pub method: u32,
    pub subc: u32,
    pub count: u32,
    pub non_increment: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Subchannel {
    pub object: u32,
    pub engine: u8,
    pub notifier: u32,
}

/// Everything a channel owns besides its RAMFC record: decode state,
/// subchannel bindings, and the per-class accumulators.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub subr_return: u32,
    pub subr_active: bool,
    pub pending: PendingMethod,
    pub subchannels: [Subchannel; SUBCHANNEL_COUNT],
    pub notify_pending: bool,
    pub notify_type: u32,

    pub clip: Clip,
    pub rop: u8,
    pub pattern: Pattern,
    pub surf2d: Surface2d,
    pub gdi: Gdi,
    pub ifc: ImageFromCpu,
    pub blit: Blit,
    pub m2mf: MemToMem,
    pub d3d: D3d,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_table_covers_the_dispatchable_ids() {
        assert_eq!(ObjectClass::from_id(0x19), Some(ObjectClass::Clip));
        assert_eq!(ObjectClass::from_id(0x39), Some(ObjectClass::MemToMem));
        assert_eq!(ObjectClass::from_id(0x9F), Some(ObjectClass::ImageBlit));
        assert_eq!(ObjectClass::from_id(0x8A), Some(ObjectClass::ImageFromCpu));
        // The low byte keys the table; NV40 class ids keep their high byte.
        assert_eq!(ObjectClass::from_id(0x4097), Some(ObjectClass::D3d));
        assert_eq!(ObjectClass::from_id(0x42), None);
    }

    #[test]
    fn pattern_mono_bits_are_byte_reversed() {
        let mut p = Pattern::default();
        p.method(0x0C6, 0x0000_0080);
        // Bit 7 of the parameter lands at index 7 ^ 7 = 0.
        assert!(p.mono[0]);
        assert!(!p.mono[7]);

        p.method(0x0C7, 1);
        // Second word fills the upper half; bit 0 lands at index 7.
        assert!(p.mono[32 + 7]);
    }

    #[test]
    fn surface_format_selects_pixel_width() {
        let mut s = Surface2d::default();
        s.method(0x0C0, 0x1);
        assert_eq!(s.color_bytes, 1);
        s.method(0x0C0, 0x4);
        assert_eq!(s.color_bytes, 2);
        s.method(0x0C0, 0xA);
        assert_eq!(s.color_bytes, 4);
        // Unknown formats fall back to 4 bytes.
        s.method(0x0C0, 0x2);
        assert_eq!(s.color_bytes, 4);
    }

    #[test]
    fn raster_color_width_prefers_y8_surfaces() {
        assert_eq!(color_bytes_for(1, 4), 1);
        assert_eq!(color_bytes_for(4, 1), 2);
        assert_eq!(color_bytes_for(4, 5), 4);
    }
}
