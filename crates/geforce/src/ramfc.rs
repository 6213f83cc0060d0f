//! Per-channel context records (RAMFC) in instance memory.
//!
//! A record persists the pull-side cursor of an inactive channel. The record
//! base, stride and semaphore offset are generation-dependent and come from
//! the [`ChipsetLayout`]; the live copy of the active channel's fields stays
//! in the CACHE1 registers and is exchanged here on channel switch.

use crate::chipset::ChipsetLayout;
use crate::vram::Vram;

pub const OFFSET_DMA_PUT: u32 = 0x0;
pub const OFFSET_DMA_GET: u32 = 0x4;
pub const OFFSET_REF_CNT: u32 = 0x8;
pub const OFFSET_DMA_INSTANCE: u32 = 0xC;

/// Instance-memory address of `offset` within channel `chid`'s record.
pub fn record_address(layout: &ChipsetLayout, ramfc_reg: u32, chid: u32, offset: u32) -> u32 {
    let base = (ramfc_reg & 0xFFF) << layout.ramfc_base_shift;
    base.wrapping_add(chid.wrapping_mul(layout.ramfc_stride))
        .wrapping_add(offset)
}

pub fn read32(
    vram: &Vram,
    layout: &ChipsetLayout,
    ramfc_reg: u32,
    chid: u32,
    offset: u32,
) -> u32 {
    vram.ramin_read32(record_address(layout, ramfc_reg, chid, offset))
}

pub fn write32(
    vram: &mut Vram,
    layout: &ChipsetLayout,
    ramfc_reg: u32,
    chid: u32,
    offset: u32,
    value: u32,
) {
    vram.ramin_write32(record_address(layout, ramfc_reg, chid, offset), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chipset::CardModel;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_addressing_per_generation() {
        let pre = ChipsetLayout::for_model(CardModel::GeForce3);
        assert_eq!(record_address(&pre, 0x0012, 0, 0), 0x12 << 8);
        assert_eq!(record_address(&pre, 0x0012, 3, 0x8), (0x12 << 8) + 3 * 0x40 + 0x8);

        let nv40 = ChipsetLayout::for_model(CardModel::GeForce6800);
        assert_eq!(record_address(&nv40, 0x0012, 0, 0), 0x12 << 16);
        assert_eq!(
            record_address(&nv40, 0x0012, 3, nv40.ramfc_semaphore_offset),
            (0x12 << 16) + 3 * 0x80 + 0x30
        );
    }

    #[test]
    fn fields_round_trip_through_instance_memory() {
        let layout = ChipsetLayout::for_model(CardModel::GeForce3);
        let size = 0x10_0000;
        let mut vram = Vram::new(size, size - 64);

        write32(&mut vram, &layout, 0x1, 7, OFFSET_DMA_PUT, 0x1000);
        write32(&mut vram, &layout, 0x1, 7, OFFSET_DMA_INSTANCE, 0x55);
        assert_eq!(read32(&vram, &layout, 0x1, 7, OFFSET_DMA_PUT), 0x1000);
        assert_eq!(read32(&vram, &layout, 0x1, 7, OFFSET_DMA_INSTANCE), 0x55);
        // Neighboring channel is untouched.
        assert_eq!(read32(&vram, &layout, 0x1, 6, OFFSET_DMA_PUT), 0);
    }
}
