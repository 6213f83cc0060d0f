//! Per-generation format descriptors.
//!
//! The two supported instance-memory layouts (pre-NV40 and NV40+) differ in
//! how the handle-table context word, the notifier reference inside an object
//! header, and the per-channel context records are packed. All of those
//! differences live here as one immutable [`ChipsetLayout`] chosen at
//! construction; the rest of the crate never branches on a generation flag.

pub const CHANNEL_COUNT: usize = 32;
pub const SUBCHANNEL_COUNT: usize = 8;

const MIB: u32 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardModel {
    GeForce3,
    GeForceFx5900,
    GeForce6800,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipsetLayout {
    pub model: CardModel,
    /// Architecture id reported through PMC_ID (0x20 / 0x35 / 0x40).
    pub chip_type: u32,
    pub vram_size: u32,
    /// Mask applied to an object's first header word to extract its class id.
    pub class_mask: u32,

    /// Left shift applied to the low 12 bits of the RAMFC register to get the
    /// context-record base inside instance memory.
    pub ramfc_base_shift: u32,
    /// Bytes per channel context record.
    pub ramfc_stride: u32,
    /// Offset of the semaphore field within a context record.
    pub ramfc_semaphore_offset: u32,

    /// Handle-table context word: channel id position.
    pub ctx_chid_shift: u32,
    /// Handle-table context word: object-address field mask (units of 16 bytes).
    pub ctx_object_mask: u32,
    /// Handle-table context word: engine id position and width.
    pub ctx_engine_shift: u32,
    pub ctx_engine_mask: u32,

    /// Notifier reference inside an object's second header word: in-place
    /// field mask and position (the stored value is the address divided by 16).
    pub notifier_field_mask: u32,
    pub notifier_field_shift: u32,
}

const PRE_NV40: ChipsetLayout = ChipsetLayout {
    model: CardModel::GeForce3,
    chip_type: 0x20,
    vram_size: 64 * MIB,
    class_mask: 0x0000_0FFF,
    ramfc_base_shift: 8,
    ramfc_stride: 0x40,
    ramfc_semaphore_offset: 0x2C,
    ctx_chid_shift: 24,
    ctx_object_mask: 0xFFFF,
    ctx_engine_shift: 16,
    ctx_engine_mask: 0xFF,
    notifier_field_mask: 0xFFFF_0000,
    notifier_field_shift: 16,
};

const NV40: ChipsetLayout = ChipsetLayout {
    model: CardModel::GeForce6800,
    chip_type: 0x40,
    vram_size: 256 * MIB,
    class_mask: 0x0000_FFFF,
    ramfc_base_shift: 16,
    ramfc_stride: 0x80,
    ramfc_semaphore_offset: 0x30,
    ctx_chid_shift: 23,
    ctx_object_mask: 0xF_FFFF,
    ctx_engine_shift: 20,
    ctx_engine_mask: 0x7,
    notifier_field_mask: 0x000F_FFFF,
    notifier_field_shift: 0,
};

impl ChipsetLayout {
    pub fn for_model(model: CardModel) -> Self {
        match model {
            CardModel::GeForce3 => PRE_NV40,
            CardModel::GeForceFx5900 => ChipsetLayout {
                model,
                chip_type: 0x35,
                vram_size: 128 * MIB,
                ..PRE_NV40
            },
            CardModel::GeForce6800 => NV40,
        }
    }

    /// Registers that moved between generations (RAMFC base, PGRAPH enable)
    /// key off the architecture id.
    pub fn is_nv40(&self) -> bool {
        self.chip_type >= 0x40
    }

    /// Chip id reported through PMC_ID.
    pub fn pmc_id(&self) -> u32 {
        if self.chip_type == 0x20 {
            0x0202_00A5
        } else {
            self.chip_type << 20
        }
    }

    /// XOR applied to instance-memory addresses to reach the alias at the top
    /// of VRAM.
    pub fn ramin_flip(&self) -> u32 {
        self.vram_size - 64
    }

    pub fn context_chid(&self, ctx: u32) -> u32 {
        (ctx >> self.ctx_chid_shift) & 0x1F
    }

    pub fn context_object(&self, ctx: u32) -> u32 {
        (ctx & self.ctx_object_mask) << 4
    }

    pub fn context_engine(&self, ctx: u32) -> u8 {
        ((ctx >> self.ctx_engine_shift) & self.ctx_engine_mask) as u8
    }

    /// Extracts the notifier address from an object's second header word.
    pub fn unpack_notifier(&self, word1: u32) -> u32 {
        ((word1 & self.notifier_field_mask) >> self.notifier_field_shift) << 4
    }

    /// Writes `notifier` back into an object's second header word, preserving
    /// the other bits.
    pub fn pack_notifier(&self, word1: u32, notifier: u32) -> u32 {
        (word1 & !self.notifier_field_mask)
            | (((notifier >> 4) << self.notifier_field_shift) & self.notifier_field_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn model_table() {
        let g3 = ChipsetLayout::for_model(CardModel::GeForce3);
        assert_eq!(g3.pmc_id(), 0x0202_00A5);
        assert_eq!(g3.vram_size, 64 * MIB);
        assert_eq!(g3.class_mask, 0xFFF);

        let fx = ChipsetLayout::for_model(CardModel::GeForceFx5900);
        assert_eq!(fx.pmc_id(), 0x35 << 20);
        assert_eq!(fx.vram_size, 128 * MIB);
        assert_eq!(fx.ramfc_stride, 0x40);

        let nv40 = ChipsetLayout::for_model(CardModel::GeForce6800);
        assert_eq!(nv40.pmc_id(), 0x40 << 20);
        assert_eq!(nv40.class_mask, 0xFFFF);
        assert_eq!(nv40.ramfc_stride, 0x80);
        assert_eq!(nv40.ramfc_semaphore_offset, 0x30);
    }

    #[test]
    fn context_word_decoding_differs_by_generation() {
        let pre = ChipsetLayout::for_model(CardModel::GeForce3);
        let ctx = (7 << 24) | (0x01 << 16) | 0x1234;
        assert_eq!(pre.context_chid(ctx), 7);
        assert_eq!(pre.context_object(ctx), 0x1234 << 4);
        assert_eq!(pre.context_engine(ctx), 0x01);

        let nv40 = ChipsetLayout::for_model(CardModel::GeForce6800);
        let ctx = (7 << 23) | (0x1 << 20) | 0x2_1234;
        assert_eq!(nv40.context_chid(ctx), 7);
        assert_eq!(nv40.context_object(ctx), 0x2_1234 << 4);
        assert_eq!(nv40.context_engine(ctx), 0x1);
    }

    #[test]
    fn notifier_round_trips_in_both_layouts() {
        for model in [CardModel::GeForce3, CardModel::GeForce6800] {
            let layout = ChipsetLayout::for_model(model);
            let word1 = layout.pack_notifier(0xABCD_EF01, 0x0001_2340);
            assert_eq!(layout.unpack_notifier(word1), 0x0001_2340);
        }
        // The pre-NV40 field is 16 bits wide; addresses beyond 0xF_FFF0
        // truncate on the way in.
        let pre = ChipsetLayout::for_model(CardModel::GeForce3);
        assert_eq!(
            pre.unpack_notifier(pre.pack_notifier(0, 0x0012_3450)),
            0x0002_3450
        );
        // Pre-NV40 keeps the low half of the header word intact.
        let pre = ChipsetLayout::for_model(CardModel::GeForce3);
        assert_eq!(pre.pack_notifier(0xABCD_EF01, 0) & 0xFFFF, 0xEF01);
        // NV40+ keeps the high 12 bits.
        let nv40 = ChipsetLayout::for_model(CardModel::GeForce6800);
        assert_eq!(nv40.pack_notifier(0xABCD_EF01, 0) >> 20, 0xABC);
    }
}
