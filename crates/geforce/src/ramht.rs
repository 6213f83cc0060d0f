//! Handle resolution through the open-addressed hash table in instance
//! memory (RAMHT).
//!
//! Each slot is 8 bytes: the handle, then a context word whose bit layout is
//! generation-dependent ([`ChipsetLayout`]). Probing is linear with
//! wraparound and terminates after one full pass.

use tracing::debug;

use crate::chipset::ChipsetLayout;
use crate::vram::Vram;

/// Upper bound on the table-size exponent. The register encodes up to
/// 0xFF + 9 bits, far beyond any real table; clamping keeps guest-chosen
/// values from overflowing the shift arithmetic.
const MAX_TABLE_BITS: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub object: u32,
    pub engine: u8,
}

/// Slot index hash: XOR-fold the handle down to `bits` bits, mix in the low
/// four bits of the channel id at the top, scale to a byte offset.
pub fn slot_offset(handle: u32, chid: u32, bits: u32) -> u32 {
    let mask = (1u32 << bits) - 1;
    let mut hash = 0;
    let mut x = handle;
    while x != 0 {
        hash ^= x & mask;
        x >>= bits;
    }
    hash ^= (chid & 0xF) << (bits - 4);
    hash << 3
}

/// Table geometry from the RAMHT register: base in the low 12 bits (times
/// 256), size exponent in bits 16..24 (plus 9).
fn geometry(ramht_reg: u32) -> (u32, u32) {
    let base = (ramht_reg & 0xFFF) << 8;
    let bits = ((ramht_reg >> 16) & 0xFF) + 9;
    (base, bits.min(MAX_TABLE_BITS))
}

/// Looks up `handle` for `chid`. `None` leaves any previous binding the
/// caller holds untouched.
pub fn lookup(
    vram: &Vram,
    layout: &ChipsetLayout,
    ramht_reg: u32,
    handle: u32,
    chid: u32,
) -> Option<Binding> {
    let (base, bits) = geometry(ramht_reg);
    let size = 1u32 << (bits + 3);

    let start = slot_offset(handle, chid, bits);
    let mut it = start;
    loop {
        if vram.ramin_read32(base.wrapping_add(it)) == handle {
            let ctx = vram.ramin_read32(base.wrapping_add(it + 4));
            if layout.context_chid(ctx) == chid {
                return Some(Binding {
                    object: layout.context_object(ctx),
                    engine: layout.context_engine(ctx),
                });
            }
        }
        it += 8;
        if it >= size {
            it = 0;
        }
        if it == start {
            break;
        }
    }

    debug!(handle, chid, "RAMHT lookup failed");
    None
}
