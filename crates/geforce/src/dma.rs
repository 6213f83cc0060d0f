//! Address translation through guest-built descriptors ("DMA objects").
//!
//! A descriptor lives in instance memory: word 0 carries the flag bits and a
//! byte adjustment in its top 12 bits, word 2 is either the linear base or the
//! first entry of an inline page table (one page-frame word per 4KiB page).

use memory::MemoryBus;

use crate::vram::Vram;

/// Descriptor word 0: linear (set) vs. paged (clear) addressing.
const FLAG_LINEAR: u32 = 0x0000_2000;
/// Descriptor word 0: target is external physical memory rather than VRAM.
const FLAG_EXTERNAL: u32 = 0x0002_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Vram(u32),
    External(u32),
}

fn linear_lookup(vram: &Vram, object: u32, addr: u32) -> u32 {
    let adjust = vram.ramin_read32(object) >> 20;
    let base = vram.ramin_read32(object.wrapping_add(8)) & 0xFFFF_F000;
    base.wrapping_add(adjust).wrapping_add(addr)
}

fn paged_lookup(vram: &Vram, object: u32, addr: u32) -> u32 {
    let addr_adj = addr.wrapping_add(vram.ramin_read32(object) >> 20);
    let page_index = addr_adj >> 12;
    let entry = object.wrapping_add(8).wrapping_add(page_index.wrapping_mul(4));
    let page = vram.ramin_read32(entry) & 0xFFFF_F000;
    page | (addr_adj & 0xFFF)
}

/// Resolves `addr` within the descriptor at `object` to an absolute address.
pub fn resolve(vram: &Vram, object: u32, addr: u32) -> Target {
    let flags = vram.ramin_read32(object);
    let abs = if flags & FLAG_LINEAR != 0 {
        linear_lookup(vram, object, addr)
    } else {
        paged_lookup(vram, object, addr)
    };
    if flags & FLAG_EXTERNAL != 0 {
        Target::External(abs)
    } else {
        Target::Vram(abs)
    }
}

pub fn read8(vram: &Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32) -> u8 {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.read8(a),
        Target::External(a) => mem.read_u8(a as u64),
    }
}

pub fn read16(vram: &Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32) -> u16 {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.read16(a),
        Target::External(a) => mem.read_u16(a as u64),
    }
}

pub fn read32(vram: &Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32) -> u32 {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.read32(a),
        Target::External(a) => mem.read_u32(a as u64),
    }
}

pub fn write8(vram: &mut Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32, val: u8) {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.write8(a, val),
        Target::External(a) => mem.write_u8(a as u64, val),
    }
}

pub fn write16(vram: &mut Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32, val: u16) {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.write16(a, val),
        Target::External(a) => mem.write_u16(a as u64, val),
    }
}

pub fn write32(vram: &mut Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32, val: u32) {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.write32(a, val),
        Target::External(a) => mem.write_u32(a as u64, val),
    }
}

pub fn write64(vram: &mut Vram, mem: &mut dyn MemoryBus, object: u32, addr: u32, val: u64) {
    match resolve(vram, object, addr) {
        Target::Vram(a) => vram.write64(a, val),
        Target::External(a) => mem.write_u64(a as u64, val),
    }
}
