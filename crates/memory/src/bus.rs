/// Abstraction for host-side physical memory access.
///
/// DMA descriptors can target an address space outside the adapter's own
/// video memory; those accesses are delegated through this trait. Reads take
/// `&mut self` because a backing implementation may have side effects (MMIO
/// forwarding, dirty tracking).
pub trait MemoryBus {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]);
    fn write_physical(&mut self, paddr: u64, buf: &[u8]);

    fn read_u8(&mut self, paddr: u64) -> u8 {
        let mut buf = [0u8; 1];
        self.read_physical(paddr, &mut buf);
        buf[0]
    }

    fn read_u16(&mut self, paddr: u64) -> u16 {
        let mut buf = [0u8; 2];
        self.read_physical(paddr, &mut buf);
        u16::from_le_bytes(buf)
    }

    fn read_u32(&mut self, paddr: u64) -> u32 {
        let mut buf = [0u8; 4];
        self.read_physical(paddr, &mut buf);
        u32::from_le_bytes(buf)
    }

    fn read_u64(&mut self, paddr: u64) -> u64 {
        let mut buf = [0u8; 8];
        self.read_physical(paddr, &mut buf);
        u64::from_le_bytes(buf)
    }

    fn write_u8(&mut self, paddr: u64, val: u8) {
        self.write_physical(paddr, &[val]);
    }

    fn write_u16(&mut self, paddr: u64, val: u16) {
        self.write_physical(paddr, &val.to_le_bytes());
    }

    fn write_u32(&mut self, paddr: u64, val: u32) {
        self.write_physical(paddr, &val.to_le_bytes());
    }

    fn write_u64(&mut self, paddr: u64, val: u64) {
        self.write_physical(paddr, &val.to_le_bytes());
    }
}

/// `Vec<u8>`-backed physical memory.
///
/// Accesses outside the backing range read as zeroes and drop writes; guest
/// descriptors control the addresses reaching this type, so it must never
/// panic on them.
#[derive(Clone, Debug)]
pub struct VecMemory {
    data: Vec<u8>,
}

impl VecMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, paddr: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(paddr).ok()?;
        let end = start.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        Some(start..end)
    }
}

impl MemoryBus for VecMemory {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        match self.range(paddr, buf.len()) {
            Some(r) => buf.copy_from_slice(&self.data[r]),
            None => buf.fill(0),
        }
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        if let Some(r) = self.range(paddr, buf.len()) {
            self.data[r].copy_from_slice(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn le_helpers_round_trip() {
        let mut mem = VecMemory::new(0x100);
        mem.write_u16(0x10, 0xBEEF);
        mem.write_u32(0x20, 0xDEAD_BEEF);
        mem.write_u64(0x30, 0x0123_4567_89AB_CDEF);
        assert_eq!(mem.read_u16(0x10), 0xBEEF);
        assert_eq!(mem.read_u32(0x20), 0xDEAD_BEEF);
        assert_eq!(mem.read_u64(0x30), 0x0123_4567_89AB_CDEF);
        // Little-endian in memory.
        assert_eq!(mem.read_u8(0x20), 0xEF);
        assert_eq!(mem.read_u8(0x23), 0xDE);
    }

    #[test]
    fn out_of_range_reads_zero_and_writes_are_dropped() {
        let mut mem = VecMemory::new(0x10);
        mem.write_u32(0x10, 0x1234_5678);
        assert_eq!(mem.read_u32(0x10), 0);
        // A straddling access is dropped entirely, not truncated.
        mem.write_u32(0x0E, 0x1234_5678);
        assert_eq!(mem.read_u16(0x0E), 0);
        assert_eq!(mem.read_u32(u64::MAX - 2), 0);
    }

    proptest! {
        #[test]
        fn in_range_u32_round_trips(addr in 0u64..0xFC, val: u32) {
            let mut mem = VecMemory::new(0x100);
            mem.write_u32(addr, val);
            prop_assert_eq!(mem.read_u32(addr), val);
        }

        #[test]
        fn arbitrary_access_never_panics(addr: u64, val: u32) {
            let mut mem = VecMemory::new(0x100);
            mem.write_u32(addr, val);
            let _ = mem.read_u32(addr);
        }
    }
}
