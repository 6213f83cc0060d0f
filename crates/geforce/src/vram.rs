//! Device-local memory and its instance-memory (RAMIN) alias.
//!
//! Out-of-range accesses are guest-reachable and must be harmless: reads
//! return zero, writes are dropped, both are logged.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct Vram {
    bytes: Vec<u8>,
    flip: u32,
}

impl Vram {
    pub fn new(size: u32, flip: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
            flip,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn range(&self, addr: u32, len: u32) -> Option<std::ops::Range<usize>> {
        match addr.checked_add(len) {
            Some(end) if end as usize <= self.bytes.len() => Some(addr as usize..end as usize),
            _ => {
                debug!(addr, len, "VRAM access out of range");
                None
            }
        }
    }

    pub fn read8(&self, addr: u32) -> u8 {
        match self.range(addr, 1) {
            Some(r) => self.bytes[r.start],
            None => 0,
        }
    }

    pub fn read16(&self, addr: u32) -> u16 {
        match self.range(addr, 2) {
            Some(r) => u16::from_le_bytes(self.bytes[r].try_into().expect("2-byte range")),
            None => 0,
        }
    }

    pub fn read32(&self, addr: u32) -> u32 {
        match self.range(addr, 4) {
            Some(r) => u32::from_le_bytes(self.bytes[r].try_into().expect("4-byte range")),
            None => 0,
        }
    }

    pub fn write8(&mut self, addr: u32, val: u8) {
        if let Some(r) = self.range(addr, 1) {
            self.bytes[r.start] = val;
        }
    }

    pub fn write16(&mut self, addr: u32, val: u16) {
        if let Some(r) = self.range(addr, 2) {
            self.bytes[r].copy_from_slice(&val.to_le_bytes());
        }
    }

    pub fn write32(&mut self, addr: u32, val: u32) {
        if let Some(r) = self.range(addr, 4) {
            self.bytes[r].copy_from_slice(&val.to_le_bytes());
        }
    }

    pub fn write64(&mut self, addr: u32, val: u64) {
        if let Some(r) = self.range(addr, 8) {
            self.bytes[r].copy_from_slice(&val.to_le_bytes());
        }
    }

    /// Instance-memory accessors. RAMIN address `a` aliases VRAM address
    /// `a ^ flip`, which walks 64-byte blocks downward from the top of VRAM.
    pub fn ramin_read32(&self, addr: u32) -> u32 {
        self.read32(addr ^ self.flip)
    }

    pub fn ramin_write32(&mut self, addr: u32, val: u32) {
        self.write32(addr ^ self.flip, val);
    }
}
