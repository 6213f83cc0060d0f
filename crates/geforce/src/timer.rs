//! PTIMER: the free-running hardware timestamp counter.
//!
//! The counter value is derived from the host clock plus a settable base; the
//! hardware exposes it with 32-byte granularity. Notifier timestamps and the
//! TIME_0/TIME_1 registers both read it.

#[derive(Debug, Clone, Default)]
pub struct Ptimer {
    pub intr: u32,
    pub intr_en: u32,
    pub numerator: u32,
    pub denominator: u32,
    pub alarm: u32,
    /// Guest-programmed counter base and the host time it was set at.
    base: u64,
    base_set_at_ns: u64,
}

impl Ptimer {
    pub fn current_time(&self, now_ns: u64) -> u64 {
        self.base
            .wrapping_add(now_ns)
            .wrapping_sub(self.base_set_at_ns)
            & !0x1F
    }

    pub fn set_time_low(&mut self, now_ns: u64, value: u32) {
        self.base = (self.base & 0xFFFF_FFFF_0000_0000) | u64::from(value);
        self.base_set_at_ns = now_ns;
    }

    pub fn set_time_high(&mut self, now_ns: u64, value: u32) {
        self.base = (self.base & 0x0000_0000_FFFF_FFFF) | (u64::from(value) << 32);
        self.base_set_at_ns = now_ns;
    }

    /// Counter value without the readout granularity mask, for persistence.
    pub fn raw_time(&self, now_ns: u64) -> u64 {
        self.base.wrapping_add(now_ns).wrapping_sub(self.base_set_at_ns)
    }

    /// Re-bases the counter so it resumes from `value`.
    pub fn restore_time(&mut self, now_ns: u64, value: u64) {
        self.base = value;
        self.base_set_at_ns = now_ns;
    }
}
