use std::cell::Cell;
use std::rc::Rc;

/// Monotonic guest-time source in nanoseconds.
///
/// The device never schedules host timers itself; the embedder owns time and
/// calls [`crate::GeForce::vblank_tick`] at its frame cadence.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

/// Manually advanced clock, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ns(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get().wrapping_add(ns));
    }

    pub fn set_ns(&self, ns: u64) {
        self.now_ns.set(ns);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }
}
