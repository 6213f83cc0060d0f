//! Interrupt aggregation.
//!
//! Each engine block keeps a pending word and an enable word; the master
//! control block folds them into one level-triggered line, gated by the
//! master enable.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;

bitflags! {
    /// Per-block summary bits as they appear in the master interrupt
    /// register (PMC_INTR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PmcIntr: u32 {
        const PFIFO = 1 << 8;
        const PGRAPH = 1 << 12;
        const PCRTC = 1 << 24;
        const PBUS = 1 << 28;
    }
}

/// Level-triggered interrupt output (PCI INTx in the original device).
pub trait IrqLine {
    fn set_level(&mut self, asserted: bool);
}

/// Line that goes nowhere, for hosts that poll PMC_INTR instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIrqLine;

impl IrqLine for NullIrqLine {
    fn set_level(&mut self, _asserted: bool) {}
}

/// Shared-handle recording line for tests: clone it, hand one copy to the
/// device, keep the other to observe.
#[derive(Debug, Clone, Default)]
pub struct RecordingIrqLine {
    asserted: Rc<Cell<bool>>,
    events: Rc<RefCell<Vec<bool>>>,
}

impl RecordingIrqLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted.get()
    }

    pub fn take_events(&self) -> Vec<bool> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl IrqLine for RecordingIrqLine {
    fn set_level(&mut self, asserted: bool) {
        self.asserted.set(asserted);
        self.events.borrow_mut().push(asserted);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    pub mc_intr_en: u32,
    pub mc_enable: u32,
    pub bus_intr: u32,
    pub bus_intr_en: u32,
    pub fifo_intr: u32,
    pub fifo_intr_en: u32,
    pub graph_intr: u32,
    pub graph_intr_en: u32,
    pub crtc_intr: u32,
    pub crtc_intr_en: u32,
}

impl Interrupts {
    /// Enabled-and-pending summary, as read through PMC_INTR.
    pub fn pending(&self) -> PmcIntr {
        let mut level = PmcIntr::empty();
        if self.bus_intr & self.bus_intr_en != 0 {
            level |= PmcIntr::PBUS;
        }
        if self.fifo_intr & self.fifo_intr_en != 0 {
            level |= PmcIntr::PFIFO;
        }
        if self.graph_intr & self.graph_intr_en != 0 {
            level |= PmcIntr::PGRAPH;
        }
        if self.crtc_intr & self.crtc_intr_en != 0 {
            level |= PmcIntr::PCRTC;
        }
        level
    }

    /// Recomputes the output line level.
    pub fn update(&self, line: &mut dyn IrqLine) {
        line.set_level(!self.pending().is_empty() && self.mc_intr_en & 1 != 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_enable_gates_the_line() {
        let mut intr = Interrupts::default();
        let mut line = RecordingIrqLine::new();

        intr.fifo_intr = 1;
        intr.fifo_intr_en = 1;
        intr.update(&mut line.clone());
        assert!(!line.is_asserted());

        intr.mc_intr_en = 1;
        intr.update(&mut line.clone());
        assert!(line.is_asserted());
        assert_eq!(intr.pending(), PmcIntr::PFIFO);
    }

    #[test]
    fn per_block_enables_mask_pending_bits() {
        let mut intr = Interrupts {
            mc_intr_en: 1,
            ..Default::default()
        };
        intr.graph_intr = 1;
        intr.crtc_intr = 1;
        assert_eq!(intr.pending(), PmcIntr::empty());

        intr.graph_intr_en = 1;
        assert_eq!(intr.pending(), PmcIntr::PGRAPH);

        intr.crtc_intr_en = 1;
        assert_eq!(intr.pending(), PmcIntr::PGRAPH | PmcIntr::PCRTC);
    }
}
