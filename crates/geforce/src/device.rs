//! Device assembly: owns the VRAM, the register blocks, the channel table,
//! and the collaborator seams.

use memory::MemoryBus;

use crate::chipset::{CardModel, ChipsetLayout, CHANNEL_COUNT};
use crate::classes::Channel;
use crate::clock::Clock;
use crate::fifo::Fifo;
use crate::irq::{Interrupts, IrqLine, NullIrqLine};
use crate::ops::{DisplaySink, NullDisplay};
use crate::timer::Ptimer;
use crate::vram::Vram;

/// Graphics-engine error reporting registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphRegs {
    pub nsource: u32,
    pub notify: u32,
}

/// The command-submission engine of an NV20/NV30/NV40-era GeForce.
///
/// The host drives it through [`mmio_read`](GeForce::mmio_read) /
/// [`mmio_write`](GeForce::mmio_write) and a periodic
/// [`vblank_tick`](GeForce::vblank_tick); guest physical memory is passed in
/// per call so the engine never owns the bus.
pub struct GeForce<C: Clock> {
    pub(crate) layout: ChipsetLayout,
    pub(crate) clock: C,
    pub(crate) vram: Vram,
    pub(crate) irq_line: Box<dyn IrqLine>,
    pub(crate) display: Box<dyn DisplaySink>,
    pub(crate) intr: Interrupts,
    pub(crate) graph: GraphRegs,
    pub(crate) ptimer: Ptimer,
    pub(crate) fifo: Fifo,
    pub(crate) channels: Vec<Channel>,
    /// Set when a channel deferred to the software path; the next vblank
    /// tick re-drives every channel.
    pub(crate) acquire_pending: bool,
}

impl<C: Clock> GeForce<C> {
    pub fn new(model: CardModel, clock: C) -> Self {
        let layout = ChipsetLayout::for_model(model);
        let vram = Vram::new(layout.vram_size, layout.ramin_flip());
        Self {
            layout,
            clock,
            vram,
            irq_line: Box::new(NullIrqLine),
            display: Box::new(NullDisplay),
            intr: Interrupts::default(),
            graph: GraphRegs::default(),
            ptimer: Ptimer::default(),
            fifo: Fifo::default(),
            channels: (0..CHANNEL_COUNT).map(|_| Channel::default()).collect(),
            acquire_pending: false,
        }
    }

    pub fn with_irq_line(mut self, line: impl IrqLine + 'static) -> Self {
        self.irq_line = Box::new(line);
        self
    }

    pub fn with_display(mut self, display: impl DisplaySink + 'static) -> Self {
        self.display = Box::new(display);
        self
    }

    /// Clears channel, FIFO, and interrupt state. VRAM contents survive, as
    /// on the hardware's soft reset.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            *ch = Channel::default();
        }
        self.intr = Interrupts::default();
        self.graph = GraphRegs::default();
        self.ptimer = Ptimer::default();
        self.fifo = Fifo::default();
        self.acquire_pending = false;
        self.update_irq();
    }

    /// Raises the display interrupt source and re-drives any channels that
    /// deferred to the software path since the last tick.
    pub fn vblank_tick(&mut self, mem: &mut dyn MemoryBus) {
        self.intr.crtc_intr |= 0x0000_0001;
        self.update_irq();

        if self.acquire_pending {
            self.acquire_pending = false;
            for chid in 0..CHANNEL_COUNT as u32 {
                self.process_channel(chid, mem);
            }
        }
    }

    pub(crate) fn update_irq(&mut self) {
        self.intr.update(self.irq_line.as_mut());
    }

    pub(crate) fn current_time(&self) -> u64 {
        self.ptimer.current_time(self.clock.now_ns())
    }

    pub fn model(&self) -> CardModel {
        self.layout.model
    }

    pub fn vram(&self) -> &Vram {
        &self.vram
    }

    pub fn vram_mut(&mut self) -> &mut Vram {
        &mut self.vram
    }

    pub fn interrupts(&self) -> &Interrupts {
        &self.intr
    }

    pub fn channel(&self, chid: u32) -> &Channel {
        &self.channels[chid as usize % CHANNEL_COUNT]
    }

    pub fn acquire_pending(&self) -> bool {
        self.acquire_pending
    }
}
