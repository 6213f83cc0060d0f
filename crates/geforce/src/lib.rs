//! Command-submission engine of an emulated NV20/NV30/NV40-era GeForce.
//!
//! The model covers the paths a guest driver exercises to get pixels on
//! screen: instance memory and its DMA descriptors, the handle hash table,
//! per-channel context records, the pushbuffer puller with its control-flow
//! decode, method dispatch to the 2D/3D object classes, the software-method
//! queue, and interrupt aggregation. Scanout, VGA compatibility, and PCI
//! plumbing live with the host.
//!
//! The engine is driven entirely by the host: MMIO accesses via
//! [`GeForce::mmio_read`]/[`GeForce::mmio_write`], a periodic
//! [`GeForce::vblank_tick`], and a [`Clock`] for timestamps. Guest physical
//! memory is borrowed per call through the `memory` crate's `MemoryBus`.

#![forbid(unsafe_code)]

pub mod chipset;
pub mod classes;
pub mod clock;
pub mod device;
pub mod dma;
pub mod exec;
pub mod fifo;
pub mod irq;
pub mod mmio;
pub mod ops;
pub mod ramfc;
pub mod ramht;
pub mod snapshot;
pub mod timer;
pub mod vram;

pub use chipset::{CardModel, ChipsetLayout, CHANNEL_COUNT, SUBCHANNEL_COUNT};
pub use clock::{Clock, ManualClock};
pub use device::GeForce;
pub use exec::Dispatch;
pub use irq::{IrqLine, NullIrqLine, PmcIntr, RecordingIrqLine};
pub use ops::{DirtyRect, DisplaySink, NullDisplay, RecordingDisplay};
