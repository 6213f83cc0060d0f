#![forbid(unsafe_code)]

mod bus;

pub use bus::{MemoryBus, VecMemory};
