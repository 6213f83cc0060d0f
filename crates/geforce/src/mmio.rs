//! The MMIO register contract: PMC, PBUS, PFIFO, PTIMER, PGRAPH, PCRTC
//! interrupt and FIFO registers, the RAMIN window, and the per-channel user
//! windows.
//!
//! All registers are 32-bit. Reads of unknown addresses return 0, writes to
//! them are dropped; both are logged.

use memory::MemoryBus;
use tracing::debug;

use crate::chipset::CHANNEL_COUNT;
use crate::clock::Clock;
use crate::device::GeForce;
use crate::fifo::CACHE1_DEPTH;
use crate::ramfc::{OFFSET_DMA_GET, OFFSET_DMA_PUT, OFFSET_REF_CNT};

const REG_PMC_ID: u32 = 0x000000;
const REG_PMC_INTR: u32 = 0x000100;
const REG_PMC_INTR_EN: u32 = 0x000140;
const REG_PMC_ENABLE: u32 = 0x000200;

const REG_PBUS_INTR: u32 = 0x001100;
const REG_PBUS_INTR_EN: u32 = 0x001140;

const REG_PFIFO_INTR: u32 = 0x002100;
const REG_PFIFO_INTR_EN: u32 = 0x002140;
const REG_PFIFO_RAMHT: u32 = 0x002210;
const REG_PFIFO_RAMFC: u32 = 0x002214;
const REG_PFIFO_RAMRO: u32 = 0x002218;
const REG_PFIFO_RAMFC_NV40: u32 = 0x002220;
const REG_PFIFO_RUNOUT_STATUS: u32 = 0x002400;
const REG_PFIFO_MODE: u32 = 0x002504;
const REG_PFIFO_CACHE1_PUSH1: u32 = 0x003204;
const REG_PFIFO_CACHE1_PUT: u32 = 0x003210;
const REG_PFIFO_CACHE1_STATUS: u32 = 0x003214;
const REG_PFIFO_CACHE1_DMA_PUSH: u32 = 0x003220;
const REG_PFIFO_CACHE1_DMA_INSTANCE: u32 = 0x00322C;
const REG_PFIFO_CACHE1_DMA_CTL: u32 = 0x003230;
const REG_PFIFO_CACHE1_DMA_PUT: u32 = 0x003240;
const REG_PFIFO_CACHE1_DMA_GET: u32 = 0x003244;
const REG_PFIFO_CACHE1_REF_CNT: u32 = 0x003248;
const REG_PFIFO_CACHE1_PULL0: u32 = 0x003250;
const REG_PFIFO_CACHE1_GET: u32 = 0x003270;
const REG_PFIFO_GRCTX_INSTANCE: u32 = 0x0032E0;

/// Software-method queue register files: METHOD at +0, DATA at +4, one pair
/// per entry.
const REG_PFIFO_CACHE1_METHOD_BASE: u32 = 0x003800;
const REG_PFIFO_CACHE1_METHOD_END: u32 = REG_PFIFO_CACHE1_METHOD_BASE + CACHE1_DEPTH as u32 * 8;

const REG_PTIMER_INTR: u32 = 0x009100;
const REG_PTIMER_INTR_EN: u32 = 0x009140;
const REG_PTIMER_NUMERATOR: u32 = 0x009200;
const REG_PTIMER_DENOMINATOR: u32 = 0x009210;
const REG_PTIMER_TIME_0: u32 = 0x009400;
const REG_PTIMER_TIME_1: u32 = 0x009410;
const REG_PTIMER_ALARM_0: u32 = 0x009420;

const REG_PGRAPH_INTR: u32 = 0x400100;
const REG_PGRAPH_NSOURCE: u32 = 0x400108;
const REG_PGRAPH_INTR_EN_NV40: u32 = 0x40013C;
const REG_PGRAPH_INTR_EN: u32 = 0x400140;

const REG_PCRTC_INTR_0: u32 = 0x600100;
const REG_PCRTC_INTR_EN_0: u32 = 0x600140;

const RAMIN_WINDOW_BASE: u32 = 0x700000;
const RAMIN_WINDOW_END: u32 = 0x800000;
const USER_WINDOW_BASE: u32 = 0x800000;
const USER_WINDOW_END: u32 = 0xA00000;
const USER_NEW_WINDOW_BASE: u32 = 0xC00000;
const USER_NEW_WINDOW_END: u32 = 0xE00000;

fn busy_status(get: u32, put: u32) -> u32 {
    if get == put {
        0x0000_0010
    } else {
        0x0000_0000
    }
}

impl<C: Clock> GeForce<C> {
    pub fn mmio_read(&mut self, addr: u32) -> u32 {
        match addr {
            REG_PMC_ID => self.layout.pmc_id(),
            REG_PMC_INTR => self.intr.pending().bits(),
            REG_PMC_INTR_EN => self.intr.mc_intr_en,
            REG_PMC_ENABLE => self.intr.mc_enable,

            REG_PBUS_INTR => self.intr.bus_intr,
            REG_PBUS_INTR_EN => self.intr.bus_intr_en,

            REG_PFIFO_INTR => self.intr.fifo_intr,
            REG_PFIFO_INTR_EN => self.intr.fifo_intr_en,
            REG_PFIFO_RAMHT => self.fifo.ramht,
            REG_PFIFO_RAMFC if !self.layout.is_nv40() => self.fifo.ramfc,
            REG_PFIFO_RAMRO => self.fifo.ramro,
            REG_PFIFO_RAMFC_NV40 if self.layout.is_nv40() => self.fifo.ramfc,
            REG_PFIFO_RUNOUT_STATUS | REG_PFIFO_CACHE1_STATUS => {
                busy_status(self.fifo.cache1.get, self.fifo.cache1.put)
            }
            REG_PFIFO_MODE => self.fifo.mode,
            REG_PFIFO_CACHE1_PUSH1 => self.fifo.cache1.push1,
            REG_PFIFO_CACHE1_PUT => self.fifo.cache1.put,
            REG_PFIFO_CACHE1_DMA_PUSH => self.fifo.cache1.dma_push,
            REG_PFIFO_CACHE1_DMA_INSTANCE => self.fifo.cache1.dma_instance,
            REG_PFIFO_CACHE1_DMA_CTL => 0x8000_0000,
            REG_PFIFO_CACHE1_DMA_PUT => self.fifo.cache1.dma_put,
            REG_PFIFO_CACHE1_DMA_GET => self.fifo.cache1.dma_get,
            REG_PFIFO_CACHE1_REF_CNT => self.fifo.cache1.ref_cnt,
            REG_PFIFO_CACHE1_PULL0 => {
                // Reading the pull register re-evaluates the stall bit.
                if !self.fifo.cache1.queue_is_empty() {
                    self.fifo.cache1.pull0 |= 0x0000_0100;
                }
                self.fifo.cache1.pull0
            }
            REG_PFIFO_CACHE1_GET => self.fifo.cache1.get,
            REG_PFIFO_GRCTX_INSTANCE => self.fifo.grctx_instance,
            REG_PFIFO_CACHE1_METHOD_BASE..REG_PFIFO_CACHE1_METHOD_END => {
                let idx = ((addr - REG_PFIFO_CACHE1_METHOD_BASE) >> 3) as usize % CACHE1_DEPTH;
                if addr & 4 == 0 {
                    self.fifo.cache1.method[idx]
                } else {
                    self.fifo.cache1.data[idx]
                }
            }

            REG_PTIMER_INTR => self.ptimer.intr,
            REG_PTIMER_INTR_EN => self.ptimer.intr_en,
            REG_PTIMER_NUMERATOR => self.ptimer.numerator,
            REG_PTIMER_DENOMINATOR => self.ptimer.denominator,
            REG_PTIMER_TIME_0 => self.current_time() as u32,
            REG_PTIMER_TIME_1 => (self.current_time() >> 32) as u32,
            REG_PTIMER_ALARM_0 => self.ptimer.alarm,

            REG_PGRAPH_INTR => self.intr.graph_intr,
            REG_PGRAPH_NSOURCE => self.graph.nsource,
            REG_PGRAPH_INTR_EN_NV40 if self.layout.is_nv40() => self.intr.graph_intr_en,
            REG_PGRAPH_INTR_EN if !self.layout.is_nv40() => self.intr.graph_intr_en,

            REG_PCRTC_INTR_0 => self.intr.crtc_intr,
            REG_PCRTC_INTR_EN_0 => self.intr.crtc_intr_en,

            RAMIN_WINDOW_BASE..RAMIN_WINDOW_END => {
                self.vram.ramin_read32(addr - RAMIN_WINDOW_BASE)
            }
            USER_WINDOW_BASE..USER_WINDOW_END | USER_NEW_WINDOW_BASE..USER_NEW_WINDOW_END => {
                let (chid, offset) = user_window_decode(addr);
                self.user_window_read(chid, offset)
            }

            _ => {
                debug!(addr = format_args!("{addr:#08x}"), "unimplemented MMIO read");
                0
            }
        }
    }

    pub fn mmio_write(&mut self, addr: u32, val: u32, mem: &mut dyn MemoryBus) {
        match addr {
            REG_PMC_INTR_EN => {
                self.intr.mc_intr_en = val;
                self.update_irq();
            }
            REG_PMC_ENABLE => self.intr.mc_enable = val,

            REG_PBUS_INTR => {
                self.intr.bus_intr &= !val;
                self.update_irq();
            }
            REG_PBUS_INTR_EN => {
                self.intr.bus_intr_en = val;
                self.update_irq();
            }

            REG_PFIFO_INTR => {
                self.intr.fifo_intr &= !val;
                self.update_irq();
            }
            REG_PFIFO_INTR_EN => {
                self.intr.fifo_intr_en = val;
                self.update_irq();
            }
            REG_PFIFO_RAMHT => self.fifo.ramht = val,
            REG_PFIFO_RAMFC if !self.layout.is_nv40() => self.fifo.ramfc = val,
            REG_PFIFO_RAMRO => self.fifo.ramro = val,
            REG_PFIFO_RAMFC_NV40 if self.layout.is_nv40() => self.fifo.ramfc = val,
            REG_PFIFO_MODE => self.fifo.mode = val,
            REG_PFIFO_CACHE1_PUSH1 => self.fifo.cache1.push1 = val,
            REG_PFIFO_CACHE1_PUT => self.fifo.cache1.put = val,
            REG_PFIFO_CACHE1_DMA_PUSH => self.fifo.cache1.dma_push = val,
            REG_PFIFO_CACHE1_DMA_INSTANCE => self.fifo.cache1.dma_instance = val,
            REG_PFIFO_CACHE1_DMA_PUT => {
                self.fifo.cache1.dma_put = val;
                let chid = self.fifo.cache1.current_chid();
                self.process_channel(chid, mem);
            }
            REG_PFIFO_CACHE1_DMA_GET => self.fifo.cache1.dma_get = val,
            REG_PFIFO_CACHE1_REF_CNT => self.fifo.cache1.ref_cnt = val,
            REG_PFIFO_CACHE1_PULL0 => self.fifo.cache1.pull0 = val,
            REG_PFIFO_CACHE1_GET => {
                // Host acknowledges consumed software methods; the FIFO
                // interrupt tracks whether any remain.
                self.fifo.cache1.get = val & (CACHE1_DEPTH as u32 * 4 - 1);
                if self.fifo.cache1.queue_is_empty() {
                    self.intr.fifo_intr &= !0x0000_0001;
                    self.fifo.cache1.pull0 &= !0x0000_0100;
                } else {
                    self.intr.fifo_intr |= 0x0000_0001;
                }
                self.update_irq();
            }
            REG_PFIFO_GRCTX_INSTANCE => self.fifo.grctx_instance = val,

            REG_PTIMER_INTR => self.ptimer.intr &= !val,
            REG_PTIMER_INTR_EN => self.ptimer.intr_en = val,
            REG_PTIMER_NUMERATOR => self.ptimer.numerator = val,
            REG_PTIMER_DENOMINATOR => self.ptimer.denominator = val,
            REG_PTIMER_TIME_0 => {
                let now = self.clock.now_ns();
                self.ptimer.set_time_low(now, val);
            }
            REG_PTIMER_TIME_1 => {
                let now = self.clock.now_ns();
                self.ptimer.set_time_high(now, val);
            }
            REG_PTIMER_ALARM_0 => self.ptimer.alarm = val,

            REG_PGRAPH_INTR => {
                self.intr.graph_intr &= !val;
                self.update_irq();
            }
            REG_PGRAPH_NSOURCE => self.graph.nsource = val,
            REG_PGRAPH_INTR_EN_NV40 if self.layout.is_nv40() => {
                self.intr.graph_intr_en = val;
                self.update_irq();
            }
            REG_PGRAPH_INTR_EN if !self.layout.is_nv40() => {
                self.intr.graph_intr_en = val;
                self.update_irq();
            }

            REG_PCRTC_INTR_0 => {
                self.intr.crtc_intr &= !val;
                self.update_irq();
            }
            REG_PCRTC_INTR_EN_0 => {
                self.intr.crtc_intr_en = val;
                self.update_irq();
            }

            RAMIN_WINDOW_BASE..RAMIN_WINDOW_END => {
                self.vram.ramin_write32(addr - RAMIN_WINDOW_BASE, val);
            }
            USER_WINDOW_BASE..USER_WINDOW_END | USER_NEW_WINDOW_BASE..USER_NEW_WINDOW_END => {
                let (chid, offset) = user_window_decode(addr);
                self.user_window_write(chid, offset, val, mem);
            }

            _ => {
                debug!(
                    addr = format_args!("{addr:#08x}"),
                    val = format_args!("{val:#010x}"),
                    "unimplemented MMIO write"
                );
            }
        }
    }

    /// Per-channel submission window: the ring cursors read back from the
    /// live registers for the resident channel and from RAMFC for the rest.
    fn user_window_read(&mut self, chid: u32, offset: u32) -> u32 {
        match offset {
            0x10 => 0xFFFF,
            0x40 | 0x44 | 0x48 => {
                let live = self.fifo.cache1.current_chid() == chid;
                let field = match offset {
                    0x40 => OFFSET_DMA_PUT,
                    0x44 => OFFSET_DMA_GET,
                    _ => OFFSET_REF_CNT,
                };
                if live {
                    match field {
                        OFFSET_DMA_PUT => self.fifo.cache1.dma_put,
                        OFFSET_DMA_GET => self.fifo.cache1.dma_get,
                        _ => self.fifo.cache1.ref_cnt,
                    }
                } else {
                    self.ramfc_read(chid, field)
                }
            }
            _ => 0,
        }
    }

    fn user_window_write(&mut self, chid: u32, offset: u32, val: u32, mem: &mut dyn MemoryBus) {
        if offset == 0x40 {
            if self.fifo.cache1.current_chid() == chid {
                self.fifo.cache1.dma_put = val;
            } else {
                self.ramfc_write(chid, OFFSET_DMA_PUT, val);
            }
            self.process_channel(chid, mem);
        }
    }
}

fn user_window_decode(addr: u32) -> (u32, u32) {
    let (chid, offset) = if addr < USER_WINDOW_END {
        ((addr >> 16) & 0x1F, addr & 0x1FFF)
    } else {
        ((addr >> 12) & 0x1FF, addr & 0x1FF)
    };
    if chid >= CHANNEL_COUNT as u32 {
        (0, offset)
    } else {
        (chid, offset)
    }
}
