//! The pull side of the command FIFO: CACHE1 registers, the software-method
//! queue, and the per-channel ring puller.
//!
//! Exactly one channel is live in the CACHE1 registers at a time; switching
//! channels exchanges the five cursor fields with the RAMFC record. The
//! puller fetches ring words through a descriptor, decodes control flow, and
//! feeds method parameters to the dispatcher until the ring drains or a
//! dispatch defers to the software path.

use memory::MemoryBus;
use tracing::debug;

use crate::chipset::CHANNEL_COUNT;
use crate::classes::PendingMethod;
use crate::clock::Clock;
use crate::device::GeForce;
use crate::dma;
use crate::exec::Dispatch;
use crate::ramfc::{self, OFFSET_DMA_GET, OFFSET_DMA_INSTANCE, OFFSET_DMA_PUT, OFFSET_REF_CNT};

/// Entries in the software-method queue.
pub const CACHE1_DEPTH: usize = 64;

/// Per-invocation decode budget. Control-flow words move the get cursor
/// without consuming ring space, so a jump targeting itself would otherwise
/// spin forever. A well-formed stream never comes close; a looping one gives
/// the host back control and resumes on the next kick.
const PULL_BUDGET: u32 = 64 * 1024;

/// Live pull-side state. The `dma_*` cursors belong to the channel named in
/// the low bits of `push1`; everything else is global engine state.
#[derive(Debug, Clone)]
pub struct Cache1 {
    pub push1: u32,
    pub dma_push: u32,
    pub dma_instance: u32,
    pub dma_put: u32,
    pub dma_get: u32,
    pub ref_cnt: u32,
    pub pull0: u32,
    pub semaphore: u32,
    /// Software-method queue: byte-scaled put/get registers over two
    /// parallel 64-entry register files.
    pub put: u32,
    pub get: u32,
    pub method: [u32; CACHE1_DEPTH],
    pub data: [u32; CACHE1_DEPTH],
}

impl Default for Cache1 {
    fn default() -> Self {
        Self {
            push1: 0,
            dma_push: 0,
            dma_instance: 0,
            dma_put: 0,
            dma_get: 0,
            ref_cnt: 0,
            pull0: 0,
            semaphore: 0,
            put: 0,
            get: 0,
            method: [0; CACHE1_DEPTH],
            data: [0; CACHE1_DEPTH],
        }
    }
}

impl Cache1 {
    pub fn current_chid(&self) -> u32 {
        self.push1 & 0x1F
    }

    pub fn queue_is_empty(&self) -> bool {
        self.get == self.put
    }

    /// Appends a deferred method. The put register advances by 4 per entry
    /// and wraps; the host consumes entries by advancing the get register.
    pub fn enqueue(&mut self, subc: u32, method: u32, param: u32) {
        let idx = (self.put as usize / 4) % CACHE1_DEPTH;
        self.method[idx] = (method << 2) | (subc << 13);
        self.data[idx] = param;
        self.put = (self.put + 4) % (CACHE1_DEPTH as u32 * 4);
    }
}

/// Engine-level FIFO registers.
#[derive(Debug, Clone, Default)]
pub struct Fifo {
    pub ramht: u32,
    pub ramfc: u32,
    pub ramro: u32,
    pub mode: u32,
    pub grctx_instance: u32,
    pub cache1: Cache1,
}

impl<C: Clock> GeForce<C> {
    /// Runs the ring puller for `chid` until its ring drains or a method
    /// defers to the software path.
    pub fn process_channel(&mut self, chid: u32, mem: &mut dyn MemoryBus) {
        let chid = chid % CHANNEL_COUNT as u32;
        let oldchid = self.fifo.cache1.current_chid();

        if oldchid == chid {
            if self.fifo.cache1.dma_put == self.fifo.cache1.dma_get {
                return;
            }
        } else {
            let put = self.ramfc_read(chid, OFFSET_DMA_PUT);
            let get = self.ramfc_read(chid, OFFSET_DMA_GET);
            if put == get {
                return;
            }
            self.switch_channel(oldchid, chid);
        }

        let mut ch = std::mem::take(&mut self.channels[chid as usize]);
        let mut budget = PULL_BUDGET;
        while self.fifo.cache1.dma_get != self.fifo.cache1.dma_put {
            if budget == 0 {
                debug!(chid, "decode budget exhausted");
                break;
            }
            budget -= 1;
            let word = dma::read32(
                &self.vram,
                mem,
                self.fifo.cache1.dma_instance << 4,
                self.fifo.cache1.dma_get,
            );
            self.fifo.cache1.dma_get = self.fifo.cache1.dma_get.wrapping_add(4);

            if ch.pending.count > 0 {
                let (subc, method) = (ch.pending.subc, ch.pending.method);
                match self.execute_method(&mut ch, chid, subc, method, word, mem) {
                    Dispatch::Deferred => {
                        // Rewind so the word is re-fetched once the host has
                        // drained the software queue.
                        self.fifo.cache1.dma_get = self.fifo.cache1.dma_get.wrapping_sub(4);
                        self.acquire_pending = true;
                        break;
                    }
                    Dispatch::Executed => {
                        if !ch.pending.non_increment {
                            ch.pending.method += 1;
                        }
                        ch.pending.count -= 1;
                    }
                }
            } else if word & 0xE000_0003 == 0x2000_0000 {
                // Old-style jump.
                self.fifo.cache1.dma_get = word & 0x1FFF_FFFF;
            } else if word & 3 == 1 {
                self.fifo.cache1.dma_get = word & 0xFFFF_FFFC;
            } else if word & 3 == 2 {
                if ch.subr_active {
                    debug!(chid, "call with subroutine active");
                } else {
                    ch.subr_return = self.fifo.cache1.dma_get;
                    ch.subr_active = true;
                    self.fifo.cache1.dma_get = word & 0xFFFF_FFFC;
                }
            } else if word == 0x0002_0000 {
                if !ch.subr_active {
                    debug!(chid, "return with subroutine inactive");
                } else {
                    self.fifo.cache1.dma_get = ch.subr_return;
                    ch.subr_active = false;
                }
            } else if word & 0xA003_0003 == 0 {
                ch.pending = PendingMethod {
                    method: (word >> 2) & 0x7FF,
                    subc: (word >> 13) & 7,
                    count: (word >> 18) & 0x7FF,
                    non_increment: word & 0x4000_0000 != 0,
                };
            } else {
                debug!(chid, word, "unexpected FIFO word");
            }
        }
        self.channels[chid as usize] = ch;
    }

    /// Saves the live cursors into the outgoing channel's RAMFC record and
    /// loads the incoming channel's.
    fn switch_channel(&mut self, oldchid: u32, chid: u32) {
        let sem = self.layout.ramfc_semaphore_offset;

        self.ramfc_write(oldchid, OFFSET_DMA_PUT, self.fifo.cache1.dma_put);
        self.ramfc_write(oldchid, OFFSET_DMA_GET, self.fifo.cache1.dma_get);
        self.ramfc_write(oldchid, OFFSET_REF_CNT, self.fifo.cache1.ref_cnt);
        self.ramfc_write(oldchid, OFFSET_DMA_INSTANCE, self.fifo.cache1.dma_instance);
        self.ramfc_write(oldchid, sem, self.fifo.cache1.semaphore);

        self.fifo.cache1.dma_put = self.ramfc_read(chid, OFFSET_DMA_PUT);
        self.fifo.cache1.dma_get = self.ramfc_read(chid, OFFSET_DMA_GET);
        self.fifo.cache1.ref_cnt = self.ramfc_read(chid, OFFSET_REF_CNT);
        self.fifo.cache1.dma_instance = self.ramfc_read(chid, OFFSET_DMA_INSTANCE);
        self.fifo.cache1.semaphore = self.ramfc_read(chid, sem);

        self.fifo.cache1.push1 = (self.fifo.cache1.push1 & !0x1F) | chid;
    }

    pub(crate) fn ramfc_read(&self, chid: u32, offset: u32) -> u32 {
        ramfc::read32(&self.vram, &self.layout, self.fifo.ramfc, chid, offset)
    }

    pub(crate) fn ramfc_write(&mut self, chid: u32, offset: u32, value: u32) {
        ramfc::write32(
            &mut self.vram,
            &self.layout,
            self.fifo.ramfc,
            chid,
            offset,
            value,
        );
    }
}
