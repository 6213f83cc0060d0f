//! End-to-end tests driving the engine the way a guest driver does: build
//! instance memory, point the registers at it, and submit pushbuffer rings
//! through the MMIO surface.

use geforce::ramht;
use geforce::{
    CardModel, DirtyRect, GeForce, ManualClock, RecordingDisplay, RecordingIrqLine,
};
use memory::{MemoryBus, VecMemory};
use pretty_assertions::assert_eq;

// Instance-memory layout used by every test.
const RAMHT_REG: u32 = 0x0010; // base 0x1000, 9 hash bits
const RAMHT_BASE: u32 = 0x1000;
const RAMHT_BITS: u32 = 9;
const RAMFC_REG: u32 = 0x0020; // records at 0x2000
const PUSH_DESC: u32 = 0x3000; // pushbuffer descriptor (external linear)
const PUSHBUF_PHYS: u32 = 0x1_0000;

const REG_PMC_INTR_EN: u32 = 0x000140;
const REG_PFIFO_INTR: u32 = 0x002100;
const REG_PFIFO_INTR_EN: u32 = 0x002140;
const REG_PFIFO_RAMHT: u32 = 0x002210;
const REG_PFIFO_RAMFC: u32 = 0x002214;
const REG_CACHE1_DMA_INSTANCE: u32 = 0x00322C;
const REG_CACHE1_DMA_PUT: u32 = 0x003240;
const REG_CACHE1_DMA_GET: u32 = 0x003244;
const REG_CACHE1_REF_CNT: u32 = 0x003248;
const REG_CACHE1_PULL0: u32 = 0x003250;
const REG_CACHE1_GET: u32 = 0x003270;
const REG_CACHE1_PUT: u32 = 0x003210;
const REG_PGRAPH_INTR: u32 = 0x400100;
const REG_PGRAPH_NSOURCE: u32 = 0x400108;

struct Rig {
    gpu: GeForce<ManualClock>,
    clock: ManualClock,
    mem: VecMemory,
    irq: RecordingIrqLine,
    display: RecordingDisplay,
    ring_len: u32,
}

impl Rig {
    fn new() -> Self {
        let clock = ManualClock::new();
        let irq = RecordingIrqLine::new();
        let display = RecordingDisplay::new();
        let mut gpu = GeForce::new(CardModel::GeForce3, clock.clone())
            .with_irq_line(irq.clone())
            .with_display(display.clone());
        let mut mem = VecMemory::new(0x10_0000);

        gpu.mmio_write(REG_PFIFO_RAMHT, RAMHT_REG, &mut mem);
        gpu.mmio_write(REG_PFIFO_RAMFC, RAMFC_REG, &mut mem);

        // Pushbuffer descriptor: linear, external, base PUSHBUF_PHYS.
        gpu.vram_mut().ramin_write32(PUSH_DESC, 0x0002_2000);
        gpu.vram_mut().ramin_write32(PUSH_DESC + 8, PUSHBUF_PHYS);

        Self {
            gpu,
            clock,
            mem,
            irq,
            display,
            ring_len: 0,
        }
    }

    /// Installs a handle table entry, probing past occupied slots the way a
    /// driver building the table would.
    fn install_handle(&mut self, handle: u32, chid: u32, object: u32, engine: u32) {
        let size = 1u32 << (RAMHT_BITS + 3);
        let mut slot = ramht::slot_offset(handle, chid, RAMHT_BITS);
        while self.gpu.vram().ramin_read32(RAMHT_BASE + slot) != 0 {
            slot = (slot + 8) % size;
        }
        let ctx = (chid << 24) | (engine << 16) | (object >> 4);
        self.gpu.vram_mut().ramin_write32(RAMHT_BASE + slot, handle);
        self.gpu.vram_mut().ramin_write32(RAMHT_BASE + slot + 4, ctx);
    }

    /// Creates a graphics object: class id in word 0, packed notifier
    /// reference in word 1.
    fn install_object(&mut self, object: u32, class_id: u32, notifier: u32) {
        self.gpu.vram_mut().ramin_write32(object, class_id);
        self.gpu
            .vram_mut()
            .ramin_write32(object + 4, (notifier >> 4) << 16);
    }

    fn push(&mut self, word: u32) {
        self.mem
            .write_u32(u64::from(PUSHBUF_PHYS + self.ring_len), word);
        self.ring_len += 4;
    }

    fn push_method(&mut self, subc: u32, method: u32, params: &[u32]) {
        self.push((params.len() as u32) << 18 | subc << 13 | method << 2);
        for &p in params {
            self.push(p);
        }
    }

    /// Points channel 0's live cursors at the ring and kicks the puller.
    fn run(&mut self) {
        self.gpu
            .mmio_write(REG_CACHE1_DMA_INSTANCE, PUSH_DESC >> 4, &mut self.mem);
        self.gpu
            .mmio_write(REG_CACHE1_DMA_PUT, self.ring_len, &mut self.mem);
    }
}

#[test]
fn bind_then_rop_method_updates_channel_state() {
    let mut rig = Rig::new();
    rig.install_object(0x4000, 0x43, 0);
    rig.install_handle(0xBEEF_0001, 0, 0x4000, 1);

    rig.push_method(3, 0x000, &[0xBEEF_0001]);
    rig.push_method(3, 0x0C0, &[0x0C]);
    rig.run();

    let ch = rig.gpu.channel(0);
    assert_eq!(ch.subchannels[3].object, 0x4000);
    assert_eq!(ch.subchannels[3].engine, 1);
    assert_eq!(ch.rop, 0x0C);
}

#[test]
fn run_length_header_dispatches_consecutive_methods() {
    let mut rig = Rig::new();
    rig.install_object(0x4000, 0x44, 0);
    rig.install_handle(0xA0A0_0001, 0, 0x4000, 1);

    rig.push_method(2, 0x000, &[0xA0A0_0001]);
    // One header, three parameters: methods 0x100, 0x101, 0x102 in order.
    rig.push_method(2, 0x100, &[0x0403_0201, 0x0807_0605, 0x0C0B_0A09]);
    rig.run();

    let pattern = &rig.gpu.channel(0).pattern;
    assert_eq!(pattern.color[0], 0x01);
    assert_eq!(pattern.color[3], 0x04);
    assert_eq!(pattern.color[4], 0x05);
    assert_eq!(pattern.color[8], 0x09);
    assert_eq!(pattern.color[11], 0x0C);
}

#[test]
fn non_increment_header_repeats_one_method() {
    let mut rig = Rig::new();
    rig.install_object(0x4000, 0x43, 0);
    rig.install_handle(0xBEEF_0001, 0, 0x4000, 1);

    rig.push_method(0, 0x000, &[0xBEEF_0001]);
    // Non-increment run: every parameter goes to method 0x0C0.
    rig.push(3 << 18 | 0x0C0 << 2 | 0x4000_0000);
    rig.push(0x11);
    rig.push(0x22);
    rig.push(0x33);
    rig.run();

    assert_eq!(rig.gpu.channel(0).rop, 0x33);
}

#[test]
fn jump_words_move_the_get_cursor() {
    let mut rig = Rig::new();
    // Old-style jump to 0x10, then a new-style jump back past the ring end.
    rig.push(0x2000_0000 | 0x10);
    rig.ring_len = 0x10;
    rig.push(0x18 | 1);
    rig.ring_len = 0x18;
    rig.run();

    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x18);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_PUT), 0x18);
}

#[test]
fn call_with_active_subroutine_is_ignored() {
    let mut rig = Rig::new();
    // Call to 0x100; there a nested call (ignored), then a return.
    rig.push(0x100 | 2);
    rig.ring_len = 0x100;
    rig.push(0x180 | 2);
    rig.push(0x0002_0000);
    // Back at 0x4: jump straight to the put cursor.
    rig.mem.write_u32(u64::from(PUSHBUF_PHYS + 4), 0x8 | 1);
    rig.ring_len = 0x8;
    rig.run();

    let ch = rig.gpu.channel(0);
    assert!(!ch.subr_active);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x8);
}

#[test]
fn return_without_subroutine_is_ignored() {
    let mut rig = Rig::new();
    rig.push(0x0002_0000);
    rig.push(0x8 | 1);
    rig.run();

    assert!(!rig.gpu.channel(0).subr_active);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x8);
}

#[test]
fn context_switch_round_trip_restores_cursor_fields() {
    let mut rig = Rig::new();
    // Channel 1's ring: one jump that lands on its put cursor.
    rig.push(0x4 | 1);

    // Prime channel 1's context record: descriptor, ref count, semaphore.
    let ramfc1 = 0x2000 + 0x40;
    rig.gpu.vram_mut().ramin_write32(ramfc1 + 0x8, 0x111);
    rig.gpu.vram_mut().ramin_write32(ramfc1 + 0xC, PUSH_DESC >> 4);
    rig.gpu.vram_mut().ramin_write32(ramfc1 + 0x2C, 0x222);

    // Ring-put write through the user window switches 0 -> 1 and drains.
    rig.gpu
        .mmio_write(0x80_0000 | 1 << 16 | 0x40, 0x4, &mut rig.mem);
    assert_eq!(rig.gpu.mmio_read(0x003204) & 0x1F, 1);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_REF_CNT), 0x111);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x4);

    // Same dance for channel 2.
    let ramfc2 = 0x2000 + 2 * 0x40;
    rig.gpu.vram_mut().ramin_write32(ramfc2 + 0x8, 0x333);
    rig.gpu.vram_mut().ramin_write32(ramfc2 + 0xC, PUSH_DESC >> 4);
    rig.gpu
        .mmio_write(0x80_0000 | 2 << 16 | 0x40, 0x4, &mut rig.mem);
    assert_eq!(rig.gpu.mmio_read(0x003204) & 0x1F, 2);

    // Channel 1's fields were saved on the way out.
    assert_eq!(rig.gpu.vram().ramin_read32(ramfc1), 0x4);
    assert_eq!(rig.gpu.vram().ramin_read32(ramfc1 + 0x4), 0x4);
    assert_eq!(rig.gpu.vram().ramin_read32(ramfc1 + 0x8), 0x111);
    assert_eq!(rig.gpu.vram().ramin_read32(ramfc1 + 0x2C), 0x222);

    // Extend channel 1's ring and switch back: live registers must match
    // the saved values exactly.
    rig.mem.write_u32(u64::from(PUSHBUF_PHYS + 4), 0x8 | 1);
    rig.gpu
        .mmio_write(0x80_0000 | 1 << 16 | 0x40, 0x8, &mut rig.mem);
    assert_eq!(rig.gpu.mmio_read(0x003204) & 0x1F, 1);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x8);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_REF_CNT), 0x111);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_INSTANCE), PUSH_DESC >> 4);
}

#[test]
fn software_method_defers_and_vblank_redrives() {
    let mut rig = Rig::new();
    rig.gpu.mmio_write(REG_PMC_INTR_EN, 1, &mut VecMemory::new(0));
    rig.gpu
        .mmio_write(REG_PFIFO_INTR_EN, 1, &mut VecMemory::new(0));

    // The handle resolves to the software engine.
    rig.install_handle(0x50F7_0001, 0, 0x4000, 0);
    rig.push_method(0, 0x000, &[0x50F7_0001]);
    rig.run();

    // Deferred: queued, interrupting, pull stalled, get rewound onto the
    // parameter word.
    assert_eq!(rig.gpu.mmio_read(REG_PFIFO_INTR) & 1, 1);
    assert!(rig.irq.is_asserted());
    assert_ne!(rig.gpu.mmio_read(REG_CACHE1_PULL0) & 0x100, 0);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0x4);
    assert_eq!(rig.gpu.mmio_read(0x003800), 0); // packed method 0, subchannel 0
    assert_eq!(rig.gpu.mmio_read(0x003804), 0x50F7_0001);
    assert_eq!(rig.gpu.mmio_read(0x002400), 0); // runout: busy
    assert!(rig.gpu.acquire_pending());

    // Host services the method: repoints the handle at a real object and
    // acknowledges the queue.
    rig.install_object(0x4000, 0x43, 0);
    let slot = {
        let mut s = ramht::slot_offset(0x50F7_0001, 0, RAMHT_BITS);
        while rig.gpu.vram().ramin_read32(RAMHT_BASE + s) != 0x50F7_0001 {
            s += 8;
        }
        s
    };
    rig.gpu
        .vram_mut()
        .ramin_write32(RAMHT_BASE + slot + 4, (1 << 16) | (0x4000 >> 4));
    let put = rig.gpu.mmio_read(REG_CACHE1_PUT);
    rig.gpu
        .mmio_write(REG_CACHE1_GET, put, &mut VecMemory::new(0));
    assert_eq!(rig.gpu.mmio_read(REG_PFIFO_INTR) & 1, 0);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_PULL0) & 0x100, 0);
    assert_eq!(rig.gpu.mmio_read(0x002400), 0x10); // runout: empty

    // The vblank tick re-drives the channel; the bind now succeeds.
    rig.gpu.vblank_tick(&mut rig.mem);
    assert!(!rig.gpu.acquire_pending());
    assert_eq!(rig.gpu.channel(0).subchannels[0].object, 0x4000);
    assert_eq!(rig.gpu.channel(0).subchannels[0].engine, 1);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), rig.ring_len);
}

#[test]
fn notify_writes_record_and_raises_graphics_interrupt() {
    let mut rig = Rig::new();
    rig.clock.set_ns(0x1240);

    rig.install_object(0x4000, 0x43, 0);
    rig.install_handle(0xBEEF_0001, 0, 0x4000, 1);
    // Notifier descriptor: linear, external, base 0x2_0000.
    rig.gpu.vram_mut().ramin_write32(0x5000, 0x0002_2000);
    rig.gpu.vram_mut().ramin_write32(0x5000 + 8, 0x2_0000);
    rig.install_handle(0x1707_0001, 0, 0x5000, 1);

    rig.push_method(0, 0x000, &[0xBEEF_0001]);
    rig.push_method(0, 0x060, &[0x1707_0001]);
    rig.push_method(0, 0x041, &[1]);
    rig.push_method(0, 0x0C0, &[0x0C]);
    rig.run();

    assert_eq!(rig.mem.read_u64(0x2_0000), 0x1240);
    assert_eq!(rig.mem.read_u32(0x2_0000 + 0x8), 0);
    assert_eq!(rig.mem.read_u32(0x2_0000 + 0xC), 0);
    assert_eq!(rig.gpu.mmio_read(REG_PGRAPH_INTR) & 1, 1);
    assert_eq!(rig.gpu.mmio_read(REG_PGRAPH_NSOURCE) & 1, 1);
}

#[test]
fn notifier_status_byte_0x30_suppresses_the_record_write() {
    let mut rig = Rig::new();
    rig.clock.set_ns(0x1240);

    rig.install_object(0x4000, 0x43, 0);
    rig.install_handle(0xBEEF_0001, 0, 0x4000, 1);
    // Same descriptor, but its first word reads 0x30 in the low byte.
    rig.gpu.vram_mut().ramin_write32(0x5000, 0x0002_2030);
    rig.gpu.vram_mut().ramin_write32(0x5000 + 8, 0x2_0000);
    rig.install_handle(0x1707_0001, 0, 0x5000, 1);

    rig.push_method(0, 0x000, &[0xBEEF_0001]);
    rig.push_method(0, 0x060, &[0x1707_0001]);
    rig.push_method(0, 0x041, &[1]);
    rig.push_method(0, 0x0C0, &[0x0C]);
    rig.run();

    // No record write, but the armed interrupt still fires.
    assert_eq!(rig.mem.read_u64(0x2_0000), 0);
    assert_eq!(rig.gpu.mmio_read(REG_PGRAPH_INTR) & 1, 1);
}

#[test]
fn m2mf_copies_lines_and_writes_its_notifier_record() {
    let mut rig = Rig::new();
    rig.clock.set_ns(0x2460);

    // M2MF object, notifier packed into its header word 1.
    rig.gpu.vram_mut().ramin_write32(0x5000, 0x0002_2000);
    rig.gpu.vram_mut().ramin_write32(0x5000 + 8, 0x2_0000);
    rig.install_object(0x6000, 0x39, 0x5000);
    rig.install_handle(0x3939_0001, 0, 0x6000, 1);

    // Source and destination descriptors: external linear.
    rig.gpu.vram_mut().ramin_write32(0x7000, 0x0002_2000);
    rig.gpu.vram_mut().ramin_write32(0x7000 + 8, 0x3_0000);
    rig.install_handle(0x5123_0001, 0, 0x7000, 1);
    rig.gpu.vram_mut().ramin_write32(0x7100, 0x0002_2000);
    rig.gpu.vram_mut().ramin_write32(0x7100 + 8, 0x4_0000);
    rig.install_handle(0xD123_0001, 0, 0x7100, 1);

    // Two 8-byte lines at a 16-byte pitch.
    rig.mem.write_u64(0x3_0000, 0x1111_2222_3333_4444);
    rig.mem.write_u64(0x3_0010, 0x5555_6666_7777_8888);

    rig.push_method(1, 0x000, &[0x3939_0001]);
    rig.push_method(1, 0x061, &[0x5123_0001]);
    rig.push_method(1, 0x062, &[0xD123_0001]);
    rig.push_method(1, 0x0C3, &[0]);
    rig.push_method(1, 0x0C4, &[0]);
    rig.push_method(1, 0x0C5, &[16]);
    rig.push_method(1, 0x0C6, &[16]);
    rig.push_method(1, 0x0C7, &[8]);
    rig.push_method(1, 0x0C8, &[2]);
    rig.push_method(1, 0x0CA, &[0]);
    rig.run();

    assert_eq!(rig.mem.read_u64(0x4_0000), 0x1111_2222_3333_4444);
    assert_eq!(rig.mem.read_u64(0x4_0010), 0x5555_6666_7777_8888);
    // Completion record lands at 0x10, not the generic notify offset.
    assert_eq!(rig.mem.read_u64(0x2_0000 + 0x10), 0x2460);
    assert_eq!(rig.mem.read_u64(0x2_0000), 0);
}

#[test]
fn gdi_fill_rect_writes_pixels_and_reports_damage() {
    let mut rig = Rig::new();

    rig.install_object(0x8000, 0x62, 0);
    rig.install_handle(0x5200_0001, 0, 0x8000, 1);
    rig.install_object(0x9000, 0x4A, 0);
    rig.install_handle(0x4D10_0001, 0, 0x9000, 1);
    // Destination surface descriptor: linear into VRAM at 0x10_0000.
    rig.gpu.vram_mut().ramin_write32(0xA000, 0x0000_2000);
    rig.gpu.vram_mut().ramin_write32(0xA000 + 8, 0x10_0000);
    rig.install_handle(0xD057_0001, 0, 0xA000, 1);

    rig.push_method(1, 0x000, &[0x5200_0001]);
    rig.push_method(1, 0x062, &[0xD057_0001]);
    rig.push_method(1, 0x0C0, &[0xA]); // 4 bytes per pixel
    rig.push_method(1, 0x0C1, &[64 << 16]); // destination pitch 64
    rig.push_method(1, 0x0C3, &[0]);

    rig.push_method(2, 0x000, &[0x4D10_0001]);
    rig.push_method(2, 0x0FF, &[0x1122_3344]);
    rig.push_method(2, 0x100, &[(1 << 16) | 2]); // x=1, y=2
    rig.push_method(2, 0x101, &[(2 << 16) | 2]); // 2x2
    rig.run();

    let base = 0x10_0000;
    for y in 2..4u32 {
        for x in 1..3u32 {
            assert_eq!(rig.gpu.vram().read32(base + y * 64 + x * 4), 0x1122_3344);
        }
    }
    // Just outside the rectangle stays clear.
    assert_eq!(rig.gpu.vram().read32(base + 2 * 64), 0);
    assert_eq!(rig.gpu.vram().read32(base + 4 * 64 + 4), 0);

    assert_eq!(
        rig.display.take_rects(),
        vec![DirtyRect {
            x: 1,
            y: 2,
            width: 2,
            height: 2
        }]
    );
}

/// Binds a 2D surface on subchannel 1: A8R8G8B8, both pitches 64, offsets 0,
/// source and destination backed by a VRAM-target descriptor at 0x10_0000.
fn bind_surf2d(rig: &mut Rig) {
    rig.install_object(0x8000, 0x62, 0);
    rig.install_handle(0x5200_0001, 0, 0x8000, 1);
    rig.gpu.vram_mut().ramin_write32(0xA000, 0x0000_2000);
    rig.gpu.vram_mut().ramin_write32(0xA000 + 8, 0x10_0000);
    rig.install_handle(0xD057_0001, 0, 0xA000, 1);

    rig.push_method(1, 0x000, &[0x5200_0001]);
    rig.push_method(1, 0x061, &[0xD057_0001]);
    rig.push_method(1, 0x062, &[0xD057_0001]);
    rig.push_method(1, 0x0C0, &[0xA]);
    rig.push_method(1, 0x0C1, &[(64 << 16) | 64]);
    rig.push_method(1, 0x0C2, &[0]);
    rig.push_method(1, 0x0C3, &[0]);
}

#[test]
fn blit_copies_overlap_safely_and_reports_damage() {
    let mut rig = Rig::new();
    bind_surf2d(&mut rig);
    rig.install_object(0x9000, 0x5F, 0);
    rig.install_handle(0xB117_0001, 0, 0x9000, 1);

    let base = 0x10_0000;
    for y in 0..2u32 {
        for x in 0..2u32 {
            rig.gpu
                .vram_mut()
                .write32(base + y * 64 + x * 4, 0xC0DE_0000 | (y << 8) | x);
        }
    }

    rig.push_method(2, 0x000, &[0xB117_0001]);
    rig.push_method(2, 0x0C0, &[0]); // source (0, 0)
    rig.push_method(2, 0x0C1, &[(1 << 16) | 4]); // destination (4, 1)
    rig.push_method(2, 0x0C2, &[(2 << 16) | 2]);
    rig.run();

    for y in 0..2u32 {
        for x in 0..2u32 {
            assert_eq!(
                rig.gpu.vram().read32(base + (1 + y) * 64 + (4 + x) * 4),
                0xC0DE_0000 | (y << 8) | x
            );
        }
    }
    // The source stays intact even though the regions share a surface.
    assert_eq!(rig.gpu.vram().read32(base), 0xC0DE_0000);
    assert_eq!(
        rig.display.take_rects(),
        vec![DirtyRect {
            x: 4,
            y: 1,
            width: 2,
            height: 2
        }]
    );
}

#[test]
fn image_from_cpu_draws_once_all_words_arrive() {
    let mut rig = Rig::new();
    bind_surf2d(&mut rig);
    rig.install_object(0x9000, 0x61, 0);
    rig.install_handle(0x1FC0_0001, 0, 0x9000, 1);

    rig.push_method(2, 0x000, &[0x1FC0_0001]);
    rig.push_method(2, 0x0C0, &[5]); // X8R8G8B8: 4 bytes per pixel
    rig.push_method(2, 0x0C1, &[(1 << 16) | 2]); // destination (2, 1)
    rig.push_method(2, 0x0C2, &[(2 << 16) | 2]); // 2x2 out
    rig.push_method(2, 0x0C3, &[(2 << 16) | 2]); // 2x2 in
    // 2 * 2 * 4 bytes = 4 parameter words; the draw fires on the last one.
    rig.push_method(2, 0x100, &[0x10, 0x11, 0x12, 0x13]);
    rig.run();

    let base = 0x10_0000;
    assert_eq!(rig.gpu.vram().read32(base + 64 + 2 * 4), 0x10);
    assert_eq!(rig.gpu.vram().read32(base + 64 + 3 * 4), 0x11);
    assert_eq!(rig.gpu.vram().read32(base + 2 * 64 + 2 * 4), 0x12);
    assert_eq!(rig.gpu.vram().read32(base + 2 * 64 + 3 * 4), 0x13);
    assert_eq!(
        rig.display.take_rects(),
        vec![DirtyRect {
            x: 2,
            y: 1,
            width: 2,
            height: 2
        }]
    );
    // State is cleared for the next image.
    assert!(rig.gpu.channel(0).ifc.words.is_empty());
    assert_eq!(rig.gpu.channel(0).ifc.expected, 0);
}

#[test]
fn image_from_cpu_upload_pattern_streams_straight_to_the_surface() {
    let mut rig = Rig::new();
    bind_surf2d(&mut rig);
    rig.install_object(0x9000, 0x61, 0);
    rig.install_handle(0x1FC0_0001, 0, 0x9000, 1);

    // The 1024x4096 geometry on a Y32 surface with pitch 0x1000 is the
    // raw-stream shape: no collection, words land directly.
    rig.push_method(1, 0x0C0, &[0xB]);
    rig.push_method(1, 0x0C1, &[0x1000_1000]);
    rig.push_method(2, 0x000, &[0x1FC0_0001]);
    rig.push_method(2, 0x0C1, &[0]);
    rig.push_method(2, 0x0C2, &[0x1000_0400]);
    rig.push_method(2, 0x0C3, &[0x1000_0400]);
    rig.push_method(2, 0x100, &[0xAAAA_5555, 0x1234_5678]);
    rig.run();

    assert!(rig.gpu.channel(0).ifc.upload);
    assert_eq!(rig.gpu.vram().read32(0x10_0000), 0xAAAA_5555);
    assert_eq!(rig.gpu.vram().read32(0x10_0004), 0x1234_5678);
    assert!(rig.gpu.channel(0).ifc.words.is_empty());
}

#[test]
fn d3d_clear_fills_the_clipped_color_surface() {
    let mut rig = Rig::new();

    rig.install_object(0x9000, 0x97, 0);
    rig.install_handle(0xD3D0_0001, 0, 0x9000, 1);
    // Color buffer descriptor: linear into VRAM at 0x10_0000.
    rig.gpu.vram_mut().ramin_write32(0xA000, 0x0000_2000);
    rig.gpu.vram_mut().ramin_write32(0xA000 + 8, 0x10_0000);
    rig.install_handle(0xC010_0001, 0, 0xA000, 1);

    rig.push_method(3, 0x000, &[0xD3D0_0001]);
    rig.push_method(3, 0x065, &[0xC010_0001]);
    rig.push_method(3, 0x080, &[(2 << 16) | 1]); // x=1, width 2
    rig.push_method(3, 0x081, &[(2 << 16) | 1]); // y=1, height 2
    rig.push_method(3, 0x082, &[0x5]); // X8R8G8B8 color, no depth
    rig.push_method(3, 0x083, &[64]); // color pitch
    rig.push_method(3, 0x084, &[0]);
    rig.push_method(3, 0x764, &[0x00FF_00FF]);
    rig.push_method(3, 0x765, &[0xF0]); // clear color planes only
    rig.run();

    let base = 0x10_0000;
    for y in 1..3u32 {
        for x in 1..3u32 {
            assert_eq!(rig.gpu.vram().read32(base + y * 64 + x * 4), 0x00FF_00FF);
        }
    }
    assert_eq!(rig.gpu.vram().read32(base), 0);
    assert_eq!(rig.gpu.vram().read32(base + 64 + 3 * 4), 0);
    assert_eq!(
        rig.display.take_rects(),
        vec![DirtyRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2
        }]
    );
}

#[test]
fn self_referencing_jump_terminates() {
    let mut rig = Rig::new();
    // A jump whose target is its own address never drains the ring; the
    // puller must still hand control back.
    rig.push(0x0000_0001);
    rig.run();

    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_GET), 0);
    assert_eq!(rig.gpu.mmio_read(REG_CACHE1_DMA_PUT), 4);
}

#[test]
fn vblank_raises_display_interrupt_when_enabled() {
    let mut rig = Rig::new();
    let mut mem = VecMemory::new(0x100);
    rig.gpu.mmio_write(REG_PMC_INTR_EN, 1, &mut mem);
    rig.gpu.mmio_write(0x600140, 1, &mut mem);

    rig.gpu.vblank_tick(&mut mem);
    assert!(rig.irq.is_asserted());
    assert_eq!(rig.gpu.mmio_read(0x600100) & 1, 1);
    assert_eq!(rig.gpu.mmio_read(0x000100), 1 << 24);

    // Acknowledge: line drops.
    rig.gpu.mmio_write(0x600100, 1, &mut mem);
    assert!(!rig.irq.is_asserted());
}

#[test]
fn linear_and_paged_translation_match_the_documented_examples() {
    let rig = {
        let mut r = Rig::new();
        // Linear: base 0x2000, adjust 0x10.
        r.gpu.vram_mut().ramin_write32(0xB000, 0x0000_2000 | 0x10 << 20);
        r.gpu.vram_mut().ramin_write32(0xB000 + 8, 0x2000);
        // Paged: page-table entry 0 holds frame 0x5000.
        r.gpu.vram_mut().ramin_write32(0xB100, 0);
        r.gpu.vram_mut().ramin_write32(0xB100 + 8, 0x5000);
        r
    };

    use geforce::dma;
    assert_eq!(
        dma::resolve(rig.gpu.vram(), 0xB000, 0x34),
        dma::Target::Vram(0x2044)
    );
    assert_eq!(
        dma::resolve(rig.gpu.vram(), 0xB100, 0x0FA0),
        dma::Target::Vram(0x5FA0)
    );
}

#[test]
fn timer_registers_expose_the_rebased_counter() {
    let mut rig = Rig::new();
    let mut mem = VecMemory::new(0x100);
    rig.clock.set_ns(1_000);
    rig.gpu.mmio_write(0x009400, 0x100, &mut mem);
    rig.gpu.mmio_write(0x009410, 0x7, &mut mem);

    rig.clock.advance_ns(0x40);
    assert_eq!(rig.gpu.mmio_read(0x009400), 0x140);
    assert_eq!(rig.gpu.mmio_read(0x009410), 0x7);
}

#[test]
fn generation_gated_registers_and_pmc_id() {
    let mut mem = VecMemory::new(0x100);
    let mut pre = GeForce::new(CardModel::GeForce3, ManualClock::new());
    assert_eq!(pre.mmio_read(0x000000), 0x0202_00A5);
    pre.mmio_write(0x002214, 0x123, &mut mem);
    assert_eq!(pre.mmio_read(0x002214), 0x123);
    pre.mmio_write(0x002220, 0x456, &mut mem);
    assert_eq!(pre.mmio_read(0x002220), 0);

    let mut fx = GeForce::new(CardModel::GeForceFx5900, ManualClock::new());
    assert_eq!(fx.mmio_read(0x000000), 0x35 << 20);

    let mut nv40 = GeForce::new(CardModel::GeForce6800, ManualClock::new());
    assert_eq!(nv40.mmio_read(0x000000), 0x40 << 20);
    nv40.mmio_write(0x002220, 0x456, &mut mem);
    assert_eq!(nv40.mmio_read(0x002220), 0x456);
    nv40.mmio_write(0x002214, 0x123, &mut mem);
    assert_eq!(nv40.mmio_read(0x002214), 0);
}

#[test]
fn user_window_reads_free_slots_and_cursors() {
    let mut rig = Rig::new();
    assert_eq!(rig.gpu.mmio_read(0x80_0000 | 3 << 16 | 0x10), 0xFFFF);

    // Non-resident channel: cursors come from the context record.
    let ramfc3 = 0x2000 + 3 * 0x40;
    rig.gpu.vram_mut().ramin_write32(ramfc3, 0xAA0);
    rig.gpu.vram_mut().ramin_write32(ramfc3 + 4, 0xAA0);
    rig.gpu.vram_mut().ramin_write32(ramfc3 + 8, 0x77);
    assert_eq!(rig.gpu.mmio_read(0x80_0000 | 3 << 16 | 0x40), 0xAA0);
    assert_eq!(rig.gpu.mmio_read(0x80_0000 | 3 << 16 | 0x44), 0xAA0);
    assert_eq!(rig.gpu.mmio_read(0x80_0000 | 3 << 16 | 0x48), 0x77);
    // The newer aperture decodes to the same channel.
    assert_eq!(rig.gpu.mmio_read(0xC0_0000 | 3 << 12 | 0x48), 0x77);

    // Resident channel 0: live registers.
    let mut mem = VecMemory::new(0x100);
    rig.gpu.mmio_write(REG_CACHE1_REF_CNT, 0x99, &mut mem);
    assert_eq!(rig.gpu.mmio_read(0x80_0000 | 0x48), 0x99);
}
