#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dprx::map::*;
use dprx::{Dprx, DprxConfig, DprxEvent, LinkControl, ManualClock, MockRegisters, VideoMn};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Records the power-cycle steps requested by overflow recovery.
#[derive(Default)]
pub struct RecordingLink {
    steps: Mutex<Vec<&'static str>>,
}

impl RecordingLink {
    pub fn steps(&self) -> Vec<&'static str> {
        self.steps.lock().unwrap().clone()
    }

    fn push(&self, step: &'static str) {
        self.steps.lock().unwrap().push(step);
    }
}

impl LinkControl for RecordingLink {
    fn stop(&self) {
        self.push("stop");
    }

    fn power_down(&self) {
        self.push("power_down");
    }

    fn power_up(&self) {
        self.push("power_up");
    }

    fn start(&self) {
        self.push("start");
    }
}

pub struct Harness {
    pub regs: Arc<MockRegisters>,
    pub clock: ManualClock,
    pub link: Arc<RecordingLink>,
    pub dprx: Dprx,
    seen: Arc<Mutex<Vec<DprxEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(DprxConfig::default())
    }

    pub fn with_config(config: DprxConfig) -> Self {
        init_tracing();
        let regs = Arc::new(MockRegisters::new());
        let clock = ManualClock::new();
        let link = Arc::new(RecordingLink::default());
        let dprx = Dprx::builder(regs.clone())
            .clock(Arc::new(clock.clone()))
            .delay(Arc::new(clock.clone()))
            .link_control(link.clone())
            .config(config)
            .build()
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dprx.set_callback(move |event| sink.lock().unwrap().push(event));

        Self {
            regs,
            clock,
            link,
            dprx,
            seen,
        }
    }

    /// Plugs the cable in and forgets the resulting notifications.
    pub fn plugged() -> Self {
        let h = Self::new();
        h.irq(DPIP_INT_STS0, DPIP_PLUG_IN);
        h.dprx.drain_notifications();
        h.take_seen();
        h
    }

    /// Raises status bits and runs the interrupt handler.
    pub fn irq(&self, reg: u32, bits: u32) {
        self.regs.raise(reg, bits);
        self.dprx.handle_irq();
    }

    pub fn take_seen(&self) -> Vec<DprxEvent> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    pub fn set_video_mn(&self, mn: VideoMn) {
        poke_u24_be(&self.regs, MVID, mn.m);
        poke_u24_be(&self.regs, NVID, mn.n);
        self.regs.poke(LINK_RATE, mn.link_rate);
    }

    pub fn set_msa_totals(&self, h_total: u16, v_total: u16) {
        poke_u16(&self.regs, MSA_TIMING, TimingBlock::H_TOTAL, h_total);
        poke_u16(&self.regs, MSA_TIMING, TimingBlock::V_TOTAL, v_total);
    }

    pub fn set_audio_mn(&self, link_rate: u32, m: u32, n: u32) {
        self.regs.poke(LINK_RATE, link_rate);
        poke_u24_be(&self.regs, AUD_DBG_M, m);
        poke_u24_be(&self.regs, AUD_DBG_N, n);
    }
}

pub fn poke_u24_be(regs: &MockRegisters, [hi, mid, lo]: [u32; 3], value: u32) {
    regs.poke(hi, (value >> 16) & 0xFF);
    regs.poke(mid, (value >> 8) & 0xFF);
    regs.poke(lo, value & 0xFF);
}

pub fn poke_u16(regs: &MockRegisters, block: TimingBlock, field: u32, value: u16) {
    regs.poke(block.lo(field), u32::from(value & 0xFF));
    regs.poke(block.hi(field), u32::from(value >> 8));
}

/// Reads back a value the driver wrote low byte first.
pub fn written_u24(regs: &MockRegisters, [lo, mid, hi]: [u32; 3]) -> u32 {
    regs.peek(lo) | (regs.peek(mid) << 8) | (regs.peek(hi) << 16)
}

/// CEA 1080p60 carried on an RBR link.
pub const MN_1080P60: VideoMn = VideoMn {
    m: 24_750,
    n: 27_000,
    link_rate: LINK_RATE_RBR,
};
