//! Frame-rate classification from the link M/N ratio and the MSA totals.

use std::sync::atomic::{AtomicBool, Ordering};

use dprx_regs::bus::read_u16;
use dprx_regs::map::*;
use dprx_regs::RegisterBus;
use dprx_time::period_ns_ceil;

use crate::clock_recovery::{VideoMn, RATE_UNIT};
use crate::error::FrameRateError;

/// Standard rates and their accepted windows, in centi-Hz. Checked in order.
pub const FRAME_RATE_BANDS: [(u32, u64, u64); 14] = [
    (24, 2350, 2450),
    (25, 2460, 2540),
    (30, 2950, 3050),
    (48, 4750, 4850),
    (50, 4950, 5050),
    (60, 5900, 6100),
    (72, 7150, 7250),
    (75, 7450, 7550),
    (85, 8450, 8550),
    (90, 8950, 9050),
    (100, 9900, 10100),
    (120, 11900, 12100),
    (144, 14300, 14500),
    (240, 23900, 24100),
];

const ATTEMPTS: u32 = 2;

/// Measured frame rate in centi-Hz. `None` when any factor is zero or a stage overflows.
pub fn rate_centi_hz(mn: VideoMn, h_total: u16, v_total: u16) -> Option<u64> {
    let pixels = u64::from(h_total).checked_mul(u64::from(v_total))?;
    u64::from(mn.link_rate)
        .checked_mul(RATE_UNIT)?
        .checked_mul(u64::from(mn.m))?
        .checked_mul(100_000 * 1000)?
        .checked_div(u64::from(mn.n))?
        .checked_div(pixels)
}

pub fn classify_centi_hz(centi_hz: u64) -> Option<u32> {
    FRAME_RATE_BANDS
        .iter()
        .find(|&&(_, lo, hi)| (lo..=hi).contains(&centi_hz))
        .map(|&(rate, _, _)| rate)
}

fn msa_total(bus: &dyn RegisterBus, field: u32) -> u16 {
    read_u16(bus, MSA_TIMING.lo(field), MSA_TIMING.hi(field))
}

/// Alternates between live and cached M/N so a single bad sample of either cannot wedge
/// classification.
#[derive(Debug, Default)]
pub struct FrameClassifier {
    cached_first: AtomicBool,
}

impl FrameClassifier {
    pub const fn new() -> Self {
        Self {
            cached_first: AtomicBool::new(false),
        }
    }

    /// `cached` is the M/N the video PLL was last programmed from, if any.
    pub fn classify(
        &self,
        bus: &dyn RegisterBus,
        cached: Option<VideoMn>,
    ) -> Result<u32, FrameRateError> {
        let cached_first = self.cached_first.fetch_xor(true, Ordering::AcqRel);
        let h_total = msa_total(bus, TimingBlock::H_TOTAL);
        let v_total = msa_total(bus, TimingBlock::V_TOTAL);

        for attempt in 0..ATTEMPTS {
            let use_cached = cached_first == (attempt == 0);
            let mn = if use_cached { cached } else { Some(VideoMn::read(bus)) };
            let Some(mn) = mn else { continue };

            let centi_hz = rate_centi_hz(mn, h_total, v_total);
            if let Some(rate) = centi_hz.and_then(classify_centi_hz) {
                return Ok(rate);
            }
            tracing::debug!(attempt, use_cached, ?centi_hz, "frame rate outside every band");
        }
        tracing::warn!(h_total, v_total, "frame rate classification failed");
        Err(FrameRateError::RetryExhausted { attempts: ATTEMPTS })
    }
}

fn effective_rate(fresh: Option<u32>, last_known: u32, fallback_hz: u32) -> u32 {
    fresh
        .filter(|&hz| hz != 0)
        .or(Some(last_known).filter(|&hz| hz != 0))
        .unwrap_or(fallback_hz)
}

/// One frame period, preferring a fresh measurement, then the last known rate, then the
/// fallback.
pub fn frame_period_ns(fresh: Option<u32>, last_known: u32, fallback_hz: u32) -> u64 {
    let hz = effective_rate(fresh, last_known, fallback_hz);
    period_ns_ceil(hz).unwrap_or(0)
}

pub fn frame_period_us(fresh: Option<u32>, last_known: u32, fallback_hz: u32) -> u64 {
    frame_period_ns(fresh, last_known, fallback_hz).div_ceil(1_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dprx_regs::bus::write_u24;
    use dprx_regs::MockRegisters;

    const P1080_60: VideoMn = VideoMn {
        m: 24_750,
        n: 27_000,
        link_rate: LINK_RATE_RBR,
    };

    fn set_totals(regs: &MockRegisters, h: u16, v: u16) {
        let t = MSA_TIMING;
        regs.poke(t.lo(TimingBlock::H_TOTAL), u32::from(h & 0xFF));
        regs.poke(t.hi(TimingBlock::H_TOTAL), u32::from(h >> 8));
        regs.poke(t.lo(TimingBlock::V_TOTAL), u32::from(v & 0xFF));
        regs.poke(t.hi(TimingBlock::V_TOTAL), u32::from(v >> 8));
    }

    fn set_live(regs: &MockRegisters, mn: VideoMn) {
        // MVID/NVID are listed high byte first; `write_u24` takes low byte first.
        let rev = |[a, b, c]: [u32; 3]| [c, b, a];
        write_u24(regs, rev(MVID), mn.m);
        write_u24(regs, rev(NVID), mn.n);
        regs.poke(LINK_RATE, mn.link_rate);
    }

    #[test]
    fn exact_1080p60() {
        assert_eq!(rate_centi_hz(P1080_60, 2200, 1125), Some(6000));
        assert_eq!(classify_centi_hz(6000), Some(60));
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(classify_centi_hz(2350), Some(24));
        assert_eq!(classify_centi_hz(2450), Some(24));
        assert_eq!(classify_centi_hz(2455), None);
        assert_eq!(classify_centi_hz(2460), Some(25));
        assert_eq!(classify_centi_hz(24100), Some(240));
        assert_eq!(classify_centi_hz(24101), None);
        assert_eq!(classify_centi_hz(0), None);
    }

    #[test]
    fn zero_inputs_do_not_panic() {
        assert_eq!(rate_centi_hz(P1080_60, 0, 1125), None);
        let zero_n = VideoMn { n: 0, ..P1080_60 };
        assert_eq!(rate_centi_hz(zero_n, 2200, 1125), None);
    }

    #[test]
    fn live_registers_classify() {
        let regs = MockRegisters::new();
        set_live(&regs, P1080_60);
        set_totals(&regs, 2200, 1125);
        let fc = FrameClassifier::new();
        assert_eq!(fc.classify(&regs, None), Ok(60));
        // Second call tries the (absent) cache first, then falls back to live.
        assert_eq!(fc.classify(&regs, None), Ok(60));
    }

    #[test]
    fn falls_back_to_the_other_source() {
        let regs = MockRegisters::new();
        set_live(&regs, VideoMn { m: 1, ..P1080_60 });
        set_totals(&regs, 2200, 1125);
        let fc = FrameClassifier::new();
        assert_eq!(fc.classify(&regs, Some(P1080_60)), Ok(60));
        assert_eq!(fc.classify(&regs, Some(P1080_60)), Ok(60));
    }

    #[test]
    fn both_sources_missing_exhausts_retries() {
        let regs = MockRegisters::new();
        set_live(&regs, VideoMn { m: 101_250, ..P1080_60 });
        set_totals(&regs, 2200, 1125);
        let fc = FrameClassifier::new();
        assert_eq!(
            fc.classify(&regs, Some(VideoMn { m: 101_250, ..P1080_60 })),
            Err(FrameRateError::RetryExhausted { attempts: 2 })
        );
    }

    #[test]
    fn period_prefers_fresh_then_last_then_fallback() {
        assert_eq!(frame_period_us(Some(60), 30, 24), 16_667);
        assert_eq!(frame_period_us(None, 30, 24), 33_334);
        assert_eq!(frame_period_us(None, 0, 24), 41_667);
        assert_eq!(frame_period_ns(None, 0, 24), 41_666_667);
    }
}
