//! Audio clock recovery.
//!
//! The receiver regenerates the audio sample clock from the Maud/Naud pair carried on the link.
//! The raw pair is rescaled onto a fixed N per (link rate, sample rate) and the resulting M is
//! clamped into a narrow window around the nominal ratio, which keeps a glitching source from
//! dragging the PLL far off lock.

use dprx_regs::bus::{read_u24_be, read_u8, write_u24};
use dprx_regs::map::*;
use dprx_regs::{MaskRegister, RegisterBus};
use dprx_time::Delay;

use super::RATE_UNIT;
use crate::config::DprxConfig;
use crate::error::ClockRecoveryError;

/// Fixed N per clock-select code 1..=7 (32k, 44.1k, 48k, 88.2k, 96k, 176.4k, 192k).
pub const N_AUDIO_FIXED_RBR: [u32; 7] = [20250, 22500, 13500, 11250, 6750, 5625, 3375];
pub const N_AUDIO_FIXED_HBR: [u32; 7] = [33750, 37500, 22500, 18750, 11250, 9375, 5625];
pub const N_AUDIO_FIXED_HBR2: [u32; 7] = [67500, 75000, 45000, 37500, 22500, 18750, 11250];
pub const N_AUDIO_FIXED_HBR3: [u32; 7] = [101250, 112500, 67500, 56250, 33750, 28125, 16875];

/// Lower sample-rate bound in kHz for clock-select codes 7 down to 1.
const CLOCK_SELECT_THRESHOLDS: [(u64, u8); 7] =
    [(184, 7), (136, 6), (92, 5), (68, 4), (46, 3), (38, 2), (28, 1)];

// `maud_up` is the numerically lower bound.
const MAUD_48K_FAMILY: (u32, u32) = (2038, 2058);
const MAUD_44K1_FAMILY: (u32, u32) = (3120, 3152);

/// Settle/poll bounds of the audio routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioClockConfig {
    pub mute_poll_count: u32,
    pub mute_clear_poll_count: u32,
    pub poll_interval_ms: u32,
    pub n_settle_ms: u32,
}

impl Default for AudioClockConfig {
    fn default() -> Self {
        Self::from(&DprxConfig::default())
    }
}

impl From<&DprxConfig> for AudioClockConfig {
    fn from(cfg: &DprxConfig) -> Self {
        Self {
            mute_poll_count: cfg.audio_mute_poll_count,
            mute_clear_poll_count: cfg.audio_mute_clear_poll_count,
            poll_interval_ms: cfg.audio_poll_interval_ms,
            n_settle_ms: cfg.audio_n_settle_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioPllParameters {
    pub m_raw: u32,
    pub n_raw: u32,
    pub link_rate: u32,
    pub clock_select: u8,
    pub maud_up: u32,
    pub maud_low: u32,
    pub n_audio_fixed: u32,
    /// M rescaled onto `n_audio_fixed`, before clamping.
    pub m_mod: u32,
    /// `m_mod` clamped into `[maud_up, maud_low]`.
    pub m_audio_fixed: u32,
    /// M committed to the PLL on first configuration; 0 when the stream asked for mute.
    pub programmed_m: u32,
    pub first_config: bool,
    pub muted: bool,
    pub retry: bool,
}

pub fn select_n_table(link_rate: u32) -> Result<&'static [u32; 7], ClockRecoveryError> {
    match link_rate {
        LINK_RATE_RBR => Ok(&N_AUDIO_FIXED_RBR),
        LINK_RATE_HBR => Ok(&N_AUDIO_FIXED_HBR),
        LINK_RATE_HBR2 => Ok(&N_AUDIO_FIXED_HBR2),
        LINK_RATE_HBR3 => Ok(&N_AUDIO_FIXED_HBR3),
        other => Err(ClockRecoveryError::UnsupportedLinkRate(other)),
    }
}

/// Sample rate in kHz, rounded to nearest.
pub fn audio_sample_rate_khz(link_rate: u32, m: u32, n: u32) -> Option<u64> {
    let audio_freq =
        (u64::from(link_rate) * RATE_UNIT * 10 * u64::from(m)).checked_div(u64::from(n))?;
    Some((audio_freq * 100 + 256) / 512)
}

pub fn select_clock(fs_khz: u64) -> Option<u8> {
    CLOCK_SELECT_THRESHOLDS
        .iter()
        .find(|&&(threshold, _)| fs_khz >= threshold)
        .map(|&(_, code)| code)
}

/// `(maud_up, maud_low)` for a clock-select code.
pub fn audio_bounds(clock_select: u8) -> (u32, u32) {
    if clock_select % 2 == 1 {
        MAUD_48K_FAMILY
    } else {
        MAUD_44K1_FAMILY
    }
}

/// Rescales `m_raw / n_raw` onto the fixed N. `None` when `n_raw` is zero.
pub fn scale_m(m_raw: u32, n_raw: u32, n_fixed: u32) -> Option<u32> {
    if n_raw == 0 || n_fixed == 0 {
        return None;
    }
    let u = u64::from(u32::MAX / n_fixed);
    let m_mod = (u64::from(n_fixed) * u / u64::from(n_raw)) * u64::from(m_raw) / u;
    Some(m_mod.min(u64::from(u32::MAX)) as u32)
}

pub fn clamp_m(m_mod: u32, maud_up: u32, maud_low: u32) -> u32 {
    m_mod.clamp(maud_up, maud_low)
}

/// Keeps the M/N-change interrupt masked while the routine runs.
struct MnChangeMask<'a> {
    bus: &'a dyn RegisterBus,
    mask: &'a MaskRegister,
}

impl<'a> MnChangeMask<'a> {
    fn new(bus: &'a dyn RegisterBus, mask: &'a MaskRegister) -> Self {
        mask.mask(bus, AUD_MN_CHANGE);
        Self { bus, mask }
    }
}

impl Drop for MnChangeMask<'_> {
    fn drop(&mut self) {
        self.mask.unmask(self.bus, AUD_MN_CHANGE);
    }
}

fn mute_requested(bus: &dyn RegisterBus) -> bool {
    bus.test_bits(VBID, VBID_AUDIO_MUTE)
}

/// Polls the VBID mute request up to `polls` times; returns whether it cleared.
fn wait_mute_clear(bus: &dyn RegisterBus, delay: &dyn Delay, polls: u32, interval_ms: u32) -> bool {
    for attempt in 0..polls {
        if !mute_requested(bus) {
            return true;
        }
        if attempt + 1 < polls {
            delay.delay_ms(interval_ms);
        }
    }
    false
}

fn pulse_audio_resets(bus: &dyn RegisterBus) {
    let lines = AUD_RESET_MN_ADJUST | AUD_RESET_PLL;
    bus.clear_bits(AUD_RESET, lines);
    bus.set_bits(AUD_RESET, lines);
}

/// Reads the received audio M/N and reprograms the audio PLL from it.
///
/// Must not run concurrently with itself; the audio M/N-change interrupt is masked through
/// `mask` (the shared `AUD_INT_MASK0`) for the whole routine and unmasked again on every return
/// path. On error the PLL is not touched.
pub fn configure_audio_pll(
    bus: &dyn RegisterBus,
    delay: &dyn Delay,
    mask: &MaskRegister,
    cfg: &AudioClockConfig,
) -> Result<AudioPllParameters, ClockRecoveryError> {
    let _mask = MnChangeMask::new(bus, mask);

    // The source may request mute while M/N are in flux; any sample seen set marks this
    // computation as untrustworthy.
    let mut retry = mute_requested(bus);
    let m2_value = read_u8(bus, AUD_DBG_M[0]);
    let m_raw = read_u24_be(bus, AUD_DBG_M);
    retry |= mute_requested(bus);
    let n_raw = read_u24_be(bus, AUD_DBG_N);
    retry |= mute_requested(bus);
    let link_rate = u32::from(read_u8(bus, LINK_RATE));

    let table = select_n_table(link_rate)?;
    let fs_khz =
        audio_sample_rate_khz(link_rate, m_raw, n_raw).ok_or(ClockRecoveryError::ZeroN)?;
    let Some(clock_select) = select_clock(fs_khz) else {
        tracing::warn!(fs_khz, m_raw, n_raw, "audio sample rate too low, PLL left as is");
        return Err(ClockRecoveryError::AudioRateTooLow { fs_khz });
    };

    let n_audio_fixed = table[usize::from(clock_select - 1)];
    let (maud_up, maud_low) = audio_bounds(clock_select);
    let m_mod = scale_m(m_raw, n_raw, n_audio_fixed).ok_or(ClockRecoveryError::ZeroN)?;
    let m_audio_fixed = clamp_m(m_mod, maud_up, maud_low);

    let first_config = m2_value == 0;
    let mut muted = false;
    if first_config {
        write_u24(bus, AUD_N_FIXED, n_audio_fixed);
        bus.set_bits(AUD_MN_CTRL, AUD_MN_N_SELECT);
        delay.delay_ms(cfg.n_settle_ms);

        if wait_mute_clear(bus, delay, cfg.mute_poll_count, cfg.poll_interval_ms) {
            write_u24(bus, AUD_M_FIXED, m_audio_fixed);
        } else {
            write_u24(bus, AUD_M_FIXED, 0);
            muted = true;
            if !wait_mute_clear(bus, delay, cfg.mute_clear_poll_count, cfg.poll_interval_ms) {
                tracing::warn!("audio mute request stuck, resetting audio PLL");
                pulse_audio_resets(bus);
            }
        }
    }

    bus.write(AUD_CLK_SEL, u32::from(clock_select) & AUD_CLK_SEL_MASK);
    bus.set_bits(AUD_RESET, AUD_RESET_MN_ADJUST);
    bus.set_bits(AUD_PLL_CTRL, AUD_PLL_ENABLE);
    bus.clear_bits(AUD_PLL_CTRL, AUD_PLL_AUTO_RESET);

    retry |= mute_requested(bus);
    let programmed_m = if retry || muted { 0 } else { m_audio_fixed };

    // A running PLL keeps its N/M; only the first configuration commits them here.
    if first_config {
        write_u24(bus, AUD_N_FIXED, n_audio_fixed);
        write_u24(bus, AUD_M_FIXED, programmed_m);
        bus.write(AUD_ACR_CTRL, 0);
    }

    tracing::debug!(
        m_raw,
        n_raw,
        fs_khz,
        clock_select,
        m_mod,
        programmed_m,
        first_config,
        retry,
        "audio PLL programmed"
    );

    Ok(AudioPllParameters {
        m_raw,
        n_raw,
        link_rate,
        clock_select,
        maud_up,
        maud_low,
        n_audio_fixed,
        m_mod,
        m_audio_fixed,
        programmed_m,
        first_config,
        muted,
        retry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dprx_regs::MockRegisters;
    use dprx_time::ManualClock;

    fn poke_u24(regs: &MockRegisters, [hi, mid, lo]: [u32; 3], value: u32) {
        regs.poke(hi, value >> 16);
        regs.poke(mid, (value >> 8) & 0xFF);
        regs.poke(lo, value & 0xFF);
    }

    fn stream(regs: &MockRegisters, link_rate: u32, m: u32, n: u32) {
        regs.poke(LINK_RATE, link_rate);
        poke_u24(regs, AUD_DBG_M, m);
        poke_u24(regs, AUD_DBG_N, n);
    }

    fn configure(
        regs: &MockRegisters,
        clock: &ManualClock,
    ) -> Result<AudioPllParameters, ClockRecoveryError> {
        let mask = MaskRegister::new(AUD_INT_MASK0);
        configure_audio_pll(regs, clock, &mask, &AudioClockConfig::default())
    }

    fn u24_written(regs: &MockRegisters, [lo, mid, hi]: [u32; 3]) -> u32 {
        regs.peek(lo) | (regs.peek(mid) << 8) | (regs.peek(hi) << 16)
    }

    #[test]
    fn classifies_48k_on_hbr2() {
        let fs = audio_sample_rate_khz(LINK_RATE_HBR2, 1491, 32768).unwrap();
        assert_eq!(fs, 48);
        assert_eq!(select_clock(fs), Some(3));
        assert_eq!(audio_bounds(3), (2038, 2058));
        assert_eq!(scale_m(1491, 32768, 45000), Some(2047));
    }

    #[test]
    fn thresholds_cover_every_code() {
        assert_eq!(select_clock(200), Some(7));
        assert_eq!(select_clock(176), Some(6));
        assert_eq!(select_clock(96), Some(5));
        assert_eq!(select_clock(88), Some(4));
        assert_eq!(select_clock(48), Some(3));
        assert_eq!(select_clock(44), Some(2));
        assert_eq!(select_clock(32), Some(1));
        assert_eq!(select_clock(27), None);
        assert_eq!(audio_bounds(2), (3120, 3152));
    }

    #[test]
    fn unknown_link_rate_is_rejected_and_unmasked() {
        let regs = MockRegisters::new();
        stream(&regs, 0x08, 1491, 32768);
        let clock = ManualClock::new();
        assert_eq!(
            configure(&regs, &clock),
            Err(ClockRecoveryError::UnsupportedLinkRate(0x08))
        );
        assert_eq!(regs.writes_to(AUD_INT_MASK0), vec![AUD_MN_CHANGE, 0]);
    }

    #[test]
    fn low_rate_skips_programming() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 100, 32768);
        let clock = ManualClock::new();
        let err = configure(&regs, &clock).unwrap_err();
        assert!(matches!(err, ClockRecoveryError::AudioRateTooLow { .. }));
        assert!(regs.writes_to(AUD_M_FIXED[0]).is_empty());
        assert!(regs.writes_to(AUD_CLK_SEL).is_empty());
        assert_eq!(regs.peek(AUD_INT_MASK0) & AUD_MN_CHANGE, 0);
    }

    #[test]
    fn first_config_with_clear_mute_programs_clamped_m() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 1491, 32768);
        let clock = ManualClock::new();

        let p = configure(&regs, &clock).unwrap();

        assert!(p.first_config);
        assert!(!p.retry);
        assert!(!p.muted);
        assert_eq!(p.clock_select, 3);
        assert_eq!(p.n_audio_fixed, 45000);
        assert_eq!(p.m_audio_fixed, 2047);
        assert_eq!(p.programmed_m, 2047);
        assert_eq!(u24_written(&regs, AUD_N_FIXED), 45000);
        assert_eq!(u24_written(&regs, AUD_M_FIXED), 2047);
        assert_eq!(regs.peek(AUD_CLK_SEL), 3);
        assert_eq!(regs.peek(AUD_PLL_CTRL), AUD_PLL_ENABLE);
        assert_ne!(regs.peek(AUD_RESET) & AUD_RESET_MN_ADJUST, 0);
        assert!(regs.peek(AUD_MN_CTRL) & AUD_MN_N_SELECT != 0);
        assert_eq!(regs.writes_to(AUD_ACR_CTRL), vec![0]);
        assert_eq!(clock.slept_ns(), 2_000_000);
    }

    #[test]
    fn n_is_always_written_before_m() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 1491, 32768);
        configure(&regs, &ManualClock::new()).unwrap();

        let log = regs.writes();
        let first_n = log.iter().position(|&(off, _)| off == AUD_N_FIXED[0]).unwrap();
        let first_m = log.iter().position(|&(off, _)| off == AUD_M_FIXED[0]).unwrap();
        assert!(first_n < first_m);
        let last_n = log.iter().rposition(|&(off, _)| off == AUD_N_FIXED[0]).unwrap();
        let last_m = log.iter().rposition(|&(off, _)| off == AUD_M_FIXED[0]).unwrap();
        assert!(last_n < last_m);
    }

    #[test]
    fn mute_clearing_during_first_poll_window_programs_m() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 1491, 32768);
        // Three clear samples, then set for one poll, then clear.
        regs.script(VBID, [0, 0, 0, VBID_AUDIO_MUTE, 0]);

        let p = configure(&regs, &ManualClock::new()).unwrap();
        assert!(!p.muted);
        assert!(!p.retry);
        assert_eq!(p.programmed_m, 2047);
    }

    #[test]
    fn stuck_mute_request_resets_the_pll_and_zeroes_m() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 1491, 32768);
        regs.poke(VBID, VBID_AUDIO_MUTE);
        let clock = ManualClock::new();

        let p = configure(&regs, &clock).unwrap();

        assert!(p.retry);
        assert!(p.muted);
        assert_eq!(p.programmed_m, 0);
        assert_eq!(u24_written(&regs, AUD_M_FIXED), 0);
        let resets = regs.writes_to(AUD_RESET);
        assert_eq!(resets[0], 0);
        assert_eq!(resets[1], AUD_RESET_MN_ADJUST | AUD_RESET_PLL);
        // Settle, then 2 + 5 poll intervals.
        assert_eq!(clock.slept_ns(), 9_000_000);
    }

    #[test]
    fn later_config_leaves_the_running_pll_m_n_alone() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR2, 65536, 1_444_507);
        let clock = ManualClock::new();

        let p = configure(&regs, &clock).unwrap();

        assert!(!p.first_config);
        assert_eq!(p.clock_select, 3);
        assert_eq!(p.m_mod, 2041);
        assert_eq!(p.programmed_m, 2041);
        for reg in AUD_N_FIXED.into_iter().chain(AUD_M_FIXED) {
            assert!(regs.writes_to(reg).is_empty());
        }
        assert!(regs.writes_to(AUD_ACR_CTRL).is_empty());
        assert_eq!(regs.peek(AUD_CLK_SEL), 3);
        assert!(regs.writes_to(AUD_MN_CTRL).is_empty());
        assert_eq!(clock.slept_ns(), 0);
    }

    #[test]
    fn zero_n_is_rejected_before_programming() {
        let regs = MockRegisters::new();
        stream(&regs, LINK_RATE_HBR, 1491, 0);
        assert_eq!(
            configure(&regs, &ManualClock::new()),
            Err(ClockRecoveryError::ZeroN)
        );
        assert_eq!(scale_m(1, 0, 45000), None);
        assert_eq!(regs.peek(AUD_INT_MASK0), 0);
    }
}
