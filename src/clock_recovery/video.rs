use dprx_regs::bus::{read_u24_be, read_u8, write_u24};
use dprx_regs::map::*;
use dprx_regs::RegisterBus;

use super::{PLL_FIELD_MAX, RATE_UNIT, REF_CLK};
use crate::error::ClockRecoveryError;

/// Post-divider selection, highest threshold first (MHz, code).
const POSDIV_THRESHOLDS: [(u64, u8); 6] = [(800, 0), (400, 1), (200, 2), (100, 3), (50, 4), (25, 5)];

/// Raw video M/N sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMn {
    pub m: u32,
    pub n: u32,
    pub link_rate: u32,
}

impl VideoMn {
    pub fn read(bus: &dyn RegisterBus) -> Self {
        Self {
            m: read_u24_be(bus, MVID),
            n: read_u24_be(bus, NVID),
            link_rate: u32::from(read_u8(bus, LINK_RATE)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPllParameters {
    pub raw: VideoMn,
    /// Recovered pixel clock, MHz (truncated).
    pub freq_mhz: u64,
    pub m_pll: u32,
    pub n_pll: u32,
    /// Number of times M and N were halved to fit the 24-bit fields.
    pub halvings: u32,
    pub posdiv: u8,
}

/// Halves `m` and `n` together until `m` fits in a 24-bit field.
pub fn scale_to_field(mut m: u64, mut n: u64) -> (u64, u64, u32) {
    let mut halvings = 0;
    while m > PLL_FIELD_MAX {
        m >>= 1;
        n >>= 1;
        halvings += 1;
    }
    (m, n, halvings)
}

pub fn posdiv_for(freq_mhz: u64) -> Option<u8> {
    POSDIV_THRESHOLDS
        .iter()
        .find(|&&(threshold, _)| freq_mhz >= threshold)
        .map(|&(_, code)| code)
}

pub fn compute_video_pll(raw: VideoMn) -> Result<VideoPllParameters, ClockRecoveryError> {
    if raw.n == 0 {
        return Err(ClockRecoveryError::ZeroN);
    }
    let n = u64::from(raw.n);
    let freq_mhz = u64::from(raw.link_rate) * RATE_UNIT * u64::from(raw.m) / n;
    let posdiv =
        posdiv_for(freq_mhz).ok_or(ClockRecoveryError::VideoClockTooLow { freq_mhz })?;

    let (m_pll, n_pll, halvings) = scale_to_field(freq_mhz * n / REF_CLK, n);
    Ok(VideoPllParameters {
        raw,
        freq_mhz,
        m_pll: m_pll as u32,
        n_pll: n_pll as u32,
        halvings,
        posdiv,
    })
}

pub fn program_video_pll(bus: &dyn RegisterBus, params: &VideoPllParameters) {
    write_u24(bus, VPLL_M, params.m_pll);
    write_u24(bus, VPLL_N, params.n_pll);
    bus.write(VPLL_POSDIV, u32::from(params.posdiv));

    // The PLL latches M/N on the rising edge of MN_READY.
    bus.clear_bits(VPLL_CTRL, VPLL_MN_READY);
    bus.set_bits(VPLL_CTRL, VPLL_MN_READY);
    bus.set_bits(VPLL_CTRL, VPLL_ENABLE);
}

/// Samples the live M/N and programs the video PLL from it. On error nothing is written.
pub fn configure_video_pll(
    bus: &dyn RegisterBus,
) -> Result<VideoPllParameters, ClockRecoveryError> {
    let params = compute_video_pll(VideoMn::read(bus))?;
    program_video_pll(bus, &params);
    tracing::debug!(
        freq_mhz = params.freq_mhz,
        m_pll = params.m_pll,
        n_pll = params.n_pll,
        posdiv = params.posdiv,
        "video PLL programmed"
    );
    Ok(params)
}
