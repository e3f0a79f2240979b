//! Video and audio clock recovery from the transmitted M/N ratios.
//!
//! Both paths derive a local PLL setting from `link_rate * RATE_UNIT * M / N`, where
//! `link_rate * RATE_UNIT` is the link symbol clock in MHz.

pub mod audio;
pub mod video;

pub use audio::{configure_audio_pll, AudioClockConfig, AudioPllParameters};
pub use video::{configure_video_pll, VideoMn, VideoPllParameters};

/// MHz per unit of the DPCD link-rate code.
pub const RATE_UNIT: u64 = 27;
/// Video PLL reference clock, MHz.
pub const REF_CLK: u64 = 26;
/// Largest value a 24-bit PLL field can hold.
pub const PLL_FIELD_MAX: u64 = 0xFF_FFFF;
