use thiserror::Error;

pub type Result<T> = std::result::Result<T, DprxError>;

/// Failures of the clock-recovery computations. None of these are fatal to the link: the PLL is
/// simply left in its previous configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockRecoveryError {
    #[error("M/N ratio has a zero denominator")]
    ZeroN,

    #[error("video clock {freq_mhz} MHz is below every post-divider threshold")]
    VideoClockTooLow { freq_mhz: u64 },

    #[error("unsupported link rate code {0:#04x}")]
    UnsupportedLinkRate(u32),

    #[error("audio sample rate {fs_khz} kHz is below every clock-select threshold")]
    AudioRateTooLow { fs_khz: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameRateError {
    /// Neither M/N source produced a rate inside a known band.
    #[error("frame rate did not match any band after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{0}` must be non-zero")]
    Zero(&'static str),

    #[error("invalid config JSON: {0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DprxError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    ClockRecovery(#[from] ClockRecoveryError),

    #[error(transparent)]
    FrameRate(#[from] FrameRateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("runtime already started")]
    AlreadyRunning,

    #[error("failed to spawn {name} thread: {reason}")]
    Spawn { name: &'static str, reason: String },
}
