//! DisplayPort receiver (DPRX) audio/video control plane.
//!
//! Turns the receiver core's interrupt and status registers into a synchronization state
//! machine: edge latches per event category, video/audio clock recovery from the link M/N
//! ratios, frame-rate classification, mute sequencing and a bounded video-stability poll.
//! Notifications reach the user through a callback invoked from a dedicated worker context.
//!
//! Hardware is reached through [`RegisterBus`]; time through [`Clock`]/[`Delay`]. Tests drive
//! everything with [`MockRegisters`] and [`ManualClock`].

pub mod clock_recovery;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod frame_rate;
pub mod latch;
pub mod metadata;
pub mod mute;
pub mod runtime;
pub mod stability;
pub mod status;
pub mod worker;

pub use dprx_regs::{map, MockRegisters, RegisterBus};
pub use dprx_time::{Clock, Delay, ManualClock, StdClock, StdDelay};

pub use clock_recovery::{AudioPllParameters, VideoMn, VideoPllParameters};
pub use config::DprxConfig;
pub use device::{Dprx, DprxBuilder};
pub use dispatcher::DeferredTask;
pub use error::{ClockRecoveryError, ConfigError, DprxError, FrameRateError, Result};
pub use event::DprxEvent;
pub use metadata::InfoFrameKind;
pub use runtime::DprxRuntime;
pub use stability::StabilityState;
pub use status::{
    ColorDepth, ColorFormat, ColorInfo, DynamicRange, HdcpStatus, LinkStatus, PowerState,
    Stereo3d, SyncPolarity, Timing, VideoStatus, YuvMatrix,
};
pub use worker::{LinkControl, RegisterLinkControl};
