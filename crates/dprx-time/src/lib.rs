//! Time modelling and timer scheduling primitives for the DPRX control plane.
//!
//! All polling and settle delays in the receiver are expressed against a [`Clock`] and a
//! [`Delay`]. In production these are backed by `Instant`/`thread::sleep`; unit tests drive the
//! system deterministically via [`ManualClock`], where sleeping simply advances virtual time.
//!
//! [`TimerQueue`] uses **event delivery** rather than storing callbacks: callers schedule a
//! payload at a deadline and later pop it once the clock has passed that deadline.

mod clock;
mod timer_queue;

pub use clock::{period_ns_ceil, Clock, Delay, ManualClock, StdClock, StdDelay};
pub use timer_queue::{TimerEvent, TimerId, TimerQueue};
