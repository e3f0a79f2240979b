//! Notification events and the hand-off between event context and the worker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Conditions reported to the registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DprxEvent {
    Unplug,
    Plugin,
    LinkError,
    BwChange,
    VideoMute,
    MsaChange,
    AudioMnChange,
    PpsChange,
    DscChange,
    VideoOn,
    VideoStable,
    VideoNotStable,
    AudioInfoChange,
    SpdInfoChange,
    HdrInfoChange,
    AudioMute,
    StereoTypeChange,
    AudioUnmute,
    AudioOverflow,
}

impl DprxEvent {
    /// Order in which the worker drains pending events.
    pub const PRIORITY: [DprxEvent; 19] = [
        DprxEvent::Unplug,
        DprxEvent::Plugin,
        DprxEvent::LinkError,
        DprxEvent::BwChange,
        DprxEvent::VideoMute,
        DprxEvent::MsaChange,
        DprxEvent::AudioMnChange,
        DprxEvent::PpsChange,
        DprxEvent::DscChange,
        DprxEvent::VideoOn,
        DprxEvent::VideoStable,
        DprxEvent::VideoNotStable,
        DprxEvent::AudioInfoChange,
        DprxEvent::SpdInfoChange,
        DprxEvent::HdrInfoChange,
        DprxEvent::AudioMute,
        DprxEvent::StereoTypeChange,
        DprxEvent::AudioUnmute,
        DprxEvent::AudioOverflow,
    ];

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// One atomic flag per [`DprxEvent`].
///
/// Producers [`post`](Self::post); the worker [`take`](Self::take)s. Posting an event that is
/// already pending coalesces with it.
#[derive(Debug, Default)]
pub struct CallbackStatusSet {
    bits: AtomicU32,
}

impl CallbackStatusSet {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// Returns `true` if the flag was not already pending.
    pub fn post(&self, event: DprxEvent) -> bool {
        self.bits.fetch_or(event.bit(), Ordering::AcqRel) & event.bit() == 0
    }

    /// Atomically tests and clears the flag.
    pub fn take(&self, event: DprxEvent) -> bool {
        self.bits.fetch_and(!event.bit(), Ordering::AcqRel) & event.bit() != 0
    }

    pub fn is_pending(&self, event: DprxEvent) -> bool {
        self.bits.load(Ordering::Acquire) & event.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    /// Pending events in drain order, without clearing them.
    pub fn pending(&self) -> Vec<DprxEvent> {
        let bits = self.bits.load(Ordering::Acquire);
        DprxEvent::PRIORITY
            .into_iter()
            .filter(|ev| bits & ev.bit() != 0)
            .collect()
    }

    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }
}

/// Binary wake-up signal: a pending flag guarded by a mutex plus a condvar.
#[derive(Debug, Default)]
pub struct Signal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn notify(&self) {
        *self.lock() = true;
        self.cond.notify_all();
    }

    /// Blocks until notified, then consumes the notification.
    pub fn wait(&self) {
        let mut pending = self.lock();
        while !*pending {
            pending = match self.cond.wait(pending) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *pending = false;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns whether it was notified.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.lock();
        let (mut pending, _) = match self.cond.wait_timeout_while(pending, timeout, |p| !*p) {
            Ok(res) => res,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *pending, false)
    }
}
