//! The receiver handle and the state shared between its execution contexts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};

use dprx_regs::map::*;
use dprx_regs::{MaskRegister, RegisterBus};
use dprx_time::{Clock, Delay, StdClock, StdDelay, TimerQueue};

use crate::clock_recovery::{AudioPllParameters, VideoPllParameters};
use crate::config::DprxConfig;
use crate::dispatcher::DeferredTask;
use crate::error::{DprxError, FrameRateError, Result};
use crate::event::{CallbackStatusSet, DprxEvent, Signal};
use crate::frame_rate::{self, FrameClassifier};
use crate::latch::EventLatches;
use crate::metadata::{self, InfoFrameKind};
use crate::mute::MuteSequencer;
use crate::stability::{DprxTimer, StabilityPoller, StabilityState, StabilityVerdict};
use crate::status::{LinkStatus, VideoStatus};
use crate::worker::{LinkControl, OverflowTracker, RegisterLinkControl};

pub(crate) type Callback = Arc<dyn Fn(DprxEvent) + Send + Sync>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct Shared {
    pub(crate) bus: Arc<dyn RegisterBus>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) delay: Arc<dyn Delay>,
    pub(crate) link: Arc<dyn LinkControl>,
    pub(crate) cfg: DprxConfig,

    pub(crate) latches: EventLatches,
    pub(crate) events: CallbackStatusSet,
    pub(crate) mute: MuteSequencer,
    /// `AUD_INT_MASK0`, shared by the mute sequencer and the audio PLL routine.
    pub(crate) audio_mask: MaskRegister,
    pub(crate) frame: FrameClassifier,
    pub(crate) plugged: AtomicBool,

    pub(crate) video: Mutex<VideoStatus>,
    pub(crate) video_pll: Mutex<Option<VideoPllParameters>>,
    pub(crate) audio_pll: Mutex<Option<AudioPllParameters>>,

    // Lock order: stability, then timers.
    pub(crate) stability: Mutex<StabilityPoller>,
    pub(crate) timers: Mutex<TimerQueue<DprxTimer>>,

    pub(crate) deferred_tx: SyncSender<DeferredTask>,
    pub(crate) deferred_rx: Mutex<Option<Receiver<DeferredTask>>>,
    pub(crate) overflow: Mutex<OverflowTracker>,
    pub(crate) callback: Mutex<Option<Callback>>,

    pub(crate) worker_signal: Signal,
    pub(crate) timer_signal: Signal,
    pub(crate) stop: AtomicBool,
    pub(crate) running: AtomicBool,
}

impl Shared {
    pub(crate) fn is_plugged(&self) -> bool {
        self.plugged.load(Ordering::Acquire)
    }

    pub(crate) fn on_plug_in(&self) {
        self.plugged.store(true, Ordering::Release);
        let bus = &*self.bus;
        self.latches.main_link.discard(bus);
        self.latches.dpcd.discard(bus);
        self.latches.audio.discard(bus);
        self.mute.reset();
        self.events.post(DprxEvent::Plugin);
        tracing::info!("cable plugged in");
    }

    pub(crate) fn on_unplug(&self) {
        self.plugged.store(false, Ordering::Release);
        {
            let mut poller = lock(&self.stability);
            let mut timers = lock(&self.timers);
            poller.cancel(&mut timers);
        }
        *lock(&self.video) = VideoStatus::default();
        self.events.post(DprxEvent::Unplug);
        tracing::info!("cable unplugged");
    }

    /// Classifies the current frame rate and records it on success.
    pub(crate) fn measure_frame_rate(&self) -> std::result::Result<u32, FrameRateError> {
        let cached = lock(&self.video_pll).map(|p| p.raw);
        let rate = self.frame.classify(&*self.bus, cached)?;
        lock(&self.video).frame_rate = rate;
        Ok(rate)
    }

    pub(crate) fn frame_period_ns(&self) -> u64 {
        let fresh = self.measure_frame_rate().ok();
        let last_known = lock(&self.video).frame_rate;
        frame_rate::frame_period_ns(fresh, last_known, self.cfg.fallback_frame_rate_hz)
    }

    pub(crate) fn start_stability_poll(&self) {
        let frames = u64::from(self.cfg.stable_initial_delay_frames);
        let delay_ns = self.frame_period_ns().saturating_mul(frames);
        let now_ns = self.clock.now_ns();
        {
            let mut poller = lock(&self.stability);
            let mut timers = lock(&self.timers);
            poller.arm(&mut timers, now_ns, delay_ns, self.cfg.stable_poll_count);
        }
        tracing::debug!(delay_ns, "video stability poll armed");
        self.timer_signal.notify();
    }

    /// Fires every timer whose deadline has passed. Returns the number fired.
    pub(crate) fn run_due_timers(&self) -> usize {
        let mut fired = 0;
        loop {
            let now_ns = self.clock.now_ns();
            let verdict = {
                let mut poller = lock(&self.stability);
                let mut timers = lock(&self.timers);
                let Some(event) = timers.pop_due(now_ns) else {
                    break;
                };
                fired += 1;
                let DprxTimer::VideoStable { episode } = event.payload;
                let stable = self.bus.test_bits(VIDEO_STATUS, VIDEO_STATUS_STABLE);
                poller.on_fire(episode, stable, &mut timers, now_ns, || self.frame_period_ns())
            };
            match verdict {
                Some(StabilityVerdict::Stable) => {
                    tracing::info!("video stable");
                    self.events.post(DprxEvent::VideoStable);
                    self.worker_signal.notify();
                }
                Some(StabilityVerdict::Unstable) => {
                    tracing::warn!("video did not become stable");
                    self.events.post(DprxEvent::VideoNotStable);
                    self.worker_signal.notify();
                }
                None => {}
            }
        }
        fired
    }

    pub(crate) fn next_deadline_ns(&self) -> Option<u64> {
        lock(&self.timers).next_deadline_ns()
    }
}

/// Builder for [`Dprx`]. Everything but the register bus has a production default.
pub struct DprxBuilder {
    bus: Arc<dyn RegisterBus>,
    clock: Option<Arc<dyn Clock>>,
    delay: Option<Arc<dyn Delay>>,
    link: Option<Arc<dyn LinkControl>>,
    config: DprxConfig,
}

impl DprxBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn link_control(mut self, link: Arc<dyn LinkControl>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn config(mut self, config: DprxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Dprx> {
        self.config.validate()?;
        let bus = self.bus;
        let link = self
            .link
            .unwrap_or_else(|| Arc::new(RegisterLinkControl::new(bus.clone())));
        let (deferred_tx, deferred_rx) = sync_channel(self.config.deferred_queue_depth);

        let shared = Shared {
            clock: self.clock.unwrap_or_else(|| Arc::new(StdClock::new())),
            delay: self.delay.unwrap_or_else(|| Arc::new(StdDelay)),
            link,
            cfg: self.config,
            latches: EventLatches::new(),
            events: CallbackStatusSet::new(),
            mute: MuteSequencer::new(),
            audio_mask: MaskRegister::new(AUD_INT_MASK0),
            frame: FrameClassifier::new(),
            plugged: AtomicBool::new(false),
            video: Mutex::new(VideoStatus::default()),
            video_pll: Mutex::new(None),
            audio_pll: Mutex::new(None),
            stability: Mutex::new(StabilityPoller::new()),
            timers: Mutex::new(TimerQueue::new()),
            deferred_tx,
            deferred_rx: Mutex::new(Some(deferred_rx)),
            overflow: Mutex::new(OverflowTracker::new(self.config.overflow_recovery_threshold)),
            callback: Mutex::new(None),
            worker_signal: Signal::new(),
            timer_signal: Signal::new(),
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            bus,
        };
        Ok(Dprx {
            shared: Arc::new(shared),
        })
    }
}

/// DisplayPort receiver control plane.
///
/// The handle can be driven explicitly (`handle_irq`, `run_deferred`, `run_due_timers`,
/// `drain_notifications`) or handed to [`Dprx::spawn`], which runs the deferred, timer and
/// notification contexts on their own threads. `handle_irq` is always called by the owner of the
/// interrupt line.
pub struct Dprx {
    pub(crate) shared: Arc<Shared>,
}

impl Dprx {
    pub fn builder(bus: Arc<dyn RegisterBus>) -> DprxBuilder {
        DprxBuilder {
            bus,
            clock: None,
            delay: None,
            link: None,
            config: DprxConfig::default(),
        }
    }

    pub fn new(bus: Arc<dyn RegisterBus>) -> Result<Self> {
        Self::builder(bus).build()
    }

    pub fn config(&self) -> &DprxConfig {
        &self.shared.cfg
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(DprxEvent) + Send + Sync + 'static,
    {
        *lock(&self.shared.callback) = Some(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        *lock(&self.shared.callback) = None;
    }

    /// Event context entry point; call whenever the DPRX interrupt line is asserted.
    pub fn handle_irq(&self) {
        self.shared.handle_irq();
    }

    /// Runs queued deferred work (audio PLL recomputation). Returns the number of tasks run.
    ///
    /// Does nothing while a runtime owns the deferred context.
    pub fn run_deferred(&self) -> usize {
        self.shared.run_deferred()
    }

    pub fn run_due_timers(&self) -> usize {
        self.shared.run_due_timers()
    }

    pub fn next_timer_deadline_ns(&self) -> Option<u64> {
        self.shared.next_deadline_ns()
    }

    /// Delivers pending notifications to the callback in priority order.
    pub fn drain_notifications(&self) -> usize {
        self.shared.drain_notifications()
    }

    pub fn pending_events(&self) -> Vec<DprxEvent> {
        self.shared.events.pending()
    }

    pub fn video_status(&self) -> VideoStatus {
        *lock(&self.shared.video)
    }

    /// Returns and clears the PPS-changed flag.
    pub fn take_pps_changed(&self) -> bool {
        std::mem::take(&mut lock(&self.shared.video).pps_changed)
    }

    pub fn link_status(&self) -> LinkStatus {
        metadata::read_link_status(&*self.shared.bus)
    }

    pub fn is_plugged(&self) -> bool {
        self.shared.is_plugged()
    }

    /// Drives hot-plug detect and updates the plug state as if the cable event had arrived.
    pub fn set_plugged(&self, plugged: bool) {
        let bus = &*self.shared.bus;
        if plugged {
            bus.set_bits(HPD_CTRL, HPD_ASSERT);
            self.shared.on_plug_in();
        } else {
            bus.clear_bits(HPD_CTRL, HPD_ASSERT);
            self.shared.on_unplug();
        }
        self.shared.worker_signal.notify();
    }

    pub fn is_audio_muted(&self) -> bool {
        self.shared.mute.is_audio_muted()
    }

    pub fn audio_pll_params(&self) -> Option<AudioPllParameters> {
        *lock(&self.shared.audio_pll)
    }

    pub fn video_pll_params(&self) -> Option<VideoPllParameters> {
        *lock(&self.shared.video_pll)
    }

    pub fn stability_state(&self) -> StabilityState {
        lock(&self.shared.stability).state()
    }

    pub fn overflow_streak(&self) -> u32 {
        lock(&self.shared.overflow).streak()
    }

    /// Copies one info-frame packet into `buf` and returns its length.
    pub fn read_info_frame(&self, kind: InfoFrameKind, buf: &mut [u8]) -> Result<usize> {
        metadata::read_info_frame(&*self.shared.bus, kind, buf)
    }

    /// Classifies the current frame rate. On failure the last known rate is kept.
    pub fn frame_rate(&self) -> Result<u32> {
        self.shared.measure_frame_rate().map_err(DprxError::from)
    }
}
