//! Bounded poll of the hardware video-stable bit after video comes on.

use dprx_time::{TimerId, TimerQueue};

/// Payloads scheduled on the device timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DprxTimer {
    VideoStable { episode: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StabilityState {
    #[default]
    Idle,
    Polling {
        index: u8,
    },
    Stable,
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityVerdict {
    Stable,
    Unstable,
}

#[derive(Debug, Default)]
pub struct StabilityPoller {
    state: StabilityState,
    episode: u64,
    fires: u32,
    timer_id: Option<TimerId>,
}

impl StabilityPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    /// Fires handled in the current episode.
    pub fn fires(&self) -> u32 {
        self.fires
    }

    pub fn is_armed(&self) -> bool {
        self.timer_id.is_some()
    }

    /// Starts a new episode, discarding any pending poll of the previous one.
    pub fn arm(
        &mut self,
        queue: &mut TimerQueue<DprxTimer>,
        now_ns: u64,
        initial_delay_ns: u64,
        poll_count: u8,
    ) {
        self.cancel(queue);
        self.episode = self.episode.wrapping_add(1);
        self.fires = 0;
        self.state = StabilityState::Polling { index: poll_count };
        self.timer_id = Some(queue.schedule(
            now_ns.saturating_add(initial_delay_ns),
            DprxTimer::VideoStable {
                episode: self.episode,
            },
        ));
    }

    pub fn cancel(&mut self, queue: &mut TimerQueue<DprxTimer>) {
        if let Some(id) = self.timer_id.take() {
            queue.cancel(id);
        }
        if matches!(self.state, StabilityState::Polling { .. }) {
            self.state = StabilityState::Idle;
        }
    }

    /// Handles one expiry. `frame_period_ns` is only evaluated when another poll is needed.
    pub fn on_fire(
        &mut self,
        episode: u64,
        stable: bool,
        queue: &mut TimerQueue<DprxTimer>,
        now_ns: u64,
        frame_period_ns: impl FnOnce() -> u64,
    ) -> Option<StabilityVerdict> {
        let StabilityState::Polling { index } = self.state else {
            return None;
        };
        if episode != self.episode {
            return None;
        }
        self.timer_id = None;
        self.fires += 1;

        if index == 0 {
            self.state = StabilityState::Unstable;
            return Some(StabilityVerdict::Unstable);
        }
        if stable {
            self.state = StabilityState::Stable;
            return Some(StabilityVerdict::Stable);
        }

        self.state = StabilityState::Polling { index: index - 1 };
        self.timer_id = Some(queue.schedule(
            now_ns.saturating_add(frame_period_ns()),
            DprxTimer::VideoStable { episode },
        ));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: u64 = 16_666_667;

    fn drive(
        poller: &mut StabilityPoller,
        queue: &mut TimerQueue<DprxTimer>,
        stable_at: Option<u32>,
    ) -> (StabilityVerdict, u64) {
        let mut now = 0;
        loop {
            let deadline = queue.next_deadline_ns().expect("poll pending");
            now = now.max(deadline);
            let ev = queue.pop_due(now).expect("due");
            let DprxTimer::VideoStable { episode } = ev.payload;
            let stable = stable_at.is_some_and(|n| poller.fires() + 1 >= n);
            if let Some(v) = poller.on_fire(episode, stable, queue, now, || FRAME) {
                return (v, now);
            }
        }
    }

    #[test]
    fn never_stable_gives_up_after_21_fires() {
        let mut queue = TimerQueue::new();
        let mut poller = StabilityPoller::new();
        poller.arm(&mut queue, 0, 5 * FRAME, 20);

        let (verdict, at) = drive(&mut poller, &mut queue, None);
        assert_eq!(verdict, StabilityVerdict::Unstable);
        assert_eq!(poller.fires(), 21);
        assert_eq!(at, 5 * FRAME + 20 * FRAME);
        assert!(queue.is_empty());
        assert!(!poller.is_armed());
    }

    #[test]
    fn stable_bit_ends_the_episode_early() {
        let mut queue = TimerQueue::new();
        let mut poller = StabilityPoller::new();
        poller.arm(&mut queue, 0, 5 * FRAME, 20);

        let (verdict, _) = drive(&mut poller, &mut queue, Some(4));
        assert_eq!(verdict, StabilityVerdict::Stable);
        assert_eq!(poller.fires(), 4);
        assert_eq!(poller.state(), StabilityState::Stable);
        assert!(queue.is_empty());
    }

    #[test]
    fn rearm_discards_the_previous_episode() {
        let mut queue = TimerQueue::new();
        let mut poller = StabilityPoller::new();
        poller.arm(&mut queue, 0, 10, 20);
        poller.arm(&mut queue, 0, 20, 20);
        assert_eq!(queue.len(), 1);

        // A stale expiry from the first episode is ignored.
        assert_eq!(poller.on_fire(1, true, &mut queue, 10, || FRAME), None);
        assert_eq!(poller.state(), StabilityState::Polling { index: 20 });
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut queue = TimerQueue::new();
        let mut poller = StabilityPoller::new();
        poller.arm(&mut queue, 0, 10, 3);
        poller.cancel(&mut queue);
        assert!(queue.is_empty());
        assert_eq!(poller.state(), StabilityState::Idle);
        assert_eq!(poller.on_fire(1, true, &mut queue, 10, || FRAME), None);
    }
}
