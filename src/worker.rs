//! Notification worker: drains posted events in priority order and escalates persistent audio
//! overflow into a link power cycle.

use std::sync::Arc;

use dprx_regs::map::*;
use dprx_regs::RegisterBus;

use crate::device::{lock, Shared};
use crate::event::DprxEvent;

/// Link-level power sequencing used by overflow recovery.
pub trait LinkControl: Send + Sync {
    fn stop(&self);
    fn power_down(&self);
    fn power_up(&self);
    fn start(&self);
}

/// [`LinkControl`] over the core-control register.
pub struct RegisterLinkControl {
    bus: Arc<dyn RegisterBus>,
}

impl RegisterLinkControl {
    pub fn new(bus: Arc<dyn RegisterBus>) -> Self {
        Self { bus }
    }
}

impl LinkControl for RegisterLinkControl {
    fn stop(&self) {
        self.bus.clear_bits(CORE_CTRL, CORE_ENABLE);
    }

    fn power_down(&self) {
        self.bus.clear_bits(CORE_CTRL, CORE_POWER_ON);
    }

    fn power_up(&self) {
        self.bus.set_bits(CORE_CTRL, CORE_POWER_ON);
    }

    fn start(&self) {
        self.bus.set_bits(CORE_CTRL, CORE_ENABLE);
    }
}

/// Counts consecutive drain passes that delivered an audio overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowTracker {
    streak: u32,
    threshold: u32,
}

impl OverflowTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            streak: 0,
            threshold,
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Records one non-empty drain pass. Returns `true` when the link must be recovered; the
    /// streak restarts from zero in that case.
    pub fn record_pass(&mut self, took_overflow: bool) -> bool {
        if !took_overflow {
            self.streak = 0;
            return false;
        }
        self.streak += 1;
        if self.streak > self.threshold {
            self.streak = 0;
            return true;
        }
        false
    }
}

impl Shared {
    /// Delivers every pending event, repeating until a pass finds nothing. Returns the number of
    /// events delivered.
    pub(crate) fn drain_notifications(&self) -> usize {
        let mut delivered = 0;
        loop {
            let mut took_any = false;
            let mut took_overflow = false;
            for event in DprxEvent::PRIORITY {
                if !self.events.take(event) {
                    continue;
                }
                took_any = true;
                match event {
                    DprxEvent::VideoOn => self.start_stability_poll(),
                    DprxEvent::AudioOverflow => took_overflow = true,
                    _ => {}
                }
                self.deliver(event);
                delivered += 1;
            }
            if !took_any {
                return delivered;
            }

            let recover = lock(&self.overflow).record_pass(took_overflow);
            if recover {
                self.recover_link();
            }
        }
    }

    fn deliver(&self, event: DprxEvent) {
        let callback = lock(&self.callback).clone();
        match callback {
            Some(callback) => callback(event),
            None => tracing::trace!(?event, "no callback registered"),
        }
    }

    fn recover_link(&self) {
        tracing::warn!(
            threshold = self.cfg.overflow_recovery_threshold,
            "persistent audio overflow, power-cycling link"
        );
        self.link.stop();
        self.link.power_down();
        self.link.power_up();
        self.link.start();
        self.latches.reset_all(&*self.bus);
        tracing::info!("link recovered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dprx_regs::MockRegisters;

    #[test]
    fn streak_resets_on_a_clean_pass() {
        let mut t = OverflowTracker::new(2);
        assert!(!t.record_pass(true));
        assert!(!t.record_pass(true));
        assert!(!t.record_pass(false));
        assert_eq!(t.streak(), 0);
        assert!(!t.record_pass(true));
        assert!(!t.record_pass(true));
        assert!(t.record_pass(true));
        assert_eq!(t.streak(), 0);
    }

    #[test]
    fn register_link_control_cycles_core_bits() {
        let regs = Arc::new(MockRegisters::new());
        regs.poke(CORE_CTRL, CORE_ENABLE | CORE_POWER_ON);
        let link = RegisterLinkControl::new(regs.clone());

        link.stop();
        link.power_down();
        assert_eq!(regs.peek(CORE_CTRL), 0);
        link.power_up();
        link.start();
        assert_eq!(
            regs.writes_to(CORE_CTRL),
            vec![CORE_POWER_ON, 0, CORE_POWER_ON, CORE_ENABLE | CORE_POWER_ON]
        );
    }
}
