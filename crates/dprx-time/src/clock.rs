use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const NS_PER_US: u64 = 1_000;
const NS_PER_MS: u64 = 1_000_000;
const NS_PER_SEC: u128 = 1_000_000_000;

/// Monotonic time source, in nanoseconds since an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// Blocking delay primitive used by hardware-settle loops.
pub trait Delay: Send + Sync {
    fn delay_us(&self, us: u32);

    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1_000));
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

impl<T: Delay + ?Sized> Delay for Arc<T> {
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Length of one period of a `hz` signal, rounded up to the next nanosecond.
///
/// Returns `None` for `hz == 0`.
pub fn period_ns_ceil(hz: u32) -> Option<u64> {
    if hz == 0 {
        return None;
    }
    let denom = hz as u128;
    Some(((NS_PER_SEC + denom - 1) / denom) as u64)
}

/// Virtual clock shared between clones.
///
/// Every [`Delay`] call advances the shared time instead of sleeping, so code that waits on
/// hardware can be exercised without real time passing.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
    slept_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ns(&self, ns: u64) {
        self.now_ns.fetch_add(ns, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_ns(ms.saturating_mul(NS_PER_MS));
    }

    pub fn set_now_ns(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Total virtual time spent inside [`Delay`] calls.
    pub fn slept_ns(&self) -> u64 {
        self.slept_ns.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

impl Delay for ManualClock {
    fn delay_us(&self, us: u32) {
        let ns = u64::from(us) * NS_PER_US;
        self.slept_ns.fetch_add(ns, Ordering::SeqCst);
        self.advance_ns(ns);
    }
}

/// Host monotonic clock anchored at construction time.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_us(&self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_delay_advances_shared_time() {
        let clock = ManualClock::new();
        let other = clock.clone();

        clock.delay_ms(3);
        other.delay_us(250);

        assert_eq!(clock.now_ns(), 3_250_000);
        assert_eq!(other.slept_ns(), 3_250_000);

        other.advance_ns(10);
        assert_eq!(clock.now_ns(), 3_250_010);
        assert_eq!(clock.slept_ns(), 3_250_000, "advance is not a delay");
    }

    #[test]
    fn period_rounds_up() {
        assert_eq!(period_ns_ceil(0), None);
        assert_eq!(period_ns_ceil(1), Some(1_000_000_000));
        assert_eq!(period_ns_ceil(60), Some(16_666_667));
        assert_eq!(period_ns_ceil(24), Some(41_666_667));
        assert_eq!(period_ns_ceil(50), Some(20_000_000));
    }

    #[test]
    fn std_clock_is_monotonic() {
        let clock = StdClock::new();
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }
}
