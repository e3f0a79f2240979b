use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent<T> {
    pub id: TimerId,
    pub deadline_ns: u64,
    pub payload: T,
}

/// One-shot timers ordered by deadline.
///
/// Timers sharing a deadline fire in scheduling order. Rescheduling is expressed as
/// cancel + schedule; a cancelled id never fires.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    by_deadline: BTreeMap<(u64, u64), T>,
    deadlines: HashMap<u64, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            by_deadline: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, deadline_ns: u64, payload: T) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.by_deadline.insert((deadline_ns, id), payload);
        self.deadlines.insert(id, deadline_ns);
        TimerId(id)
    }

    /// Removes a pending timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline_ns) => self.by_deadline.remove(&(deadline_ns, id.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    pub fn next_deadline_ns(&self) -> Option<u64> {
        self.by_deadline.keys().next().map(|&(deadline_ns, _)| deadline_ns)
    }

    /// Pops the earliest timer whose deadline is `<= now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<TimerEvent<T>> {
        let &(deadline_ns, id) = self.by_deadline.keys().next()?;
        if deadline_ns > now_ns {
            return None;
        }
        let payload = self.by_deadline.remove(&(deadline_ns, id))?;
        self.deadlines.remove(&id);
        Some(TimerEvent {
            id: TimerId(id),
            deadline_ns,
            payload,
        })
    }

    pub fn len(&self) -> usize {
        self.by_deadline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_deadline.clear();
        self.deadlines.clear();
    }
}
