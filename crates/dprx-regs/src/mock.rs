use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::bus::RegisterBus;
use crate::map::INT_STATUS_REGS;

#[derive(Debug, Default)]
struct State {
    values: HashMap<u32, u32>,
    scripted: HashMap<u32, VecDeque<u32>>,
    w1c: HashSet<u32>,
    writes: Vec<(u32, u32)>,
    reads: HashMap<u32, u32>,
}

/// In-memory model of the DPRX register file.
///
/// - Interrupt-status registers are write-1-to-clear; everything else stores what is written.
/// - [`MockRegisters::script`] queues values returned by successive reads of one register; the
///   last scripted value sticks once the queue drains.
/// - Every write is logged in order.
#[derive(Debug)]
pub struct MockRegisters {
    state: Mutex<State>,
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisters {
    pub fn new() -> Self {
        let mut state = State::default();
        state.w1c.extend(INT_STATUS_REGS);
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Sets a register without logging it as a driver write.
    pub fn poke(&self, offset: u32, value: u32) {
        self.lock().values.insert(offset, value);
    }

    /// Current stored value, without consuming scripted reads.
    pub fn peek(&self, offset: u32) -> u32 {
        self.lock().values.get(&offset).copied().unwrap_or(0)
    }

    /// Hardware-side assertion of status bits (ORs into the register).
    pub fn raise(&self, offset: u32, bits: u32) {
        *self.lock().values.entry(offset).or_insert(0) |= bits;
    }

    pub fn script(&self, offset: u32, values: impl IntoIterator<Item = u32>) {
        self.lock()
            .scripted
            .entry(offset)
            .or_default()
            .extend(values);
    }

    pub fn set_write_1_to_clear(&self, offset: u32, w1c: bool) {
        let mut state = self.lock();
        if w1c {
            state.w1c.insert(offset);
        } else {
            state.w1c.remove(&offset);
        }
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.lock().writes.clone()
    }

    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.lock()
            .writes
            .iter()
            .filter(|&&(off, _)| off == offset)
            .map(|&(_, value)| value)
            .collect()
    }

    pub fn clear_write_log(&self) {
        self.lock().writes.clear();
    }

    pub fn read_count(&self, offset: u32) -> u32 {
        self.lock().reads.get(&offset).copied().unwrap_or(0)
    }
}

impl RegisterBus for MockRegisters {
    fn read(&self, offset: u32) -> u32 {
        let mut state = self.lock();
        *state.reads.entry(offset).or_insert(0) += 1;
        if let Some(next) = state.scripted.get_mut(&offset).and_then(VecDeque::pop_front) {
            state.values.insert(offset, next);
        }
        state.values.get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: u32, value: u32) {
        let mut state = self.lock();
        state.writes.push((offset, value));
        if state.w1c.contains(&offset) {
            if let Some(current) = state.values.get_mut(&offset) {
                *current &= !value;
            }
        } else {
            state.values.insert(offset, value);
        }
    }
}
