use std::sync::{Mutex, MutexGuard};

use crate::bus::RegisterBus;

/// An interrupt-mask register updated from more than one execution context.
///
/// Every update is a read-modify-write on the bus; the lock keeps two contexts from writing back
/// each other's stale copy.
#[derive(Debug)]
pub struct MaskRegister {
    offset: u32,
    lock: Mutex<()>,
}

impl MaskRegister {
    pub const fn new(offset: u32) -> Self {
        Self {
            offset,
            lock: Mutex::new(()),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mask(&self, bus: &dyn RegisterBus, bits: u32) {
        let _guard = self.guard();
        bus.set_bits(self.offset, bits);
    }

    pub fn unmask(&self, bus: &dyn RegisterBus, bits: u32) {
        let _guard = self.guard();
        bus.clear_bits(self.offset, bits);
    }
}
