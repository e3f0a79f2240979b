//! Threads hosting the deferred, timer and notification contexts.

use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::{lock, Dprx, Shared};
use crate::dispatcher::DeferredTask;
use crate::error::{DprxError, Result};

fn spawn_named<T, F>(name: &'static str, f: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| DprxError::Spawn {
            name,
            reason: e.to_string(),
        })
}

fn notify_loop(shared: Arc<Shared>) {
    while !shared.stop.load(Ordering::Acquire) {
        shared.drain_notifications();
        shared.worker_signal.wait();
    }
}

fn deferred_loop(shared: Arc<Shared>, rx: Receiver<DeferredTask>) -> Receiver<DeferredTask> {
    while let Ok(task) = rx.recv() {
        if !shared.run_task(task) {
            break;
        }
    }
    rx
}

fn timer_loop(shared: Arc<Shared>) {
    while !shared.stop.load(Ordering::Acquire) {
        shared.run_due_timers();
        match shared.next_deadline_ns() {
            Some(deadline_ns) => {
                let wait = deadline_ns.saturating_sub(shared.clock.now_ns());
                shared.timer_signal.wait_timeout(Duration::from_nanos(wait));
            }
            None => shared.timer_signal.wait(),
        }
    }
}

/// Running execution contexts of a [`Dprx`]. Dropping it stops them.
pub struct DprxRuntime {
    shared: Arc<Shared>,
    deferred: Option<JoinHandle<Receiver<DeferredTask>>>,
    threads: Vec<JoinHandle<()>>,
}

impl Dprx {
    /// Starts the deferred, timer and notification threads.
    pub fn spawn(&self) -> Result<DprxRuntime> {
        let shared = &self.shared;
        if shared.running.swap(true, Ordering::AcqRel) {
            return Err(DprxError::AlreadyRunning);
        }
        let Some(rx) = lock(&shared.deferred_rx).take() else {
            shared.running.store(false, Ordering::Release);
            return Err(DprxError::AlreadyRunning);
        };
        shared.stop.store(false, Ordering::Release);

        let mut runtime = DprxRuntime {
            shared: Arc::clone(shared),
            deferred: None,
            threads: Vec::new(),
        };

        let s = Arc::clone(shared);
        match spawn_named("dprx-deferred", move || deferred_loop(s, rx)) {
            Ok(handle) => runtime.deferred = Some(handle),
            Err(e) => {
                runtime.shutdown();
                return Err(e);
            }
        }

        let s = Arc::clone(shared);
        match spawn_named("dprx-timer", move || timer_loop(s)) {
            Ok(handle) => runtime.threads.push(handle),
            Err(e) => {
                runtime.shutdown();
                return Err(e);
            }
        }
        let s = Arc::clone(shared);
        match spawn_named("dprx-notify", move || notify_loop(s)) {
            Ok(handle) => runtime.threads.push(handle),
            Err(e) => {
                runtime.shutdown();
                return Err(e);
            }
        }

        tracing::info!("DPRX runtime started");
        Ok(runtime)
    }
}

impl DprxRuntime {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let shared = &self.shared;
        shared.stop.store(true, Ordering::Release);
        shared.worker_signal.notify();
        shared.timer_signal.notify();
        if self.deferred.is_some() {
            // Blocks only while the queue is full, which the deferred thread drains.
            let _ = shared.deferred_tx.send(DeferredTask::Shutdown);
        }

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("DPRX runtime thread panicked");
            }
        }
        if let Some(handle) = self.deferred.take() {
            match handle.join() {
                Ok(rx) => *lock(&shared.deferred_rx) = Some(rx),
                Err(_) => tracing::warn!("DPRX deferred thread panicked"),
            }
        }

        shared.stop.store(false, Ordering::Release);
        shared.running.store(false, Ordering::Release);
        tracing::info!("DPRX runtime stopped");
    }
}

impl Drop for DprxRuntime {
    fn drop(&mut self) {
        if self.deferred.is_some() || !self.threads.is_empty() {
            self.shutdown();
        }
    }
}
