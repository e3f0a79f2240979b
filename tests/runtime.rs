mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use common::init_tracing;
use dprx::map::*;
use dprx::{Dprx, DprxError, DprxEvent, MockRegisters};

const WAIT: Duration = Duration::from_secs(5);

fn device() -> (Arc<MockRegisters>, Dprx, mpsc::Receiver<DprxEvent>) {
    init_tracing();
    let regs = Arc::new(MockRegisters::new());
    let dprx = Dprx::new(regs.clone()).unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    dprx.set_callback(move |event| {
        let _ = tx.lock().unwrap().send(event);
    });
    (regs, dprx, rx)
}

#[test]
fn notification_thread_delivers_plug_in() {
    let (regs, dprx, rx) = device();
    let runtime = dprx.spawn().unwrap();

    regs.raise(DPIP_INT_STS0, DPIP_PLUG_IN);
    dprx.handle_irq();
    assert_eq!(rx.recv_timeout(WAIT), Ok(DprxEvent::Plugin));

    runtime.stop();
}

#[test]
fn deferred_thread_reprograms_audio() {
    let (regs, dprx, rx) = device();
    let runtime = dprx.spawn().unwrap();

    regs.raise(DPIP_INT_STS0, DPIP_PLUG_IN);
    dprx.handle_irq();
    assert_eq!(rx.recv_timeout(WAIT), Ok(DprxEvent::Plugin));

    regs.poke(LINK_RATE, LINK_RATE_HBR2);
    common::poke_u24_be(&regs, AUD_DBG_M, 1491);
    common::poke_u24_be(&regs, AUD_DBG_N, 32768);
    regs.raise(AUD_INT_STS0, AUD_MN_CHANGE);
    dprx.handle_irq();

    assert_eq!(rx.recv_timeout(WAIT), Ok(DprxEvent::AudioMnChange));
    runtime.stop();
    assert_eq!(
        dprx.audio_pll_params().map(|p| p.programmed_m),
        Some(2047)
    );
}

#[test]
fn only_one_runtime_at_a_time() {
    let (_regs, dprx, _rx) = device();
    let runtime = dprx.spawn().unwrap();
    assert!(matches!(dprx.spawn(), Err(DprxError::AlreadyRunning)));

    // The deferred queue is handed to the thread; manual draining sees nothing.
    assert_eq!(dprx.run_deferred(), 0);
    runtime.stop();

    let again = dprx.spawn().unwrap();
    drop(again);
    assert!(dprx.spawn().is_ok());
}
