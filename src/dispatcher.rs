//! Event-context interrupt handling and the deferred task context.
//!
//! `handle_irq` only latches, reacts to what must happen immediately, and posts notifications.
//! Anything that sleeps (the audio PLL routine) is handed to the deferred context as a
//! [`DeferredTask`].

use std::sync::mpsc::TrySendError;

use dprx_regs::map::*;

use crate::clock_recovery::{configure_audio_pll, configure_video_pll, AudioClockConfig};
use crate::device::{lock, Shared};
use crate::event::DprxEvent;
use crate::latch::{AudioFlags, DpIpFlags, DpcdFlags, MainLinkFlags};
use crate::metadata::{read_color, read_stereo, read_timing};
use crate::mute::AudioMuteCause;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    ConfigureAudioPll,
    /// Ends the deferred thread of a runtime.
    Shutdown,
}

const AUDIO_MUTE_TRIGGERS: [(AudioFlags, AudioMuteCause); 6] = [
    (AudioFlags::CH_STATUS_CHANGE, AudioMuteCause::ChannelStatusChange),
    (AudioFlags::VBID_MUTE, AudioMuteCause::VbidMute),
    (AudioFlags::FIFO_UNDERFLOW, AudioMuteCause::FifoUnderflow),
    (AudioFlags::FIFO_OVERFLOW, AudioMuteCause::FifoOverflow),
    (AudioFlags::LINK_ERROR, AudioMuteCause::LinkError),
    (AudioFlags::RS_DECODE_ERROR, AudioMuteCause::RsDecodeError),
];

impl Shared {
    pub(crate) fn handle_irq(&self) {
        let bus = &*self.bus;

        let dp_ip = &self.latches.dp_ip;
        dp_ip.merge_and_latch(bus);
        if dp_ip.consume(DpIpFlags::UNPLUG) {
            self.on_unplug();
        }
        if dp_ip.consume(DpIpFlags::PLUG_IN) {
            self.on_plug_in();
        }

        // Always acknowledge so the line drops; unplugged events stay latched.
        self.latches.main_link.merge_and_latch(bus);
        self.latches.dpcd.merge_and_latch(bus);
        self.latches.audio.merge_and_latch(bus);

        if self.is_plugged() {
            self.handle_dpcd();
            self.handle_main_link();
            self.handle_audio();
        }

        if !self.events.is_empty() {
            self.worker_signal.notify();
        }
    }

    fn handle_dpcd(&self) {
        let dpcd = &self.latches.dpcd;
        if dpcd.consume(DpcdFlags::LINK_ERROR) {
            tracing::warn!("DPCD link error");
            self.events.post(DprxEvent::LinkError);
        }
        if dpcd.consume(DpcdFlags::TRAINING_DONE) {
            tracing::info!("link training done");
        }
        if dpcd.consume(DpcdFlags::POWER_STATE) {
            tracing::debug!(power = self.bus.read(POWER_STATE), "DPCD power state changed");
        }
        if dpcd.consume(DpcdFlags::HDCP_STATE) {
            tracing::debug!(hdcp = self.bus.read(HDCP_STATUS), "HDCP state changed");
        }
    }

    fn handle_main_link(&self) {
        let bus = &*self.bus;
        let ml = &self.latches.main_link;

        if ml.consume(MainLinkFlags::BW_CHANGE) {
            self.events.post(DprxEvent::BwChange);
        }
        if ml.consume(MainLinkFlags::MSA_UPDATE) {
            self.capture_msa();
            self.events.post(DprxEvent::MsaChange);
        }
        if ml.consume(MainLinkFlags::VSC_UPDATE) {
            let color = read_color(bus);
            let stereo = read_stereo(bus);
            let changed = {
                let mut video = lock(&self.video);
                video.color = color;
                std::mem::replace(&mut video.stereo, stereo) != stereo
            };
            if changed {
                tracing::debug!(?stereo, "stereo mode changed");
                self.events.post(DprxEvent::StereoTypeChange);
            }
        }
        if ml.consume(MainLinkFlags::PPS_CHANGE) {
            lock(&self.video).pps_changed = true;
            self.events.post(DprxEvent::PpsChange);
        }
        if ml.consume(MainLinkFlags::DSC_CHANGE) {
            let dsc = bus.test_bits(VIDEO_STATUS, VIDEO_STATUS_DSC);
            lock(&self.video).dsc_enabled = dsc;
            tracing::debug!(dsc, "DSC state changed");
            self.events.post(DprxEvent::DscChange);
        }
        if ml.is_video_mute() {
            self.mute.video_mute(bus, ml, &self.events);
        }
        if ml.consume(MainLinkFlags::VIDEO_UNMUTE) {
            self.mute.video_unmute(bus);
        }
        if ml.consume(MainLinkFlags::VIDEO_ON) {
            self.events.post(DprxEvent::VideoOn);
        }
        if ml.consume(MainLinkFlags::SPD_INFO_CHANGE) {
            self.events.post(DprxEvent::SpdInfoChange);
        }
        if ml.consume(MainLinkFlags::HDR_INFO_CHANGE) {
            self.events.post(DprxEvent::HdrInfoChange);
        }
        if ml.consume(MainLinkFlags::AUDIO_INFO_CHANGE) {
            self.events.post(DprxEvent::AudioInfoChange);
        }
    }

    fn capture_msa(&self) {
        let bus = &*self.bus;
        let msa = read_timing(bus, MSA_TIMING);
        let output = read_timing(bus, OUTPUT_TIMING);
        let color = read_color(bus);
        {
            let mut video = lock(&self.video);
            video.msa = msa;
            video.output = output;
            video.color = color;
        }

        match configure_video_pll(bus) {
            Ok(params) => *lock(&self.video_pll) = Some(params),
            Err(error) => tracing::warn!(%error, "video PLL left unconfigured"),
        }
    }

    fn handle_audio(&self) {
        let bus = &*self.bus;
        let audio = &self.latches.audio;

        if audio.consume(AudioFlags::MN_CHANGE) {
            match self.deferred_tx.try_send(DeferredTask::ConfigureAudioPll) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("audio PLL recompute already pending");
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::warn!("deferred context gone, audio M/N change dropped");
                }
            }
        }
        for (flag, cause) in AUDIO_MUTE_TRIGGERS {
            if audio.consume(flag) {
                self.mute.audio_mute(bus, &self.audio_mask, &self.events, cause);
            }
        }
        if audio.consume(AudioFlags::UNMUTE) {
            self.mute.audio_unmute(bus, &self.audio_mask, &self.events);
        }
    }

    /// Runs one deferred task. Returns `false` when the deferred context should exit.
    pub(crate) fn run_task(&self, task: DeferredTask) -> bool {
        match task {
            DeferredTask::ConfigureAudioPll => {
                let cfg = AudioClockConfig::from(&self.cfg);
                match configure_audio_pll(&*self.bus, &*self.delay, &self.audio_mask, &cfg) {
                    Ok(params) => {
                        *lock(&self.audio_pll) = Some(params);
                        self.events.post(DprxEvent::AudioMnChange);
                        self.worker_signal.notify();
                    }
                    Err(error) => tracing::warn!(%error, "audio PLL left unconfigured"),
                }
                true
            }
            DeferredTask::Shutdown => false,
        }
    }

    pub(crate) fn run_deferred(&self) -> usize {
        let rx = lock(&self.deferred_rx);
        let Some(rx) = rx.as_ref() else {
            return 0;
        };
        let mut ran = 0;
        while let Ok(task) = rx.try_recv() {
            if task == DeferredTask::ConfigureAudioPll {
                self.run_task(task);
                ran += 1;
            }
        }
        ran
    }
}
