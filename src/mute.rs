//! Software mute sequencing for the video and audio outputs.

use std::sync::atomic::{AtomicBool, Ordering};

use dprx_regs::map::*;
use dprx_regs::{MaskRegister, RegisterBus};

use crate::event::{CallbackStatusSet, DprxEvent};
use crate::latch::MainLinkLatch;

/// Conditions that force the audio output into software mute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMuteCause {
    ChannelStatusChange,
    VbidMute,
    FifoUnderflow,
    FifoOverflow,
    LinkError,
    RsDecodeError,
}

#[derive(Debug, Default)]
pub struct MuteSequencer {
    audio_muted: AtomicBool,
}

impl MuteSequencer {
    pub const fn new() -> Self {
        Self {
            audio_muted: AtomicBool::new(false),
        }
    }

    pub fn is_audio_muted(&self) -> bool {
        self.audio_muted.load(Ordering::Acquire)
    }

    /// Forgets the audio mute state; hardware is left untouched.
    pub fn reset(&self) {
        self.audio_muted.store(false, Ordering::Release);
    }

    /// Asserts video mute and acknowledges the held-back mute status bit.
    pub fn video_mute(
        &self,
        bus: &dyn RegisterBus,
        latch: &MainLinkLatch,
        events: &CallbackStatusSet,
    ) {
        bus.set_bits(VIDEO_MUTE_CTRL, VIDEO_SW_MUTE);
        bus.write(ML_INT_STS0, ML_VIDEO_MUTE);
        latch.clear_video_mute();
        events.post(DprxEvent::VideoMute);
        tracing::debug!("video muted");
    }

    pub fn video_unmute(&self, bus: &dyn RegisterBus) {
        bus.clear_bits(VIDEO_MUTE_CTRL, VIDEO_SW_MUTE);
        tracing::debug!("video unmuted");
    }

    /// Asserts audio mute. Returns `true` on the transition into muted.
    pub fn audio_mute(
        &self,
        bus: &dyn RegisterBus,
        mask: &MaskRegister,
        events: &CallbackStatusSet,
        cause: AudioMuteCause,
    ) -> bool {
        bus.set_bits(AUD_MUTE_CTRL, AUD_SW_MUTE);
        if cause == AudioMuteCause::FifoOverflow {
            events.post(DprxEvent::AudioOverflow);
        }

        if self
            .audio_muted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        events.post(DprxEvent::AudioMute);
        mask.mask(bus, AUD_CH_STATUS_FAMILY);
        // Restart the mute-timeout counter from zero.
        bus.clear_bits(AUD_MUTE_TIMEOUT, AUD_MUTE_TIMEOUT_EN);
        bus.set_bits(AUD_MUTE_TIMEOUT, AUD_MUTE_TIMEOUT_EN);
        tracing::debug!(?cause, "audio muted");
        true
    }

    /// Deasserts audio mute. Returns `true` on the transition into unmuted.
    pub fn audio_unmute(
        &self,
        bus: &dyn RegisterBus,
        mask: &MaskRegister,
        events: &CallbackStatusSet,
    ) -> bool {
        bus.clear_bits(AUD_MUTE_CTRL, AUD_SW_MUTE);
        if self
            .audio_muted
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        events.post(DprxEvent::AudioUnmute);
        mask.unmask(bus, AUD_CH_STATUS_FAMILY);
        tracing::debug!("audio unmuted");
        true
    }
}
