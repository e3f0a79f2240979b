//! Edge-triggered latches over the interrupt-status registers.
//!
//! Each category packs its status registers into one 32-bit word (register `i` occupies bits
//! `8*i..8*i+8`). A merge ORs freshly read bits into the latch and acknowledges them in
//! hardware; bits only leave the latch through an explicit clear.

use std::sync::atomic::{AtomicU32, Ordering};

use dprx_regs::bus::read_u8;
use dprx_regs::map::*;
use dprx_regs::RegisterBus;

macro_rules! event_latch {
    (
        $(#[$meta:meta])*
        pub struct $latch:ident($flags:ident) {
            regs: [$($reg:expr),+ $(,)?],
            hold: $hold:expr,
        }
        $(
            $(#[$($fmeta:tt)*])*
            $name:ident = $bit:expr => $is:ident, $clear:ident;
        )+
    ) => {
        bitflags::bitflags! {
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $flags: u32 {
                $(
                    $(#[$($fmeta)*])*
                    const $name = $bit;
                )+
            }
        }

        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $latch {
            bits: AtomicU32,
        }

        impl $latch {
            /// Status registers in packing order.
            pub const STATUS_REGS: &'static [u32] = &[$($reg),+];
            /// Bits that are latched but not acknowledged by a merge.
            pub const HOLD_BACK: $flags = $hold;

            pub const fn new() -> Self {
                Self {
                    bits: AtomicU32::new(0),
                }
            }

            /// ORs `fresh` into the latch and returns the union.
            pub fn merge(&self, fresh: $flags) -> $flags {
                let prev = self.bits.fetch_or(fresh.bits(), Ordering::AcqRel);
                $flags::from_bits_retain(prev | fresh.bits())
            }

            /// Reads every status register of the category, latches the result and writes the
            /// union back (write-1-to-clear), except for [`Self::HOLD_BACK`].
            pub fn merge_and_latch(&self, bus: &dyn RegisterBus) -> $flags {
                let mut raw = 0u32;
                for (i, &reg) in Self::STATUS_REGS.iter().enumerate() {
                    raw |= u32::from(read_u8(bus, reg)) << (8 * i);
                }
                let union = self.merge($flags::from_bits_truncate(raw));

                let ack = union.difference(Self::HOLD_BACK).bits();
                for (i, &reg) in Self::STATUS_REGS.iter().enumerate() {
                    let byte = (ack >> (8 * i)) & 0xFF;
                    if byte != 0 {
                        bus.write(reg, byte);
                    }
                }
                union
            }

            pub fn snapshot(&self) -> $flags {
                $flags::from_bits_retain(self.bits.load(Ordering::Acquire))
            }

            /// Clears `flags`; returns whether any of them was set.
            pub fn consume(&self, flags: $flags) -> bool {
                self.bits.fetch_and(!flags.bits(), Ordering::AcqRel) & flags.bits() != 0
            }

            pub fn reset(&self) {
                self.bits.store(0, Ordering::Release);
            }

            /// Link bring-up: acknowledges any held-back bits still pending in hardware and
            /// empties the latch.
            pub fn discard(&self, bus: &dyn RegisterBus) {
                let held = Self::HOLD_BACK.bits();
                for (i, &reg) in Self::STATUS_REGS.iter().enumerate() {
                    let byte = (held >> (8 * i)) & 0xFF;
                    if byte != 0 {
                        bus.write(reg, byte);
                    }
                }
                self.reset();
            }

            $(
                pub fn $is(&self) -> bool {
                    self.snapshot().contains($flags::$name)
                }

                pub fn $clear(&self) {
                    self.bits.fetch_and(!$flags::$name.bits(), Ordering::AcqRel);
                }
            )+
        }
    };
}

event_latch! {
    /// Main-link video/stream events.
    pub struct MainLinkLatch(MainLinkFlags) {
        regs: [ML_INT_STS0, ML_INT_STS1],
        hold: MainLinkFlags::VIDEO_MUTE,
    }
    MSA_UPDATE = ML_MSA_UPDATE => is_msa_update, clear_msa_update;
    /// Acknowledged in hardware by its consumer, never by a merge.
    VIDEO_MUTE = ML_VIDEO_MUTE => is_video_mute, clear_video_mute;
    VIDEO_UNMUTE = ML_VIDEO_UNMUTE => is_video_unmute, clear_video_unmute;
    VIDEO_ON = ML_VIDEO_ON => is_video_on, clear_video_on;
    VSC_UPDATE = ML_VSC_UPDATE => is_vsc_update, clear_vsc_update;
    PPS_CHANGE = ML_PPS_CHANGE => is_pps_change, clear_pps_change;
    DSC_CHANGE = ML_DSC_CHANGE => is_dsc_change, clear_dsc_change;
    BW_CHANGE = ML_BW_CHANGE => is_bw_change, clear_bw_change;
    SPD_INFO_CHANGE = ML_SPD_INFO_CHANGE << 8 => is_spd_info_change, clear_spd_info_change;
    HDR_INFO_CHANGE = ML_HDR_INFO_CHANGE << 8 => is_hdr_info_change, clear_hdr_info_change;
    AUDIO_INFO_CHANGE = ML_AUDIO_INFO_CHANGE << 8 => is_audio_info_change, clear_audio_info_change;
}

event_latch! {
    /// DPCD-side link events.
    pub struct DpcdLatch(DpcdFlags) {
        regs: [DPCD_INT_STS0],
        hold: DpcdFlags::empty(),
    }
    LINK_ERROR = DPCD_LINK_ERROR => is_link_error, clear_link_error;
    TRAINING_DONE = DPCD_TRAINING_DONE => is_training_done, clear_training_done;
    POWER_STATE = DPCD_POWER_STATE => is_power_state, clear_power_state;
    HDCP_STATE = DPCD_HDCP_STATE => is_hdcp_state, clear_hdcp_state;
}

event_latch! {
    /// Audio stream events.
    pub struct AudioLatch(AudioFlags) {
        regs: [AUD_INT_STS0],
        hold: AudioFlags::empty(),
    }
    MN_CHANGE = AUD_MN_CHANGE => is_mn_change, clear_mn_change;
    CH_STATUS_CHANGE = AUD_CH_STATUS_CHANGE => is_ch_status_change, clear_ch_status_change;
    VBID_MUTE = AUD_VBID_MUTE => is_vbid_mute, clear_vbid_mute;
    FIFO_UNDERFLOW = AUD_FIFO_UNDERFLOW => is_fifo_underflow, clear_fifo_underflow;
    FIFO_OVERFLOW = AUD_FIFO_OVERFLOW => is_fifo_overflow, clear_fifo_overflow;
    LINK_ERROR = AUD_LINK_ERROR => is_link_error, clear_link_error;
    RS_DECODE_ERROR = AUD_RS_DECODE_ERROR => is_rs_decode_error, clear_rs_decode_error;
    UNMUTE = AUD_UNMUTE => is_unmute, clear_unmute;
}

event_latch! {
    /// Cable/IP-level events.
    pub struct DpIpLatch(DpIpFlags) {
        regs: [DPIP_INT_STS0],
        hold: DpIpFlags::empty(),
    }
    PLUG_IN = DPIP_PLUG_IN => is_plug_in, clear_plug_in;
    UNPLUG = DPIP_UNPLUG => is_unplug, clear_unplug;
}

#[derive(Debug, Default)]
pub struct EventLatches {
    pub main_link: MainLinkLatch,
    pub dpcd: DpcdLatch,
    pub audio: AudioLatch,
    pub dp_ip: DpIpLatch,
}

impl EventLatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link bring-up: forget everything latched so far.
    pub fn reset_all(&self, bus: &dyn RegisterBus) {
        self.main_link.discard(bus);
        self.dpcd.discard(bus);
        self.audio.discard(bus);
        self.dp_ip.discard(bus);
    }
}
