//! Register layout and bit definitions of the DPRX core.
//!
//! Interrupt-status registers are write-1-to-clear. Interrupt-mask registers mask a source when
//! its bit is set.

pub const REG_STRIDE: u32 = 4;

// Interrupt status, one byte per register.
pub const ML_INT_STS0: u32 = 0x100;
pub const ML_INT_STS1: u32 = 0x104;
pub const DPCD_INT_STS0: u32 = 0x110;
pub const AUD_INT_STS0: u32 = 0x120;
pub const DPIP_INT_STS0: u32 = 0x130;

pub const AUD_INT_MASK0: u32 = 0x1A0;

// ML_INT_STS0
pub const ML_MSA_UPDATE: u32 = 1 << 0;
pub const ML_VIDEO_MUTE: u32 = 1 << 1;
pub const ML_VIDEO_UNMUTE: u32 = 1 << 2;
pub const ML_VIDEO_ON: u32 = 1 << 3;
pub const ML_VSC_UPDATE: u32 = 1 << 4;
pub const ML_PPS_CHANGE: u32 = 1 << 5;
pub const ML_DSC_CHANGE: u32 = 1 << 6;
pub const ML_BW_CHANGE: u32 = 1 << 7;
// ML_INT_STS1
pub const ML_SPD_INFO_CHANGE: u32 = 1 << 0;
pub const ML_HDR_INFO_CHANGE: u32 = 1 << 1;
pub const ML_AUDIO_INFO_CHANGE: u32 = 1 << 2;

// DPCD_INT_STS0
pub const DPCD_LINK_ERROR: u32 = 1 << 0;
pub const DPCD_TRAINING_DONE: u32 = 1 << 1;
pub const DPCD_POWER_STATE: u32 = 1 << 2;
pub const DPCD_HDCP_STATE: u32 = 1 << 3;

// AUD_INT_STS0
pub const AUD_MN_CHANGE: u32 = 1 << 0;
pub const AUD_CH_STATUS_CHANGE: u32 = 1 << 1;
pub const AUD_VBID_MUTE: u32 = 1 << 2;
pub const AUD_FIFO_UNDERFLOW: u32 = 1 << 3;
pub const AUD_FIFO_OVERFLOW: u32 = 1 << 4;
pub const AUD_LINK_ERROR: u32 = 1 << 5;
pub const AUD_RS_DECODE_ERROR: u32 = 1 << 6;
pub const AUD_UNMUTE: u32 = 1 << 7;

/// Interrupt sources left masked while audio is muted. FIFO overflow stays unmasked so a
/// persistent overflow keeps reaching the recovery streak.
pub const AUD_CH_STATUS_FAMILY: u32 = AUD_CH_STATUS_CHANGE
    | AUD_VBID_MUTE
    | AUD_FIFO_UNDERFLOW
    | AUD_LINK_ERROR
    | AUD_RS_DECODE_ERROR;

// DPIP_INT_STS0
pub const DPIP_PLUG_IN: u32 = 1 << 0;
pub const DPIP_UNPLUG: u32 = 1 << 1;

// Link state.
pub const LINK_RATE: u32 = 0x200;
pub const LANE_COUNT: u32 = 0x204;
pub const VBID: u32 = 0x208;
pub const VBID_AUDIO_MUTE: u32 = 1 << 4;
pub const LINK_STATUS: u32 = 0x20C;
pub const LINK_STATUS_TRAINING_DONE: u32 = 1 << 0;
pub const POWER_STATE: u32 = 0x210;
pub const POWER_STATE_D3: u32 = 1 << 0;
pub const HDCP_STATUS: u32 = 0x214;
pub const HDCP_STATUS_1X_AUTH: u32 = 1 << 0;
pub const HDCP_STATUS_2X_AUTH: u32 = 1 << 1;
pub const VIDEO_STATUS: u32 = 0x218;
pub const VIDEO_STATUS_STABLE: u32 = 1 << 0;
pub const VIDEO_STATUS_DSC: u32 = 1 << 1;
pub const HPD_CTRL: u32 = 0x21C;
pub const HPD_ASSERT: u32 = 1 << 0;
pub const CORE_CTRL: u32 = 0x220;
pub const CORE_ENABLE: u32 = 1 << 0;
pub const CORE_POWER_ON: u32 = 1 << 1;

// Link symbol rate codes (DPCD encoding).
pub const LINK_RATE_RBR: u32 = 0x06;
pub const LINK_RATE_HBR: u32 = 0x0A;
pub const LINK_RATE_HBR2: u32 = 0x14;
pub const LINK_RATE_HBR3: u32 = 0x1E;

// Video M/N as received, high byte first.
pub const MVID: [u32; 3] = [0x300, 0x304, 0x308];
pub const NVID: [u32; 3] = [0x30C, 0x310, 0x314];

// Video PLL programming, low byte first.
pub const VPLL_M: [u32; 3] = [0x320, 0x324, 0x328];
pub const VPLL_N: [u32; 3] = [0x32C, 0x330, 0x334];
pub const VPLL_POSDIV: u32 = 0x338;
pub const VPLL_CTRL: u32 = 0x33C;
pub const VPLL_MN_READY: u32 = 1 << 0;
pub const VPLL_ENABLE: u32 = 1 << 1;

/// Layout of a timing block; each 16-bit field is a low/high register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingBlock {
    pub base: u32,
}

impl TimingBlock {
    pub const H_TOTAL: u32 = 0x00;
    pub const V_TOTAL: u32 = 0x08;
    pub const H_START: u32 = 0x10;
    pub const V_START: u32 = 0x18;
    /// Bit 15 of the sync-width fields carries the sync polarity (1 = negative).
    pub const H_SYNC_WIDTH: u32 = 0x20;
    pub const V_SYNC_WIDTH: u32 = 0x28;
    pub const H_ACTIVE: u32 = 0x30;
    pub const V_ACTIVE: u32 = 0x38;

    pub const fn lo(self, field: u32) -> u32 {
        self.base + field
    }

    pub const fn hi(self, field: u32) -> u32 {
        self.base + field + REG_STRIDE
    }
}

pub const SYNC_POLARITY_NEGATIVE: u16 = 1 << 15;
pub const SYNC_WIDTH_MASK: u16 = 0x7FFF;

pub const MSA_TIMING: TimingBlock = TimingBlock { base: 0x400 };
pub const MSA_MISC0: u32 = 0x440;
pub const MSA_MISC1: u32 = 0x444;
pub const OUTPUT_TIMING: TimingBlock = TimingBlock { base: 0x480 };

// MISC0/MISC1 (DisplayPort MSA).
pub const MISC0_FORMAT_SHIFT: u32 = 1;
pub const MISC0_FORMAT_MASK: u32 = 0b11 << MISC0_FORMAT_SHIFT;
pub const MISC0_CTA_RANGE: u32 = 1 << 3;
pub const MISC0_YCC_BT709: u32 = 1 << 4;
pub const MISC0_BPC_SHIFT: u32 = 5;
pub const MISC0_BPC_MASK: u32 = 0b111 << MISC0_BPC_SHIFT;
pub const MISC1_USE_VSC_SDP: u32 = 1 << 6;

// VSC SDP payload bytes.
pub const VSC_DB0: u32 = 0x500;
pub const VSC_DB16: u32 = 0x504;
pub const VSC_DB17: u32 = 0x508;

// Info frame packet buffers (header bytes followed by payload).
pub const INFOFRAME_SPD: u32 = 0x600;
pub const INFOFRAME_SPD_LEN: usize = 32;
pub const INFOFRAME_HDR: u32 = 0x680;
pub const INFOFRAME_HDR_LEN: usize = 32;
pub const INFOFRAME_AUDIO: u32 = 0x700;
pub const INFOFRAME_AUDIO_LEN: usize = 16;

// Audio M/N as received (debug view), high byte first.
pub const AUD_DBG_M: [u32; 3] = [0x800, 0x804, 0x808];
pub const AUD_DBG_N: [u32; 3] = [0x80C, 0x810, 0x814];

// Audio PLL programming, low byte first.
pub const AUD_M_FIXED: [u32; 3] = [0x820, 0x824, 0x828];
pub const AUD_N_FIXED: [u32; 3] = [0x82C, 0x830, 0x834];
pub const AUD_MN_CTRL: u32 = 0x838;
pub const AUD_MN_N_SELECT: u32 = 1 << 0;
pub const AUD_CLK_SEL: u32 = 0x83C;
pub const AUD_CLK_SEL_MASK: u32 = 0x7;
/// Reset lines; a set bit releases the block from reset.
pub const AUD_RESET: u32 = 0x840;
pub const AUD_RESET_MN_ADJUST: u32 = 1 << 0;
pub const AUD_RESET_PLL: u32 = 1 << 1;
pub const AUD_PLL_CTRL: u32 = 0x844;
pub const AUD_PLL_ENABLE: u32 = 1 << 0;
pub const AUD_PLL_AUTO_RESET: u32 = 1 << 1;
pub const AUD_ACR_CTRL: u32 = 0x848;
pub const AUD_MUTE_CTRL: u32 = 0x84C;
pub const AUD_SW_MUTE: u32 = 1 << 0;
pub const AUD_MUTE_TIMEOUT: u32 = 0x850;
pub const AUD_MUTE_TIMEOUT_EN: u32 = 1 << 0;

pub const VIDEO_MUTE_CTRL: u32 = 0x900;
pub const VIDEO_SW_MUTE: u32 = 1 << 0;

/// All interrupt-status registers, for models that implement write-1-to-clear.
pub const INT_STATUS_REGS: [u32; 5] = [
    ML_INT_STS0,
    ML_INT_STS1,
    DPCD_INT_STS0,
    AUD_INT_STS0,
    DPIP_INT_STS0,
];
