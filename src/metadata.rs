//! Stream metadata capture: MSA/output timing, colorimetry, stereo mode and info frames.

use dprx_regs::bus::{read_block, read_u16, read_u8};
use dprx_regs::map::*;
use dprx_regs::RegisterBus;

use crate::error::{DprxError, Result};
use crate::status::{
    ColorDepth, ColorFormat, ColorInfo, DynamicRange, HdcpStatus, LinkStatus, PowerState,
    Stereo3d, SyncPolarity, Timing, YuvMatrix,
};

fn read_field(bus: &dyn RegisterBus, block: TimingBlock, field: u32) -> u16 {
    read_u16(bus, block.lo(field), block.hi(field))
}

fn polarity(raw: u16) -> SyncPolarity {
    if raw & SYNC_POLARITY_NEGATIVE != 0 {
        SyncPolarity::Negative
    } else {
        SyncPolarity::Positive
    }
}

pub fn read_timing(bus: &dyn RegisterBus, block: TimingBlock) -> Timing {
    let h_total = read_field(bus, block, TimingBlock::H_TOTAL);
    let v_total = read_field(bus, block, TimingBlock::V_TOTAL);
    let h_start = read_field(bus, block, TimingBlock::H_START);
    let v_start = read_field(bus, block, TimingBlock::V_START);
    let hsw = read_field(bus, block, TimingBlock::H_SYNC_WIDTH);
    let vsw = read_field(bus, block, TimingBlock::V_SYNC_WIDTH);
    let h_active = read_field(bus, block, TimingBlock::H_ACTIVE);
    let v_active = read_field(bus, block, TimingBlock::V_ACTIVE);

    let h_sync_width = hsw & SYNC_WIDTH_MASK;
    let v_sync_width = vsw & SYNC_WIDTH_MASK;

    // Start is measured from the leading edge of sync.
    Timing {
        h_total,
        v_total,
        h_active,
        v_active,
        h_sync_width,
        v_sync_width,
        h_polarity: polarity(hsw),
        v_polarity: polarity(vsw),
        h_back_porch: h_start.saturating_sub(h_sync_width),
        v_back_porch: v_start.saturating_sub(v_sync_width),
        h_front_porch: h_total.saturating_sub(h_active).saturating_sub(h_start),
        v_front_porch: v_total.saturating_sub(v_active).saturating_sub(v_start),
    }
}

/// Colorimetry from MSA MISC0.
pub fn color_from_misc0(misc0: u8) -> ColorInfo {
    let misc0 = u32::from(misc0);
    let format = match (misc0 & MISC0_FORMAT_MASK) >> MISC0_FORMAT_SHIFT {
        0b01 => ColorFormat::Yuv422,
        0b10 => ColorFormat::Yuv444,
        _ => ColorFormat::Rgb,
    };
    let depth = match (misc0 & MISC0_BPC_MASK) >> MISC0_BPC_SHIFT {
        0b000 => ColorDepth::Bpc6,
        0b010 => ColorDepth::Bpc10,
        0b011 => ColorDepth::Bpc12,
        0b100 => ColorDepth::Bpc16,
        _ => ColorDepth::Bpc8,
    };
    let yuv_matrix = if misc0 & MISC0_YCC_BT709 != 0 {
        YuvMatrix::Bt709
    } else {
        YuvMatrix::Bt601
    };
    let dynamic_range = if misc0 & MISC0_CTA_RANGE != 0 {
        DynamicRange::CtaLimited
    } else {
        DynamicRange::VesaFull
    };
    ColorInfo {
        format,
        depth,
        yuv_matrix,
        dynamic_range,
    }
}

/// Colorimetry from VSC SDP DB16/DB17.
pub fn color_from_vsc(db16: u8, db17: u8) -> ColorInfo {
    let format = match db16 >> 4 {
        1 => ColorFormat::Yuv444,
        2 => ColorFormat::Yuv422,
        3 => ColorFormat::Yuv420,
        4 => ColorFormat::YOnly,
        5 => ColorFormat::Raw,
        _ => ColorFormat::Rgb,
    };
    let yuv_matrix = match db16 & 0x0F {
        1 => YuvMatrix::Bt709,
        2 => YuvMatrix::XvYcc601,
        3 => YuvMatrix::XvYcc709,
        4 => YuvMatrix::SYcc601,
        5 => YuvMatrix::OpYcc601,
        6 => YuvMatrix::Bt2020ConstantLuminance,
        7 => YuvMatrix::Bt2020,
        _ => YuvMatrix::Bt601,
    };
    // RGB/RAW use code 0 for 6 bpc; YCbCr has no 6 bpc encoding.
    let depth = match (format, db17 & 0x07) {
        (ColorFormat::Rgb | ColorFormat::Raw, 0) => ColorDepth::Bpc6,
        (_, 2) => ColorDepth::Bpc10,
        (_, 3) => ColorDepth::Bpc12,
        (_, 4) => ColorDepth::Bpc16,
        _ => ColorDepth::Bpc8,
    };
    let dynamic_range = if db17 & 0x80 != 0 {
        DynamicRange::CtaLimited
    } else {
        DynamicRange::VesaFull
    };
    ColorInfo {
        format,
        depth,
        yuv_matrix,
        dynamic_range,
    }
}

pub fn stereo_from_vsc(db0: u8) -> Stereo3d {
    match db0 {
        0 => Stereo3d::None,
        1 => Stereo3d::FrameSequential,
        2 => Stereo3d::Stacked,
        3 => Stereo3d::PixelInterleaved,
        4 => Stereo3d::SideBySide,
        other => Stereo3d::Reserved(other),
    }
}

/// Current colorimetry, honouring the MISC1 "use VSC SDP" override.
pub fn read_color(bus: &dyn RegisterBus) -> ColorInfo {
    let misc1 = bus.read(MSA_MISC1);
    if misc1 & MISC1_USE_VSC_SDP != 0 {
        color_from_vsc(read_u8(bus, VSC_DB16), read_u8(bus, VSC_DB17))
    } else {
        color_from_misc0(read_u8(bus, MSA_MISC0))
    }
}

pub fn read_stereo(bus: &dyn RegisterBus) -> Stereo3d {
    stereo_from_vsc(read_u8(bus, VSC_DB0))
}

pub fn read_link_status(bus: &dyn RegisterBus) -> LinkStatus {
    let hdcp_raw = bus.read(HDCP_STATUS);
    let hdcp = if hdcp_raw & HDCP_STATUS_2X_AUTH != 0 {
        HdcpStatus::Hdcp2xAuthenticated
    } else if hdcp_raw & HDCP_STATUS_1X_AUTH != 0 {
        HdcpStatus::Hdcp1xAuthenticated
    } else {
        HdcpStatus::None
    };
    let power = if bus.test_bits(POWER_STATE, POWER_STATE_D3) {
        PowerState::D3
    } else {
        PowerState::D0
    };
    LinkStatus {
        hdcp,
        training_done: bus.test_bits(LINK_STATUS, LINK_STATUS_TRAINING_DONE),
        power,
        lane_count: read_u8(bus, LANE_COUNT),
        link_rate: read_u8(bus, LINK_RATE),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoFrameKind {
    Spd,
    Hdr,
    Audio,
}

impl InfoFrameKind {
    pub fn base(self) -> u32 {
        match self {
            InfoFrameKind::Spd => INFOFRAME_SPD,
            InfoFrameKind::Hdr => INFOFRAME_HDR,
            InfoFrameKind::Audio => INFOFRAME_AUDIO,
        }
    }

    pub fn size(self) -> usize {
        match self {
            InfoFrameKind::Spd => INFOFRAME_SPD_LEN,
            InfoFrameKind::Hdr => INFOFRAME_HDR_LEN,
            InfoFrameKind::Audio => INFOFRAME_AUDIO_LEN,
        }
    }
}

/// Copies the latest `kind` packet into the front of `buf` and returns its length.
pub fn read_info_frame(bus: &dyn RegisterBus, kind: InfoFrameKind, buf: &mut [u8]) -> Result<usize> {
    let len = kind.size();
    if buf.len() < len {
        return Err(DprxError::InvalidArgument("info frame buffer too small"));
    }
    read_block(bus, kind.base(), &mut buf[..len]);
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dprx_regs::MockRegisters;

    fn poke_u16(regs: &MockRegisters, block: TimingBlock, field: u32, value: u16) {
        regs.poke(block.lo(field), u32::from(value & 0xFF));
        regs.poke(block.hi(field), u32::from(value >> 8));
    }

    #[test]
    fn timing_porches_derive_from_start_and_sync() {
        let regs = MockRegisters::new();
        // CEA 1080p60: 2200x1125, hsync 44 (+), vsync 5 (+), start = sync + back porch.
        poke_u16(&regs, MSA_TIMING, TimingBlock::H_TOTAL, 2200);
        poke_u16(&regs, MSA_TIMING, TimingBlock::V_TOTAL, 1125);
        poke_u16(&regs, MSA_TIMING, TimingBlock::H_ACTIVE, 1920);
        poke_u16(&regs, MSA_TIMING, TimingBlock::V_ACTIVE, 1080);
        poke_u16(&regs, MSA_TIMING, TimingBlock::H_START, 44 + 148);
        poke_u16(&regs, MSA_TIMING, TimingBlock::V_START, 5 + 36);
        poke_u16(&regs, MSA_TIMING, TimingBlock::H_SYNC_WIDTH, 44);
        poke_u16(&regs, MSA_TIMING, TimingBlock::V_SYNC_WIDTH, 5 | SYNC_POLARITY_NEGATIVE);

        let t = read_timing(&regs, MSA_TIMING);
        assert_eq!((t.h_total, t.v_total, t.h_active, t.v_active), (2200, 1125, 1920, 1080));
        assert_eq!((t.h_sync_width, t.v_sync_width), (44, 5));
        assert_eq!((t.h_back_porch, t.h_front_porch), (148, 88));
        assert_eq!((t.v_back_porch, t.v_front_porch), (36, 4));
        assert_eq!(t.h_polarity, SyncPolarity::Positive);
        assert_eq!(t.v_polarity, SyncPolarity::Negative);
    }

    #[test]
    fn misc0_decodes_ycbcr422_10bpc_bt709() {
        let misc0 = (0b01 << 1) | (1 << 3) | (1 << 4) | (0b010 << 5);
        let c = color_from_misc0(misc0);
        assert_eq!(c.format, ColorFormat::Yuv422);
        assert_eq!(c.depth, ColorDepth::Bpc10);
        assert_eq!(c.yuv_matrix, YuvMatrix::Bt709);
        assert_eq!(c.dynamic_range, DynamicRange::CtaLimited);
    }

    #[test]
    fn vsc_overrides_misc_when_requested() {
        let regs = MockRegisters::new();
        regs.poke(MSA_MISC0, 0b001 << 5);
        regs.poke(VSC_DB16, (3 << 4) | 7);
        regs.poke(VSC_DB17, 3);

        assert_eq!(read_color(&regs).format, ColorFormat::Rgb);

        regs.poke(MSA_MISC1, MISC1_USE_VSC_SDP);
        let c = read_color(&regs);
        assert_eq!(c.format, ColorFormat::Yuv420);
        assert_eq!(c.yuv_matrix, YuvMatrix::Bt2020);
        assert_eq!(c.depth, ColorDepth::Bpc12);
        assert_eq!(c.depth.bits_per_component(), 12);
    }

    #[test]
    fn vsc_depth_zero_is_6bpc_only_for_rgb() {
        assert_eq!(color_from_vsc(0x00, 0).depth, ColorDepth::Bpc6);
        assert_eq!(color_from_vsc(0x10, 0).depth, ColorDepth::Bpc8);
    }

    #[test]
    fn stereo_codes() {
        assert_eq!(stereo_from_vsc(0), Stereo3d::None);
        assert_eq!(stereo_from_vsc(4), Stereo3d::SideBySide);
        assert_eq!(stereo_from_vsc(9), Stereo3d::Reserved(9));
    }

    #[test]
    fn info_frame_rejects_short_buffer_without_reading() {
        let regs = MockRegisters::new();
        let mut short = [0u8; 4];
        assert_eq!(
            read_info_frame(&regs, InfoFrameKind::Hdr, &mut short),
            Err(DprxError::InvalidArgument("info frame buffer too small"))
        );
        assert_eq!(regs.read_count(INFOFRAME_HDR), 0);

        regs.poke(INFOFRAME_AUDIO, 0x84);
        regs.poke(INFOFRAME_AUDIO + REG_STRIDE, 0x01);
        let mut buf = [0xAAu8; 64];
        assert_eq!(read_info_frame(&regs, InfoFrameKind::Audio, &mut buf), Ok(16));
        assert_eq!(&buf[..3], &[0x84, 0x01, 0x00]);
        assert_eq!(buf[16], 0xAA);
    }

    #[test]
    fn link_status_prefers_hdcp2() {
        let regs = MockRegisters::new();
        regs.poke(HDCP_STATUS, HDCP_STATUS_1X_AUTH | HDCP_STATUS_2X_AUTH);
        regs.poke(LINK_STATUS, LINK_STATUS_TRAINING_DONE);
        regs.poke(LANE_COUNT, 4);
        regs.poke(LINK_RATE, LINK_RATE_HBR2);
        let s = read_link_status(&regs);
        assert_eq!(s.hdcp, HdcpStatus::Hdcp2xAuthenticated);
        assert!(s.training_done);
        assert_eq!(s.power, PowerState::D0);
        assert_eq!((s.lane_count, s.link_rate), (4, 0x14));
    }
}
