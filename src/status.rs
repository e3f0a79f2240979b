//! Video/link status records returned by the query API.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolarity {
    #[default]
    Positive,
    Negative,
}

/// One direction of a video timing, in pixels or lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    pub h_total: u16,
    pub v_total: u16,
    pub h_active: u16,
    pub v_active: u16,
    pub h_sync_width: u16,
    pub v_sync_width: u16,
    pub h_polarity: SyncPolarity,
    pub v_polarity: SyncPolarity,
    pub h_front_porch: u16,
    pub h_back_porch: u16,
    pub v_front_porch: u16,
    pub v_back_porch: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgb,
    Yuv444,
    Yuv422,
    Yuv420,
    YOnly,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorDepth {
    Bpc6,
    #[default]
    Bpc8,
    Bpc10,
    Bpc12,
    Bpc16,
}

impl ColorDepth {
    pub fn bits_per_component(self) -> u8 {
        match self {
            ColorDepth::Bpc6 => 6,
            ColorDepth::Bpc8 => 8,
            ColorDepth::Bpc10 => 10,
            ColorDepth::Bpc12 => 12,
            ColorDepth::Bpc16 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YuvMatrix {
    #[default]
    Bt601,
    Bt709,
    XvYcc601,
    XvYcc709,
    SYcc601,
    OpYcc601,
    Bt2020ConstantLuminance,
    Bt2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicRange {
    #[default]
    VesaFull,
    CtaLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stereo3d {
    #[default]
    None,
    FrameSequential,
    Stacked,
    PixelInterleaved,
    SideBySide,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorInfo {
    pub format: ColorFormat,
    pub depth: ColorDepth,
    pub yuv_matrix: YuvMatrix,
    pub dynamic_range: DynamicRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoStatus {
    /// Timing carried in the main stream attributes.
    pub msa: Timing,
    /// Timing regenerated by the receiver's output path.
    pub output: Timing,
    pub color: ColorInfo,
    pub dsc_enabled: bool,
    pub stereo: Stereo3d,
    /// Classified frame rate in Hz, 0 until one has been measured.
    pub frame_rate: u32,
    pub pps_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HdcpStatus {
    #[default]
    None,
    Hdcp1xAuthenticated,
    Hdcp2xAuthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    D0,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub hdcp: HdcpStatus,
    pub training_done: bool,
    pub power: PowerState,
    pub lane_count: u8,
    pub link_rate: u8,
}
