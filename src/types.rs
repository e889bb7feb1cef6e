use crate::error::ConfigError;
use std::time::SystemTime;

/// A color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);
    pub const BLUE: Rgb = Rgb::new(0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Scale to 8-bit channels. Fractions are truncated, not rounded.
    pub fn to_u8(self) -> [u8; 3] {
        [unit_to_u8(self.r), unit_to_u8(self.g), unit_to_u8(self.b)]
    }
}

impl From<[f32; 3]> for Rgb {
    fn from(c: [f32; 3]) -> Self {
        Rgb::new(c[0], c[1], c[2])
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Ordered color stops of a piecewise-linear ramp. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStops(Vec<Rgb>);

impl GradientStops {
    pub fn new(stops: Vec<Rgb>) -> Result<Self, ConfigError> {
        if stops.is_empty() {
            return Err(ConfigError::EmptyGradient);
        }
        Ok(Self(stops))
    }

    pub fn stops(&self) -> &[Rgb] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Rgb {
        self.0[0]
    }

    pub fn last(&self) -> Rgb {
        self.0[self.0.len() - 1]
    }
}

impl Default for GradientStops {
    /// Red for cold, blue for hot.
    fn default() -> Self {
        Self(vec![Rgb::RED, Rgb::BLUE])
    }
}

/// Thermal output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Full 160x120 sensor grid.
    Native,
    /// 80x60, rebuilt from the two interleaved half-row sub-scans.
    Downsampled,
}

impl Resolution {
    pub fn from_dimensions(width: u32, height: u32) -> Result<Self, ConfigError> {
        match (width, height) {
            (160, 120) => Ok(Resolution::Native),
            (80, 60) => Ok(Resolution::Downsampled),
            _ => Err(ConfigError::UnsupportedResolution { width, height }),
        }
    }

    pub fn width(self) -> u32 {
        match self {
            Resolution::Native => 160,
            Resolution::Downsampled => 80,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            Resolution::Native => 120,
            Resolution::Downsampled => 60,
        }
    }
}

bitflags::bitflags! {
    /// Which image streams the dispatcher produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ImageStreams: u8 {
        /// Passthrough visual camera (JPEG segment).
        const VISUAL  = 1 << 0;
        /// Calibrated thermal image.
        const THERMAL = 1 << 1;
    }
}

/// Stream an [`OutputFrame`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Visual,
    Thermal,
}

/// Pixel payload of an output frame.
#[derive(Debug, Clone)]
pub enum ImageData {
    Rgb8(image::RgbImage),
    Mono8(image::GrayImage),
}

impl ImageData {
    pub fn width(&self) -> u32 {
        match self {
            ImageData::Rgb8(img) => img.width(),
            ImageData::Mono8(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ImageData::Rgb8(img) => img.height(),
            ImageData::Mono8(img) => img.height(),
        }
    }

    /// Bytes per pixel.
    pub fn channels(&self) -> u32 {
        match self {
            ImageData::Rgb8(_) => 3,
            ImageData::Mono8(_) => 1,
        }
    }

    /// Encoding label as image transports name it.
    pub fn encoding(&self) -> &'static str {
        match self {
            ImageData::Rgb8(_) => "rgb8",
            ImageData::Mono8(_) => "mono8",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ImageData::Rgb8(img) => img.as_raw(),
            ImageData::Mono8(img) => img.as_raw(),
        }
    }
}

/// A finished image handed to the sink.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    pub stream: StreamKind,
    /// Session-wide frame label.
    pub frame_id: String,
    /// Host time at which the complete frame was reassembled.
    pub stamp: SystemTime,
    pub image: ImageData,
}

/// An attached accessory as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Observability counters of a driver session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverStats {
    /// Complete frames yielded by the reassembler.
    pub frames: u64,
    /// Arena resets caused by a missing magic marker.
    pub desync_resets: u64,
    /// Arena resets caused by a chunk that would not fit.
    pub overflow_resets: u64,
    /// Frames (or frame halves) dropped by decode failures.
    pub decode_errors: u64,
    pub visual_published: u64,
    pub thermal_published: u64,
    /// Moving-average frame rate over the last 20 frame intervals.
    pub fps: f64,
}
