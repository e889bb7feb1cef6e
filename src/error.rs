use std::fmt;

/// Closed set of USB failure kinds.
///
/// Every `rusb::Error` is folded into one of these at the transport boundary,
/// so nothing above `usb` ever matches on library-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    NoDevice,
    Pipe,
    Overflow,
    Access,
    Busy,
    NotFound,
    Interrupted,
    NotSupported,
    Io,
    Other,
}

impl ErrorKind {
    /// True when the device is gone or the endpoint is wedged.
    pub fn is_device_lost(self) -> bool {
        matches!(self, ErrorKind::NoDevice | ErrorKind::Pipe)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::NoDevice => "device removed",
            ErrorKind::Pipe => "endpoint stalled",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Access => "access denied",
            ErrorKind::Busy => "resource busy",
            ErrorKind::NotFound => "not found",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::Io => "i/o error",
            ErrorKind::Other => "other error",
        };
        f.write_str(name)
    }
}

/// Failures while opening, configuring or claiming the accessory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("USB context init failed: {0}")]
    Context(ErrorKind),

    #[error("Device not found (VID={vid:04x} PID={pid:04x})")]
    NotFound { vid: u16, pid: u16 },

    #[error("Setting USB configuration {config} failed: {kind}")]
    Configuration { config: u8, kind: ErrorKind },

    #[error("Claiming interface {interface} failed: {kind}")]
    Claim { interface: u8, kind: ErrorKind },

    #[error("Device session already closed")]
    Closed,
}

/// A failed control or bulk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Transfer on endpoint 0x{endpoint:02x} failed: {kind}")]
pub struct TransferError {
    pub endpoint: u8,
    pub kind: ErrorKind,
}

/// Per-frame decode failures. These drop the current frame only.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Thermal segment too short: need {needed} bytes, got {got}")]
    ThermalTooShort { needed: usize, got: usize },

    #[error("Segment {segment} ({start}..{end}) exceeds frame of {len} bytes")]
    SegmentOutOfBounds {
        segment: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("JPEG decode failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid temperature range: min {min} must be below max {max}")]
    InvalidTemperatureRange { min: f32, max: f32 },

    #[error("Unsupported thermal resolution {width}x{height} (use 80x60 or 160x120)")]
    UnsupportedResolution { width: u32, height: u32 },

    #[error("Color gradient needs at least one stop")]
    EmptyGradient,

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors that can occur when driving the FLIR One accessory.
#[derive(Debug, thiserror::Error)]
pub enum FlirError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &dyn std::fmt::Display) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
