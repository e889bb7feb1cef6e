//! # flirone - Rust driver for the FLIR One G2 thermal camera accessory
//!
//! Userspace driver over libusb (rusb). Provides:
//! - Device bring-up from idle to video streaming
//! - Resynchronizing reassembly of the bulk video stream into frames
//! - Thermal sample decoding at 160x120 or 80x60, calibrated against a
//!   configurable temperature window and rendered false-color or mono
//! - Passthrough of the visual camera's JPEG images
//! - C FFI for integration with C/C++ hosts
//!
//! ## Quick Start
//! ```no_run
//! use flirone::{ChannelSink, Config, Driver};
//!
//! let (sink, images) = ChannelSink::bounded(8);
//! let mut driver: Driver = Driver::new(&Config::default(), sink).unwrap();
//! driver.setup().unwrap();
//! while driver.ok() {
//!     driver.poll();
//!     while let Ok(img) = images.try_recv() {
//!         println!("{:?} {}x{}", img.stream, img.image.width(), img.image.height());
//!     }
//! }
//! driver.shutdown();
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod usb;
pub mod device;
pub mod bringup;
pub mod reassembly;
pub mod thermal;
pub mod colorize;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod ffi;

pub use error::{ConfigError, DecodeError, DeviceError, ErrorKind, FlirError, TransferError};
pub use types::*;
pub use config::Config;
pub use device::{list_devices, DeviceSession};
pub use dispatch::{ChannelSink, FrameDispatcher, ImageSink};
pub use driver::Driver;

/// Result type alias for flirone operations.
pub type Result<T> = std::result::Result<T, FlirError>;
