//! C FFI layer for flirone.
//!
//! Provides an opaque handle-based API for C/C++ hosts. The host drives the
//! poll loop and receives images through a callback.
//! The generated C header is written to `include/flirone.h` by cbindgen.

use crate::config::Config;
use crate::driver::Driver;
use crate::error::LastError;
use crate::types::{ImageData, OutputFrame, StreamKind};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::time::UNIX_EPOCH;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque driver handle for C consumers.
pub struct FlirDriver(Driver);

/// Image passed to the host callback. Pointers are valid only for the
/// duration of the callback.
#[repr(C)]
pub struct FlirImage {
    /// 0 = visual, 1 = thermal.
    pub stream: c_int,
    pub width: u32,
    pub height: u32,
    /// 3 for rgb8, 1 for mono8.
    pub channels: u32,
    pub data: *const u8,
    pub len: usize,
    /// Capture time in nanoseconds since the Unix epoch.
    pub stamp_ns: u64,
    /// Null-terminated frame label.
    pub frame_id: *const c_char,
}

/// Host image callback.
pub type FlirImageCallback = extern "C" fn(image: *const FlirImage, user_data: *mut c_void);

struct CallbackSink {
    callback: FlirImageCallback,
    user_data: *mut c_void,
}

impl crate::dispatch::ImageSink for CallbackSink {
    fn publish(&mut self, frame: OutputFrame) {
        let frame_id = CString::new(frame.frame_id.as_str()).unwrap_or_default();
        let stamp_ns = frame
            .stamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let bytes = frame.image.as_bytes();
        let image = FlirImage {
            stream: match frame.stream {
                StreamKind::Visual => 0,
                StreamKind::Thermal => 1,
            },
            width: frame.image.width(),
            height: frame.image.height(),
            channels: match frame.image {
                ImageData::Rgb8(_) => 3,
                ImageData::Mono8(_) => 1,
            },
            data: bytes.as_ptr(),
            len: bytes.len(),
            stamp_ns,
            frame_id: frame_id.as_ptr(),
        };
        (self.callback)(&image, self.user_data);
    }
}

/// Create a driver. `config_path` may be null for defaults; `FLIRONE_*`
/// environment overrides are applied either way.
/// Returns NULL on error (check flir_last_error()).
///
/// # Safety
/// `config_path` must be a valid null-terminated string, or null.
/// `user_data` is passed back untouched to `callback`.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_new(
    config_path: *const c_char,
    callback: FlirImageCallback,
    user_data: *mut c_void,
) -> *mut FlirDriver {
    let config = if config_path.is_null() {
        Ok(Config::default())
    } else {
        let path = CStr::from_ptr(config_path).to_string_lossy().into_owned();
        Config::load(path)
    };

    let mut config = match config {
        Ok(c) => c,
        Err(e) => {
            LAST_ERROR.set(&e);
            return std::ptr::null_mut();
        }
    };
    config.apply_env();

    let sink = CallbackSink { callback, user_data };
    match Driver::new(&config, sink) {
        Ok(driver) => {
            LAST_ERROR.clear();
            Box::into_raw(Box::new(FlirDriver(driver)))
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Open and claim the accessory. Returns 0 on success, -1 on error.
///
/// # Safety
/// `driver` must be a pointer returned by `flir_driver_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_setup(driver: *mut FlirDriver) -> c_int {
    if driver.is_null() {
        return -1;
    }
    let driver = &mut *driver;
    match driver.0.setup() {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Run one bounded poll step (at most ~220ms).
///
/// # Safety
/// `driver` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_poll(driver: *mut FlirDriver) {
    if driver.is_null() {
        return;
    }
    let driver = &mut *driver;
    driver.0.poll();
    if let Some(err) = driver.0.error() {
        LAST_ERROR.set(&err);
    }
}

/// Liveness flag: false once the session failed or was shut down.
///
/// # Safety
/// `driver` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_ok(driver: *const FlirDriver) -> bool {
    if driver.is_null() {
        return false;
    }
    let driver = &*driver;
    driver.0.ok()
}

/// Release the device. Safe to call more than once.
///
/// # Safety
/// `driver` must be a valid driver pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_shutdown(driver: *mut FlirDriver) {
    if driver.is_null() {
        return;
    }
    let driver = &mut *driver;
    driver.0.shutdown();
}

/// Shut down (if needed) and free a driver.
///
/// # Safety
/// `driver` must be a pointer returned by `flir_driver_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn flir_driver_free(driver: *mut FlirDriver) {
    if !driver.is_null() {
        drop(Box::from_raw(driver));
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next flirone API call.
#[no_mangle]
pub extern "C" fn flir_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
