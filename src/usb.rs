use crate::error::{DeviceError, ErrorKind};
use crate::protocol::ControlRequest;
use crate::types::UsbDeviceInfo;
use rusb::UsbContext;
use std::time::Duration;

/// Fold a libusb error into the crate's closed error set.
pub fn normalize(err: rusb::Error) -> ErrorKind {
    match err {
        rusb::Error::Timeout => ErrorKind::Timeout,
        rusb::Error::NoDevice => ErrorKind::NoDevice,
        rusb::Error::Pipe => ErrorKind::Pipe,
        rusb::Error::Overflow => ErrorKind::Overflow,
        rusb::Error::Access => ErrorKind::Access,
        rusb::Error::Busy => ErrorKind::Busy,
        rusb::Error::NotFound => ErrorKind::NotFound,
        rusb::Error::Interrupted => ErrorKind::Interrupted,
        rusb::Error::NotSupported => ErrorKind::NotSupported,
        rusb::Error::Io => ErrorKind::Io,
        _ => ErrorKind::Other,
    }
}

/// Transfer primitives needed from an opened device handle.
///
/// Implemented for libusb handles below; tests drive the state machine
/// through a scripted implementation instead.
pub trait Transport {
    fn set_configuration(&mut self, config: u8) -> Result<(), ErrorKind>;
    fn claim_interface(&mut self, iface: u8) -> Result<(), ErrorKind>;
    fn release_interface(&mut self, iface: u8) -> Result<(), ErrorKind>;
    fn reset(&mut self) -> Result<(), ErrorKind>;
    fn control_out(&self, req: &ControlRequest) -> Result<usize, ErrorKind>;
    fn bulk_write(&self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, ErrorKind>;
    fn bulk_read(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, ErrorKind>;
}

/// Something that can locate and open the accessory.
pub trait Bus {
    type Handle: Transport;

    fn open(&self, vid: u16, pid: u16) -> Result<Self::Handle, DeviceError>;
}

/// libusb-backed device handle. Owns its context; both are freed on drop.
pub struct RusbHandle {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl Transport for RusbHandle {
    fn set_configuration(&mut self, config: u8) -> Result<(), ErrorKind> {
        self.handle.set_active_configuration(config).map_err(normalize)
    }

    fn claim_interface(&mut self, iface: u8) -> Result<(), ErrorKind> {
        self.handle.claim_interface(iface).map_err(normalize)
    }

    fn release_interface(&mut self, iface: u8) -> Result<(), ErrorKind> {
        self.handle.release_interface(iface).map_err(normalize)
    }

    fn reset(&mut self) -> Result<(), ErrorKind> {
        self.handle.reset().map_err(normalize)
    }

    fn control_out(&self, req: &ControlRequest) -> Result<usize, ErrorKind> {
        self.handle
            .write_control(
                req.request_type,
                req.request,
                req.value,
                req.index,
                req.data,
                req.timeout,
            )
            .map_err(normalize)
    }

    fn bulk_write(&self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, ErrorKind> {
        self.handle.write_bulk(endpoint, data, timeout).map_err(normalize)
    }

    fn bulk_read(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize, ErrorKind> {
        self.handle.read_bulk(endpoint, buf, timeout).map_err(normalize)
    }
}

/// libusb context used to find and open the accessory.
pub struct RusbBus {
    context: rusb::Context,
}

impl RusbBus {
    pub fn new() -> Result<Self, DeviceError> {
        let context = rusb::Context::new().map_err(|e| DeviceError::Context(normalize(e)))?;
        Ok(Self { context })
    }

    /// Every attached USB device, logged at debug level.
    pub fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, DeviceError> {
        let devices = self
            .context
            .devices()
            .map_err(|e| DeviceError::Context(normalize(e)))?;

        let mut found = Vec::new();
        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("Skipping device without descriptor: {}", e);
                    continue;
                }
            };
            log::debug!("Vendor:Device = {:04x}:{:04x}", desc.vendor_id(), desc.product_id());
            found.push(UsbDeviceInfo {
                bus_number: device.bus_number(),
                address: device.address(),
                vendor_id: desc.vendor_id(),
                product_id: desc.product_id(),
            });
        }
        Ok(found)
    }
}

impl Bus for RusbBus {
    type Handle = RusbHandle;

    fn open(&self, vid: u16, pid: u16) -> Result<RusbHandle, DeviceError> {
        let mut handle = self
            .context
            .open_device_with_vid_pid(vid, pid)
            .ok_or(DeviceError::NotFound { vid, pid })?;

        // Linux binds cdc/uvc drivers to some interfaces.
        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => log::warn!("Kernel driver auto-detach: {} (continuing)", e),
        }

        Ok(RusbHandle { handle })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for exercising the session, bring-up and driver
    //! without hardware.

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Op {
        SetConfiguration(u8),
        Claim(u8),
        Release(u8),
        Reset,
        Control { index: u16, value: u16, len: usize },
        BulkWrite { endpoint: u8, data: Vec<u8> },
        BulkRead { endpoint: u8 },
    }

    #[derive(Default)]
    pub struct Script {
        pub ops: Vec<Op>,
        /// Responses for reads on the video endpoint. Empty means timeout.
        pub video: VecDeque<Result<Vec<u8>, ErrorKind>>,
        pub fail_configuration: Option<ErrorKind>,
        pub fail_claim: Option<(u8, ErrorKind)>,
        /// Fail the n-th control transfer (0-based).
        pub fail_control: Option<(usize, ErrorKind)>,
        pub fail_bulk_write: Option<ErrorKind>,
        pub advisory_error: Option<ErrorKind>,
        controls: usize,
    }

    #[derive(Clone, Default)]
    pub struct MockTransport {
        pub script: Rc<RefCell<Script>>,
    }

    impl MockTransport {
        pub fn ops(&self) -> Vec<Op> {
            self.script.borrow().ops.clone()
        }

        pub fn push_video(&self, chunk: Vec<u8>) {
            self.script.borrow_mut().video.push_back(Ok(chunk));
        }

        pub fn push_video_error(&self, kind: ErrorKind) {
            self.script.borrow_mut().video.push_back(Err(kind));
        }
    }

    impl Transport for MockTransport {
        fn set_configuration(&mut self, config: u8) -> Result<(), ErrorKind> {
            let mut s = self.script.borrow_mut();
            s.ops.push(Op::SetConfiguration(config));
            s.fail_configuration.map_or(Ok(()), Err)
        }

        fn claim_interface(&mut self, iface: u8) -> Result<(), ErrorKind> {
            let mut s = self.script.borrow_mut();
            s.ops.push(Op::Claim(iface));
            match s.fail_claim {
                Some((i, kind)) if i == iface => Err(kind),
                _ => Ok(()),
            }
        }

        fn release_interface(&mut self, iface: u8) -> Result<(), ErrorKind> {
            self.script.borrow_mut().ops.push(Op::Release(iface));
            Ok(())
        }

        fn reset(&mut self) -> Result<(), ErrorKind> {
            self.script.borrow_mut().ops.push(Op::Reset);
            Ok(())
        }

        fn control_out(&self, req: &ControlRequest) -> Result<usize, ErrorKind> {
            let mut s = self.script.borrow_mut();
            s.ops.push(Op::Control {
                index: req.index,
                value: req.value,
                len: req.data.len(),
            });
            let n = s.controls;
            s.controls += 1;
            match s.fail_control {
                Some((i, kind)) if i == n => Err(kind),
                _ => Ok(req.data.len()),
            }
        }

        fn bulk_write(&self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize, ErrorKind> {
            let mut s = self.script.borrow_mut();
            s.ops.push(Op::BulkWrite {
                endpoint,
                data: data.to_vec(),
            });
            s.fail_bulk_write.map_or(Ok(data.len()), Err)
        }

        fn bulk_read(&self, endpoint: u8, buf: &mut [u8], _timeout: Duration) -> Result<usize, ErrorKind> {
            let mut s = self.script.borrow_mut();
            s.ops.push(Op::BulkRead { endpoint });
            if endpoint != crate::protocol::VIDEO_ENDPOINT {
                return Err(s.advisory_error.unwrap_or(ErrorKind::Timeout));
            }
            match s.video.pop_front() {
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Some(Err(kind)) => Err(kind),
                None => Err(ErrorKind::Timeout),
            }
        }
    }

    /// Bus that hands out a clone of one scripted transport, or nothing.
    pub struct MockBus {
        pub transport: Option<MockTransport>,
    }

    impl MockBus {
        pub fn with(transport: MockTransport) -> Self {
            Self {
                transport: Some(transport),
            }
        }

        pub fn empty() -> Self {
            Self { transport: None }
        }
    }

    impl Bus for MockBus {
        type Handle = MockTransport;

        fn open(&self, vid: u16, pid: u16) -> Result<MockTransport, DeviceError> {
            self.transport.clone().ok_or(DeviceError::NotFound { vid, pid })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_maps_removal_and_stall() {
        assert_eq!(normalize(rusb::Error::Timeout), ErrorKind::Timeout);
        assert_eq!(normalize(rusb::Error::NoDevice), ErrorKind::NoDevice);
        assert_eq!(normalize(rusb::Error::Pipe), ErrorKind::Pipe);
        assert_eq!(normalize(rusb::Error::BadDescriptor), ErrorKind::Other);
        assert!(normalize(rusb::Error::NoDevice).is_device_lost());
        assert!(!normalize(rusb::Error::Timeout).is_device_lost());
    }
}
