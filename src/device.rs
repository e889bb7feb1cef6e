use crate::error::DeviceError;
use crate::protocol::{INTERFACES, PID, USB_CONFIGURATION, VID};
use crate::types::UsbDeviceInfo;
use crate::usb::{Bus, RusbBus, RusbHandle, Transport};

/// List attached FLIR One accessories.
///
/// Every device seen on the bus is logged at debug level along the way.
pub fn list_devices() -> Result<Vec<UsbDeviceInfo>, DeviceError> {
    let bus = RusbBus::new()?;
    Ok(bus
        .enumerate()?
        .into_iter()
        .filter(|d| d.vendor_id == VID && d.product_id == PID)
        .collect())
}

/// An opened accessory with its USB configuration selected.
///
/// Owns the transport handle exclusively. [`DeviceSession::close`] releases
/// the claimed interfaces, resets the device and drops the handle exactly
/// once; later calls (and the final drop) are no-ops.
pub struct DeviceSession<H: Transport = RusbHandle> {
    handle: Option<H>,
    claimed: Vec<u8>,
    vendor_id: u16,
    product_id: u16,
}

impl DeviceSession<RusbHandle> {
    /// Open the accessory through a fresh libusb context.
    pub fn open(vid: u16, pid: u16) -> Result<Self, DeviceError> {
        let bus = RusbBus::new()?;
        Self::open_on(&bus, vid, pid)
    }
}

impl<H: Transport> DeviceSession<H> {
    /// Open the accessory on `bus` and select its streaming configuration.
    pub fn open_on<B: Bus<Handle = H>>(bus: &B, vid: u16, pid: u16) -> Result<Self, DeviceError> {
        let handle = bus.open(vid, pid)?;
        log::info!("Opened FLIR One ({:04x}:{:04x})", vid, pid);

        let mut session = DeviceSession {
            handle: Some(handle),
            claimed: Vec::new(),
            vendor_id: vid,
            product_id: pid,
        };

        if let Some(handle) = session.handle.as_mut() {
            if let Err(kind) = handle.set_configuration(USB_CONFIGURATION) {
                session.close();
                return Err(DeviceError::Configuration {
                    config: USB_CONFIGURATION,
                    kind,
                });
            }
        }
        log::info!("Set USB configuration {}", USB_CONFIGURATION);

        Ok(session)
    }

    /// Claim `indices` in order. Stops at the first failure, which names the
    /// interface. Interfaces claimed before the failure stay recorded so
    /// `close` releases them.
    pub fn claim_interfaces(&mut self, indices: &[u8]) -> Result<(), DeviceError> {
        let handle = self.handle.as_mut().ok_or(DeviceError::Closed)?;
        for &interface in indices {
            if self.claimed.contains(&interface) {
                continue;
            }
            handle
                .claim_interface(interface)
                .map_err(|kind| DeviceError::Claim { interface, kind })?;
            log::info!("Claimed interface {}", interface);
            self.claimed.push(interface);
        }
        Ok(())
    }

    /// Claim every interface the bring-up sequence talks to.
    pub fn claim_all(&mut self) -> Result<(), DeviceError> {
        self.claim_interfaces(INTERFACES)
    }

    pub fn transport(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn claimed(&self) -> &[u8] {
        &self.claimed
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Release everything acquired so far. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        for iface in self.claimed.drain(..).rev() {
            if let Err(kind) = handle.release_interface(iface) {
                log::warn!("Releasing interface {} failed: {}", iface, kind);
            }
        }
        if let Err(kind) = handle.reset() {
            log::warn!("Device reset failed: {}", kind);
        }
        drop(handle);
        log::info!(
            "Closed FLIR One ({:04x}:{:04x})",
            self.vendor_id,
            self.product_id
        );
    }
}

impl<H: Transport> Drop for DeviceSession<H> {
    fn drop(&mut self) {
        self.close();
    }
}
