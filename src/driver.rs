use crate::bringup::{Bringup, BringupState, Step};
use crate::config::Config;
use crate::device::DeviceSession;
use crate::dispatch::{FrameDispatcher, ImageSink};
use crate::error::{DeviceError, ErrorKind, TransferError};
use crate::protocol;
use crate::reassembly::FrameReassembler;
use crate::types::DriverStats;
use crate::usb::{Bus, RusbBus, RusbHandle, Transport};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime};

/// Frame intervals averaged by the fps estimate.
const FPS_WINDOW: f64 = 20.0;

/// Single-threaded driver for one accessory.
///
/// The caller owns the loop: [`Driver::setup`] once, then [`Driver::poll`]
/// while [`Driver::ok`] holds. Each poll does at most one bring-up or video
/// transfer plus two 10ms advisory reads, so it returns in bounded time.
/// [`Driver::shutdown`] may be called at any point between polls.
pub struct Driver<H: Transport = RusbHandle> {
    session: Option<DeviceSession<H>>,
    bringup: Bringup,
    reassembler: FrameReassembler,
    dispatcher: FrameDispatcher,
    sink: Box<dyn ImageSink>,
    read_buf: Vec<u8>,
    advisory: [AdvisoryEndpoint; 2],
    vendor_id: u16,
    product_id: u16,
    ok: bool,
    closed: bool,
    last_frame: Option<Instant>,
    stats: DriverStats,
}

/// Advisory endpoint with the last error seen, so repeats are not logged.
struct AdvisoryEndpoint {
    endpoint: u8,
    last_error: Option<ErrorKind>,
}

impl<H: Transport> Driver<H> {
    /// Build a driver from `config`. No USB work happens here.
    pub fn new(config: &Config, sink: impl ImageSink + 'static) -> Result<Self> {
        let settings = config.validate()?;
        Ok(Self {
            session: None,
            bringup: Bringup::new(),
            reassembler: FrameReassembler::default(),
            dispatcher: FrameDispatcher::new(&settings),
            sink: Box::new(sink),
            read_buf: vec![0u8; protocol::READ_BUFFER_SIZE],
            advisory: protocol::ADVISORY_ENDPOINTS.map(|endpoint| AdvisoryEndpoint {
                endpoint,
                last_error: None,
            }),
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            ok: true,
            closed: false,
            last_frame: None,
            stats: DriverStats::default(),
        })
    }

    /// Open the accessory on `bus` and claim its interfaces. Any failure
    /// shuts the driver down.
    pub fn setup_with<B: Bus<Handle = H>>(&mut self, bus: &B) -> std::result::Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }

        let result = DeviceSession::open_on(bus, self.vendor_id, self.product_id).and_then(|mut session| {
            session.claim_all()?;
            Ok(session)
        });

        match result {
            Ok(session) => {
                log::info!("FLIR One ready, starting bring-up");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                log::warn!("Setup failed: {}", e);
                self.shutdown();
                Err(e)
            }
        }
    }

    /// Run one bounded step.
    pub fn poll(&mut self) {
        if self.closed {
            return;
        }
        let Some(transport) = self.session.as_ref().and_then(|s| s.transport()) else {
            self.bringup.halt(None);
            self.ok = false;
            return;
        };

        match self.bringup.step(transport, &mut self.read_buf) {
            Step::Data(n) => {
                if let Some(frame) = self.reassembler.feed(&self.read_buf[..n]) {
                    let now = Instant::now();
                    if let Some(prev) = self.last_frame.replace(now) {
                        let dt = now.duration_since(prev).as_secs_f64();
                        if dt > 0.0 {
                            self.stats.fps = ((FPS_WINDOW - 1.0) * self.stats.fps + 1.0 / dt) / FPS_WINDOW;
                        }
                    }
                    log::debug!(
                        "Frame: size={} thermal={} jpg={} status={} fps={:.1}",
                        frame.header.frame_size,
                        frame.header.thermal_size,
                        frame.header.jpg_size,
                        frame.header.status_size,
                        self.stats.fps
                    );

                    let report = self.dispatcher.dispatch(&frame, SystemTime::now(), &mut *self.sink);
                    self.stats.visual_published += report.visual as u64;
                    self.stats.thermal_published += report.thermal as u64;
                    self.stats.decode_errors += report.errors as u64;
                }
            }
            Step::Failed(_) => {
                self.ok = false;
                return;
            }
            Step::Halted => {
                self.ok = false;
                return;
            }
            Step::Advanced(BringupState::Streaming) => log::info!("Streaming started"),
            Step::Advanced(_) | Step::Idle => {}
        }

        for ep in self.advisory.iter_mut() {
            poll_advisory(transport, ep, &mut self.read_buf);
        }
    }

    /// False once the session failed or was shut down.
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Poll until `stop` is set or the driver is no longer ok.
    pub fn run(&mut self, stop: &AtomicBool) {
        while self.ok && !stop.load(Ordering::Relaxed) {
            self.poll();
        }
    }

    /// Release the device and enter the terminal state. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ok = false;
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.bringup.halt(None);
        log::info!("Driver shut down");
    }

    pub fn state(&self) -> BringupState {
        self.bringup.state()
    }

    /// Transport failure that ended the session, if any.
    pub fn error(&self) -> Option<TransferError> {
        self.bringup.error()
    }

    pub fn stats(&self) -> DriverStats {
        let r = self.reassembler.stats();
        DriverStats {
            frames: r.frames,
            desync_resets: r.desync_resets,
            overflow_resets: r.overflow_resets,
            ..self.stats
        }
    }
}

impl Driver<RusbHandle> {
    /// Open the accessory through libusb.
    pub fn setup(&mut self) -> std::result::Result<(), DeviceError> {
        let bus = match RusbBus::new() {
            Ok(bus) => bus,
            Err(e) => {
                self.shutdown();
                return Err(e);
            }
        };
        self.setup_with(&bus)
    }
}

impl<H: Transport> Drop for Driver<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_advisory<T: Transport>(transport: &T, ep: &mut AdvisoryEndpoint, buf: &mut [u8]) {
    match transport.bulk_read(ep.endpoint, buf, protocol::ADVISORY_TIMEOUT) {
        Ok(n) => {
            if n > 0 {
                log::trace!("EP 0x{:02x}: {} bytes", ep.endpoint, n);
            }
            ep.last_error = None;
        }
        Err(kind) => {
            if ep.last_error != Some(kind) {
                log::debug!("EP 0x{:02x}: {}", ep.endpoint, kind);
                ep.last_error = Some(kind);
            }
        }
    }
}
