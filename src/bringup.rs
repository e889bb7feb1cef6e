use crate::error::{ErrorKind, TransferError};
use crate::protocol::{self, ControlRequest};
use crate::usb::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupState {
    Init,
    StopStreamIface,
    StopFileIface,
    StartFileIface,
    RequestArchive,
    RequestVideo,
    Streaming,
    Error,
}

impl BringupState {
    pub fn is_terminal(self) -> bool {
        self == BringupState::Error
    }
}

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A bring-up operation succeeded; now in the given state.
    Advanced(BringupState),
    /// Streaming read returned this many bytes into the caller's buffer.
    Data(usize),
    /// Streaming read timed out or returned nothing.
    Idle,
    /// A transfer failed; the machine is now in `Error`.
    Failed(TransferError),
    /// Already in `Error`; nothing was done.
    Halted,
}

/// Drives the bring-up sequence and the streaming read.
///
/// Each [`Bringup::step`] performs at most one state's USB work and returns:
///
/// | State            | USB operation                             | Next            |
/// |------------------|-------------------------------------------|-----------------|
/// | Init             | none (session must be present)            | StopStreamIface |
/// | StopStreamIface  | SET_INTERFACE iface 2 alt 0               | StopFileIface   |
/// | StopFileIface    | SET_INTERFACE iface 1 alt 0               | StartFileIface  |
/// | StartFileIface   | SET_INTERFACE iface 1 alt 1               | RequestArchive  |
/// | RequestArchive   | 4 bulk writes on EP 0x02                  | RequestVideo    |
/// | RequestVideo     | SET_INTERFACE iface 2 alt 1 (+2 bytes)    | Streaming       |
/// | Streaming        | bulk read EP 0x85, 200ms                  | Streaming       |
/// | Error            | none                                      | Error           |
#[derive(Debug)]
pub struct Bringup {
    state: BringupState,
    error: Option<TransferError>,
}

impl Default for Bringup {
    fn default() -> Self {
        Self::new()
    }
}

impl Bringup {
    pub fn new() -> Self {
        Self {
            state: BringupState::Init,
            error: None,
        }
    }

    pub fn state(&self) -> BringupState {
        self.state
    }

    /// Transport failure that ended the sequence, if any.
    pub fn error(&self) -> Option<TransferError> {
        self.error
    }

    /// Force the terminal state without a transport failure (teardown, or a
    /// missing session).
    pub fn halt(&mut self, error: Option<TransferError>) {
        if self.error.is_none() {
            self.error = error;
        }
        self.state = BringupState::Error;
    }

    /// Execute the current state's operation. `buf` receives video data
    /// while streaming.
    pub fn step<T: Transport>(&mut self, transport: &T, buf: &mut [u8]) -> Step {
        match self.state {
            BringupState::Init => self.advance(BringupState::StopStreamIface),
            BringupState::StopStreamIface => {
                self.control(transport, &protocol::STOP_FRAME_IFACE, BringupState::StopFileIface)
            }
            BringupState::StopFileIface => {
                self.control(transport, &protocol::STOP_FILEIO_IFACE, BringupState::StartFileIface)
            }
            BringupState::StartFileIface => {
                self.control(transport, &protocol::START_FILEIO_IFACE, BringupState::RequestArchive)
            }
            BringupState::RequestArchive => self.request_archive(transport),
            BringupState::RequestVideo => {
                self.control(transport, &protocol::START_FRAME_IFACE, BringupState::Streaming)
            }
            BringupState::Streaming => self.read_video(transport, buf),
            BringupState::Error => Step::Halted,
        }
    }

    fn advance(&mut self, next: BringupState) -> Step {
        log::info!("Bring-up: {:?} -> {:?}", self.state, next);
        self.state = next;
        Step::Advanced(next)
    }

    fn fail(&mut self, endpoint: u8, kind: ErrorKind) -> Step {
        let err = TransferError { endpoint, kind };
        log::warn!("Bring-up failed in {:?}: {}", self.state, err);
        self.halt(Some(err));
        Step::Failed(err)
    }

    fn control<T: Transport>(&mut self, transport: &T, req: &ControlRequest, next: BringupState) -> Step {
        match transport.control_out(req) {
            Ok(_) => self.advance(next),
            Err(kind) => self.fail(0x00, kind),
        }
    }

    /// Open `CameraFiles.zip` for reading and start stream 10. A short write
    /// counts as a failure.
    fn request_archive<T: Transport>(&mut self, transport: &T) -> Step {
        for payload in protocol::ARCHIVE_COMMANDS {
            match transport.bulk_write(protocol::COMMAND_ENDPOINT, payload, protocol::COMMAND_TIMEOUT) {
                Ok(n) if n == payload.len() => {}
                Ok(n) => {
                    log::warn!("Short command write: {} of {} bytes", n, payload.len());
                    return self.fail(protocol::COMMAND_ENDPOINT, ErrorKind::Io);
                }
                Err(kind) => return self.fail(protocol::COMMAND_ENDPOINT, kind),
            }
        }
        self.advance(BringupState::RequestVideo)
    }

    fn read_video<T: Transport>(&mut self, transport: &T, buf: &mut [u8]) -> Step {
        match transport.bulk_read(protocol::VIDEO_ENDPOINT, buf, protocol::VIDEO_TIMEOUT) {
            Ok(0) => Step::Idle,
            Ok(n) => Step::Data(n),
            Err(ErrorKind::Timeout) => Step::Idle,
            Err(kind) if kind.is_device_lost() => {
                log::warn!("FLIR One disconnected or video endpoint stalled");
                self.fail(protocol::VIDEO_ENDPOINT, kind)
            }
            Err(kind) => self.fail(protocol::VIDEO_ENDPOINT, kind),
        }
    }
}
