use std::time::Duration;

// -- USB identifiers --
pub const VID: u16 = 0x09CB;
pub const PID: u16 = 0x1996;

/// USB configuration that exposes the file-io and frame interfaces.
pub const USB_CONFIGURATION: u8 = 3;
pub const INTERFACES: &[u8] = &[0, 1, 2];
pub const FILEIO_INTERFACE: u16 = 1;
pub const FRAME_INTERFACE: u16 = 2;

// -- Endpoints --
pub const COMMAND_ENDPOINT: u8 = 0x02;
pub const VIDEO_ENDPOINT: u8 = 0x85;
pub const STATUS_ENDPOINT: u8 = 0x81;
pub const FILEIO_ENDPOINT: u8 = 0x83;
pub const ADVISORY_ENDPOINTS: [u8; 2] = [STATUS_ENDPOINT, FILEIO_ENDPOINT];

// -- Timeouts --
/// Video endpoint read timeout. The device stalls unpredictably under
/// anything tighter, so this is not configurable.
pub const VIDEO_TIMEOUT: Duration = Duration::from_millis(200);
pub const ADVISORY_TIMEOUT: Duration = Duration::from_millis(10);
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(100);
pub const START_VIDEO_TIMEOUT: Duration = Duration::from_millis(200);
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

// -- SET_INTERFACE control requests --
/// Host-to-device, standard, interface recipient.
pub const REQUEST_TYPE_OUT_INTERFACE: u8 = 0x01;
pub const REQUEST_SET_INTERFACE: u8 = 0x0B;
pub const ALT_STOP: u16 = 0;
pub const ALT_START: u16 = 1;

/// One SET_INTERFACE control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: &'static [u8],
    pub timeout: Duration,
}

impl ControlRequest {
    const fn set_interface(interface: u16, alt: u16, data: &'static [u8], timeout: Duration) -> Self {
        Self {
            request_type: REQUEST_TYPE_OUT_INTERFACE,
            request: REQUEST_SET_INTERFACE,
            value: alt,
            index: interface,
            data,
            timeout,
        }
    }
}

pub const STOP_FRAME_IFACE: ControlRequest =
    ControlRequest::set_interface(FRAME_INTERFACE, ALT_STOP, &[], CONTROL_TIMEOUT);
pub const STOP_FILEIO_IFACE: ControlRequest =
    ControlRequest::set_interface(FILEIO_INTERFACE, ALT_STOP, &[], CONTROL_TIMEOUT);
pub const START_FILEIO_IFACE: ControlRequest =
    ControlRequest::set_interface(FILEIO_INTERFACE, ALT_START, &[], CONTROL_TIMEOUT);
/// The device expects two zero data bytes with the stream start.
pub const START_FRAME_IFACE: ControlRequest =
    ControlRequest::set_interface(FRAME_INTERFACE, ALT_START, &[0, 0], START_VIDEO_TIMEOUT);

// -- File-io command payloads (EP 0x02) --
//
// Each JSON request is preceded by a 16-byte preamble:
// [0xCC, 0x01, 0, 0] [1, 0, 0, 0] [u32 LE payload length incl. NUL] [4 bytes checksum]
pub const OPEN_ARCHIVE_PREAMBLE: [u8; 16] = [
    0xCC, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x41, 0x00, 0x00, 0x00, 0xF8, 0xB3, 0xF7, 0x00,
];
pub const OPEN_ARCHIVE_REQUEST: &[u8] =
    b"{\"type\":\"openFile\",\"data\":{\"mode\":\"r\",\"path\":\"CameraFiles.zip\"}}\0";

pub const READ_STREAM_PREAMBLE: [u8; 16] = [
    0xCC, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x33, 0x00, 0x00, 0x00, 0xEF, 0xDB, 0xC1, 0xC1,
];
pub const READ_STREAM_REQUEST: &[u8] = b"{\"type\":\"readFile\",\"data\":{\"streamIdentifier\":10}}\0";

/// Bulk writes issued in the archive-request bring-up step, in order.
pub const ARCHIVE_COMMANDS: [&[u8]; 4] = [
    &OPEN_ARCHIVE_PREAMBLE,
    OPEN_ARCHIVE_REQUEST,
    &READ_STREAM_PREAMBLE,
    READ_STREAM_REQUEST,
];

/// Payload length declared by a command preamble.
pub fn preamble_declared_len(preamble: &[u8; 16]) -> usize {
    u32::from_le_bytes([preamble[8], preamble[9], preamble[10], preamble[11]]) as usize
}

// -- Frame framing (EP 0x85) --
pub const MAGIC: [u8; 4] = [0xEF, 0xBE, 0x00, 0x00];
pub const HEADER_LEN: usize = 28;
const FRAME_SIZE_OFFSET: usize = 8;
const THERMAL_SIZE_OFFSET: usize = 12;
const JPG_SIZE_OFFSET: usize = 16;
const STATUS_SIZE_OFFSET: usize = 20;

/// Bulk read buffer and reassembly arena size.
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;
pub const ARENA_CAPACITY: usize = 1024 * 1024;

/// Segment lengths declared by a frame header.
///
/// Header layout (28 bytes):
/// - `[0..4]`: magic `EF BE 00 00`
/// - `[8..12]`: frame size (payload bytes after the header)
/// - `[12..16]`: thermal segment size
/// - `[16..20]`: JPEG segment size
/// - `[20..24]`: status segment size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_size: u32,
    pub thermal_size: u32,
    pub jpg_size: u32,
    pub status_size: u32,
}

impl FrameHeader {
    /// Read the header fields. Returns `None` if fewer than 28 bytes are given.
    /// The magic marker is not checked here.
    pub fn parse(data: &[u8]) -> Option<FrameHeader> {
        if data.len() < HEADER_LEN {
            return None;
        }
        Some(FrameHeader {
            frame_size: read_u32_le(data, FRAME_SIZE_OFFSET),
            thermal_size: read_u32_le(data, THERMAL_SIZE_OFFSET),
            jpg_size: read_u32_le(data, JPG_SIZE_OFFSET),
            status_size: read_u32_le(data, STATUS_SIZE_OFFSET),
        })
    }

    /// Total bytes (header included) that must be buffered for the frame.
    pub fn total_len(&self) -> usize {
        HEADER_LEN.saturating_add(self.frame_size as usize)
    }

    /// Serialize into a 28-byte header with the magic marker.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..4].copy_from_slice(&MAGIC);
        buf[FRAME_SIZE_OFFSET..FRAME_SIZE_OFFSET + 4].copy_from_slice(&self.frame_size.to_le_bytes());
        buf[THERMAL_SIZE_OFFSET..THERMAL_SIZE_OFFSET + 4]
            .copy_from_slice(&self.thermal_size.to_le_bytes());
        buf[JPG_SIZE_OFFSET..JPG_SIZE_OFFSET + 4].copy_from_slice(&self.jpg_size.to_le_bytes());
        buf[STATUS_SIZE_OFFSET..STATUS_SIZE_OFFSET + 4]
            .copy_from_slice(&self.status_size.to_le_bytes());
        buf
    }
}

/// True if `data` starts with the frame magic marker.
pub fn starts_with_magic(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preambles_declare_request_length() {
        assert_eq!(preamble_declared_len(&OPEN_ARCHIVE_PREAMBLE), OPEN_ARCHIVE_REQUEST.len());
        assert_eq!(preamble_declared_len(&READ_STREAM_PREAMBLE), READ_STREAM_REQUEST.len());
        assert_eq!(OPEN_ARCHIVE_REQUEST.len(), 65);
        assert_eq!(READ_STREAM_REQUEST.len(), 51);
    }

    #[test]
    fn test_requests_are_nul_terminated_ascii() {
        for req in [OPEN_ARCHIVE_REQUEST, READ_STREAM_REQUEST] {
            assert_eq!(*req.last().unwrap(), 0);
            assert!(req[..req.len() - 1].iter().all(|b| b.is_ascii() && *b != 0));
        }
    }

    #[test]
    fn test_control_requests() {
        assert_eq!(STOP_FRAME_IFACE.index, 2);
        assert_eq!(STOP_FRAME_IFACE.value, 0);
        assert_eq!(START_FILEIO_IFACE.index, 1);
        assert_eq!(START_FILEIO_IFACE.value, 1);
        assert_eq!(START_FRAME_IFACE.data, &[0u8, 0][..]);
        assert_eq!(START_FRAME_IFACE.timeout, Duration::from_millis(200));
        assert_eq!(STOP_FILEIO_IFACE.request_type, 0x01);
        assert_eq!(STOP_FILEIO_IFACE.request, 0x0B);
    }

    #[test]
    fn test_parse_header() {
        let mut data = [0u8; 28];
        data[..4].copy_from_slice(&MAGIC);
        data[8] = 0x64; // frame size = 100
        data[12..16].copy_from_slice(&0x9999u32.to_le_bytes());
        data[16..20].copy_from_slice(&0x01020304u32.to_le_bytes());
        data[20] = 7;

        let header = FrameHeader::parse(&data).unwrap();
        assert_eq!(header.frame_size, 100);
        assert_eq!(header.thermal_size, 0x9999);
        assert_eq!(header.jpg_size, 0x01020304);
        assert_eq!(header.status_size, 7);
        assert_eq!(header.total_len(), 128);
        assert_eq!(header.to_bytes(), data);
    }

    #[test]
    fn test_parse_header_too_short() {
        assert!(FrameHeader::parse(&MAGIC).is_none());
    }

    #[test]
    fn test_total_len_does_not_overflow() {
        let header = FrameHeader {
            frame_size: u32::MAX,
            thermal_size: 0,
            jpg_size: 0,
            status_size: 0,
        };
        assert_eq!(header.total_len(), HEADER_LEN + u32::MAX as usize);
    }
}
