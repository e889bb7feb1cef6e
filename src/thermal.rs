use crate::error::DecodeError;
use crate::protocol::HEADER_LEN;
use crate::types::Resolution;

// -- Sensor geometry --
// 120 physical rows of 164 LE u16 samples from byte 32 (28-byte header plus
// 4 bytes of segment preamble). Each 160-wide row is two 80-sample halves
// with 4 bytes of packing after column 80.

pub const RAW_WIDTH: usize = 160;
pub const RAW_HEIGHT: usize = 120;
/// Physical row stride in samples.
pub const RAW_STRIDE: usize = 164;
pub const HALF_WIDTH: usize = 80;
/// Byte offset of sample (0, 0) in the frame.
pub const RAW_OFFSET: usize = HEADER_LEN + 4;
const HALF_GAP: usize = 4;

/// Frame bytes needed to read every sample.
pub const RAW_FRAME_LEN: usize = sample_offset(RAW_WIDTH - 1, RAW_HEIGHT - 1) + 2;

/// Byte offset of raw sample `(x, y)` within the frame.
pub const fn sample_offset(x: usize, y: usize) -> usize {
    let base = 2 * (y * RAW_STRIDE + x) + RAW_OFFSET;
    if x < HALF_WIDTH {
        base
    } else {
        base + HALF_GAP
    }
}

/// Unpacked raw sensor counts, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThermal {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
}

impl RawThermal {
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.samples[(y * self.width + x) as usize]
    }
}

/// Unpacks the thermal segment at 160x120 or 80x60.
///
/// The 80x60 layout is specific to this sensor: even output rows take the
/// first half of physical row `y/2`, odd output rows the second half of the
/// same row. It is not a general resampling rule.
#[derive(Debug, Clone, Copy)]
pub struct ThermalDecoder {
    resolution: Resolution,
}

impl ThermalDecoder {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Decode from frame bytes (magic marker at offset 0) ending where the
    /// thermal segment ends.
    pub fn decode(&self, frame: &[u8]) -> Result<RawThermal, DecodeError> {
        if frame.len() < RAW_FRAME_LEN {
            return Err(DecodeError::ThermalTooShort {
                needed: RAW_FRAME_LEN,
                got: frame.len(),
            });
        }

        let (width, height) = (self.resolution.width(), self.resolution.height());
        let mut samples = Vec::with_capacity((width * height) as usize);

        match self.resolution {
            Resolution::Native => {
                for y in 0..RAW_HEIGHT {
                    for x in 0..RAW_WIDTH {
                        samples.push(read_sample(frame, x, y));
                    }
                }
            }
            Resolution::Downsampled => {
                for y in 0..height as usize {
                    let row = y / 2;
                    let col0 = if y % 2 == 0 { 0 } else { HALF_WIDTH };
                    for x in 0..HALF_WIDTH {
                        samples.push(read_sample(frame, col0 + x, row));
                    }
                }
            }
        }

        Ok(RawThermal {
            width,
            height,
            samples,
        })
    }
}

fn read_sample(frame: &[u8], x: usize, y: usize) -> u16 {
    let off = sample_offset(x, y);
    u16::from_le_bytes([frame[off], frame[off + 1]])
}
