use crate::error::DecodeError;
use crate::protocol::{self, FrameHeader, HEADER_LEN};

/// Fixed-capacity accumulation buffer. `len() <= capacity()` always holds.
pub struct FrameArena {
    buf: Box<[u8]>,
    cursor: usize,
}

/// Returned when an append would not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFull;

impl FrameArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Whether `extra` more bytes fit after the cursor.
    pub fn fits(&self, extra: usize) -> bool {
        extra <= self.capacity() - self.cursor
    }

    pub fn append(&mut self, chunk: &[u8]) -> Result<(), ArenaFull> {
        if !self.fits(chunk.len()) {
            return Err(ArenaFull);
        }
        let end = self.cursor + chunk.len();
        self.buf[self.cursor..end].copy_from_slice(chunk);
        self.cursor = end;
        Ok(())
    }

    /// Buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }
}

/// A fully buffered frame, borrowed from the arena.
#[derive(Debug, Clone, Copy)]
pub struct CompleteFrame<'a> {
    pub header: FrameHeader,
    /// Header plus `frame_size` payload bytes.
    data: &'a [u8],
}

impl<'a> CompleteFrame<'a> {
    /// Frame bytes from the magic marker onwards.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Everything after the 28-byte header.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[HEADER_LEN..]
    }

    /// Thermal segment, first after the header.
    pub fn thermal(&self) -> Result<&'a [u8], DecodeError> {
        self.segment("thermal", 0, self.header.thermal_size)
    }

    /// JPEG segment, directly after the thermal segment.
    pub fn jpg(&self) -> Result<&'a [u8], DecodeError> {
        self.segment("jpg", self.header.thermal_size as usize, self.header.jpg_size)
    }

    /// Status segment, directly after the JPEG segment.
    pub fn status(&self) -> Result<&'a [u8], DecodeError> {
        let skip = self.header.thermal_size as usize + self.header.jpg_size as usize;
        self.segment("status", skip, self.header.status_size)
    }

    fn segment(&self, segment: &'static str, skip: usize, size: u32) -> Result<&'a [u8], DecodeError> {
        let start = HEADER_LEN.saturating_add(skip);
        let end = start.saturating_add(size as usize);
        if end > self.data.len() {
            return Err(DecodeError::SegmentOutOfBounds {
                segment,
                start,
                end,
                len: self.data.len(),
            });
        }
        Ok(&self.data[start..end])
    }
}

/// Counters kept by the reassembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub frames: u64,
    pub desync_resets: u64,
    pub overflow_resets: u64,
}

/// Resynchronizing frame reassembler over a [`FrameArena`].
///
/// A frame arrives over several bulk reads and only the magic marker tells
/// where one begins. The arena is reset lazily: a yielded frame stays
/// buffered until a marker-prefixed chunk or an overflow resets the cursor,
/// so a non-marker chunk arriving right after a complete frame yields that
/// same frame again.
pub struct FrameReassembler {
    arena: FrameArena,
    stats: ReassemblyStats,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(protocol::ARENA_CAPACITY)
    }
}

impl FrameReassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: FrameArena::new(capacity),
            stats: ReassemblyStats::default(),
        }
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.arena.len()
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Feed one bulk chunk. Returns the buffered frame once its header-declared
    /// length is satisfied.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<CompleteFrame<'_>> {
        if protocol::starts_with_magic(chunk) {
            self.arena.reset();
        } else if !self.arena.fits(chunk.len()) {
            // Overflow means we lost sync somewhere.
            self.stats.overflow_resets += 1;
            self.arena.reset();
        }

        if self.arena.append(chunk).is_err() {
            // Larger than the whole arena; nothing sensible to keep.
            self.stats.overflow_resets += 1;
            self.arena.reset();
            return None;
        }

        // A frame whose first chunk splits the marker itself (e.g. `EF BE`)
        // cannot be recognised and is dropped here.
        if !protocol::starts_with_magic(self.arena.as_slice()) {
            self.stats.desync_resets += 1;
            log::trace!("Arena lost sync, dropping {} bytes", self.arena.len());
            self.arena.reset();
            return None;
        }

        let header = FrameHeader::parse(self.arena.as_slice())?;
        let total = header.total_len();
        if self.arena.len() < total {
            return None;
        }

        self.stats.frames += 1;
        Some(CompleteFrame {
            header,
            data: &self.arena.as_slice()[..total],
        })
    }
}
