use std::fmt;
use std::io::{self, Read};

/// Error surfaced through `io::Error` when a body exceeds its byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimitExceeded {
    pub limit: u64,
}

impl fmt::Display for BodyLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request body exceeds {} bytes", self.limit)
    }
}

impl std::error::Error for BodyLimitExceeded {}

/// Byte-counting reader capped at `limit` bytes.
///
/// Reading past the cap fails with [`BodyLimitExceeded`] and latches
/// [`exceeded`](Self::exceeded). Only the offsets of line starts are kept, so
/// decode errors reported as line and column can be mapped back to a byte
/// offset without holding a second copy of the body.
pub struct LimitedReader<R> {
    inner: R,
    limit: u64,
    read: u64,
    exceeded: bool,
    saw_content: bool,
    /// Offset of the first byte of every line after the first.
    line_starts: Vec<u64>,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            exceeded: false,
            saw_content: false,
            line_starts: Vec::new(),
        }
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Bytes passed through so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.exceeded
    }

    /// Whether any non-whitespace byte has been read.
    #[must_use]
    pub fn saw_content(&self) -> bool {
        self.saw_content
    }

    /// Absolute byte offset of a 1-based line and column.
    ///
    /// A line past the last newline seen resolves against the end of input.
    #[must_use]
    pub fn offset_at(&self, line: usize, column: usize) -> u64 {
        let line_start = match line {
            0 | 1 => 0,
            n => self.line_starts.get(n - 2).copied().unwrap_or(self.read),
        };
        line_start + column as u64
    }

    fn limit_error(&mut self) -> io::Error {
        self.exceeded = true;
        io::Error::other(BodyLimitExceeded { limit: self.limit })
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exceeded {
            return Err(self.limit_error());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let remaining = self.limit - self.read;
        if remaining == 0 {
            // At the cap: a single further byte means the body is too large.
            let mut extra = [0u8; 1];
            return match self.inner.read(&mut extra)? {
                0 => Ok(0),
                _ => Err(self.limit_error()),
            };
        }
        let max = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self.inner.read(&mut buf[..max])?;
        let chunk = &buf[..n];
        if !self.saw_content && chunk.iter().any(|b| !b.is_ascii_whitespace()) {
            self.saw_content = true;
        }
        let base = self.read;
        self.line_starts.extend(
            chunk
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| base + i as u64 + 1),
        );
        self.read += n as u64;
        Ok(n)
    }
}
