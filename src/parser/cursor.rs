//! A bounded cursor over a raw byte stream
use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// The type tags a resync scan recognizes as record starts
pub const KNOWN_TAGS: [&[u8; 4]; 7] = [
    b"XML0", b"CON0", b"CON1", b"NME0", b"RAW0", b"RAW3", b"TAG0",
];

/// Lookahead buffer size for resync scans
const RESYNC_WINDOW: usize = 100;

/// A seekable byte source restricted to a `[start_ptr, end_ptr)` window
///
/// The window supports chunked processing of large files: several
/// readers can each take a slice of the same file, resynchronize to the
/// first record boundary inside their slice and read independently.
pub struct RawCursor<R> {
    inner: R,
    start_ptr: u64,
    end: u64,
    len: u64,
}

impl<R: Read + Seek> RawCursor<R> {
    /// Wrap a byte source, covering it end to end
    pub fn new(inner: R) -> Result<Self> {
        Self::bounded(inner, 0, None)
    }

    /// Wrap a byte source restricted to `[start_ptr, end_ptr)`
    ///
    /// `end_ptr` is clamped to the length of the source. The cursor is
    /// positioned at `start_ptr`; callers starting mid-file should
    /// [`resync`](Self::resync) before reading records.
    pub fn bounded(mut inner: R, start_ptr: u64, end_ptr: Option<u64>) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        let end = end_ptr.map_or(len, |e| e.min(len));
        inner.seek(SeekFrom::Start(start_ptr))?;
        Ok(RawCursor { inner, start_ptr, end, len })
    }

    /// The start of the read window
    pub fn start_ptr(&self) -> u64 {
        self.start_ptr
    }

    /// The exclusive end of the read window
    pub fn end_ptr(&self) -> u64 {
        self.end
    }

    /// Total length of the underlying stream, ignoring the window
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    /// Current absolute byte position
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute byte position
    ///
    /// Seeking outside the window is allowed; it is how a bounded
    /// reader fetches the configuration datagram from the file head.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    /// Seek back to the start of the window
    pub fn rewind(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(self.start_ptr))?;
        Ok(())
    }

    /// Bytes left before the window bound
    pub fn remaining(&mut self) -> Result<u64> {
        let pos = self.tell()?;
        Ok(self.end.saturating_sub(pos))
    }

    /// Access the wrapped byte source
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Scan forward for the next record boundary
    ///
    /// Reads lookahead buffers of [`RESYNC_WINDOW`] bytes and searches
    /// them for any of the [`KNOWN_TAGS`]. Successive buffers overlap
    /// by three bytes so a tag straddling a buffer edge is still found.
    /// On a hit the cursor is backed up four bytes, onto the length
    /// prefix that precedes the tag, and that position is returned.
    ///
    /// # Errors
    ///
    /// [`Error::StartByteNotFound`] when the window bound is exhausted
    /// without a match.
    pub fn resync(&mut self) -> Result<u64> {
        let mut window = [0u8; RESYNC_WINDOW];
        loop {
            let base = self.tell()?;
            if base >= self.end {
                return Err(Error::StartByteNotFound);
            }
            let want = ((self.end - base) as usize).min(RESYNC_WINDOW);
            if want < 4 {
                return Err(Error::StartByteNotFound);
            }
            let buf = &mut window[..want];
            self.inner.read_exact(buf)?;
            if let Some(i) = find_tag(buf) {
                let tag_pos = base + i as u64;
                if tag_pos < 4 {
                    // no room for the length prefix, keep scanning
                    self.inner.seek(SeekFrom::Start(tag_pos + 1))?;
                    continue;
                }
                let aligned = tag_pos - 4;
                self.inner.seek(SeekFrom::Start(aligned))?;
                return Ok(aligned);
            }
            if want < RESYNC_WINDOW {
                return Err(Error::StartByteNotFound);
            }
            // step back before extending the search
            self.inner.seek(SeekFrom::Start(base + (want - 3) as u64))?;
        }
    }
}

fn find_tag(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| KNOWN_TAGS.iter().any(|t| w == &t[..]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_tag_in_buffer() {
        let mut buf = vec![0u8; 40];
        buf.extend_from_slice(b"RAW0");
        buf.extend_from_slice(&[0u8; 20]);
        assert_eq!(find_tag(&buf), Some(40));
    }

    #[test]
    fn ignores_unknown_tags() {
        assert_eq!(find_tag(b"ABCDRAW9XML9"), None);
    }
}
