//! Line codec for debugger output streams.
//!
//! Debugger output is not guaranteed to be UTF-8 (cdb writes in the active
//! code page) and a runaway command can print one enormous line, so this
//! decoder is lossy and caps every line at [`MAX_LINE_BYTES`]: a longer run
//! without a newline is emitted in pieces instead of being buffered.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::AppError;

/// Maximum bytes emitted as a single line: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Lossy, CR/LF tolerant line decoder.
#[derive(Debug)]
pub struct OutputCodec {
    max_line: usize,
}

impl OutputCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom per-line limit.
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line: max_line.max(1),
        }
    }
}

impl Default for OutputCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for OutputCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let window = src.len().min(self.max_line + 1);
        if let Some(pos) = src[..window].iter().position(|b| *b == b'\n') {
            let line = decode_line(&src[..pos]);
            src.advance(pos + 1);
            return Ok(Some(line));
        }

        if src.len() >= self.max_line {
            let chunk = src.split_to(self.max_line);
            return Ok(Some(decode_line(&chunk)));
        }

        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Some(decode_line(&rest)))
    }
}
