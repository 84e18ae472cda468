//! Replayable request bodies.

use crate::fault::Fault;
use crate::storage::read_at;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

/// Request body source. Every variant can be read again from the start, which
/// the retry policy relies on when it re-drives an attempt.
#[derive(Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    /// A window of a shared in-memory buffer.
    Bytes {
        data: Arc<[u8]>,
        offset: usize,
        len: usize,
    },
    /// A window of an open file, read positionally.
    File {
        file: Arc<File>,
        offset: u64,
        len: u64,
    },
}

impl Body {
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Body::Bytes {
            data: data.into(),
            offset: 0,
            len,
        }
    }

    /// `len` bytes of `data` starting at `offset`, without copying.
    pub fn slice(data: Arc<[u8]>, offset: usize, len: usize) -> Result<Self, Fault> {
        match offset.checked_add(len) {
            Some(end) if end <= data.len() => Ok(Body::Bytes { data, offset, len }),
            _ => Err(Fault::config(format!(
                "body window {}+{} exceeds buffer of {} bytes",
                offset,
                len,
                data.len()
            ))),
        }
    }

    pub fn file_range(file: Arc<File>, offset: u64, len: u64) -> Self {
        Body::File { file, offset, len }
    }

    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes { len, .. } => *len as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh reader positioned at the start of the body.
    pub fn reader(&self) -> BodyReader {
        BodyReader {
            source: self.clone(),
            pos: 0,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes { offset, len, .. } => write!(f, "Body::Bytes({}+{})", offset, len),
            Body::File { offset, len, .. } => write!(f, "Body::File({}+{})", offset, len),
        }
    }
}

/// Owning reader over a `Body`; `Send + 'static` so a transport thread can drive it.
pub struct BodyReader {
    source: Body,
    pos: u64,
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.source.len().saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = match &self.source {
            Body::Empty => 0,
            Body::Bytes { data, offset, .. } => {
                let start = offset + self.pos as usize;
                buf[..want].copy_from_slice(&data[start..start + want]);
                want
            }
            Body::File { file, offset, .. } => {
                let n = read_at(file, &mut buf[..want], offset + self.pos)?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "upload source ended before the declared length",
                    ));
                }
                n
            }
        };
        self.pos += n as u64;
        Ok(n)
    }
}
