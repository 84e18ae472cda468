//! Chunk plan for ranged transfers.

use crate::fault::Fault;
use crate::range::HttpRange;

/// Contiguous piece of a larger transfer: bytes `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: u64,
    pub length: u64,
    /// Position in the plan, starting at 0.
    pub index: usize,
}

impl Chunk {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Bounded range for the `Range` header (`bytes=offset-(end-1)`).
    pub fn range(&self) -> HttpRange {
        HttpRange::new(self.offset, Some(self.length))
    }
}

/// Splits `[start, start + length)` into `chunk_size` pieces in offset order;
/// the last one carries the remainder. A zero `length` yields no chunks.
pub fn plan_chunks(start: u64, length: u64, chunk_size: u64) -> Result<Vec<Chunk>, Fault> {
    if chunk_size == 0 {
        return Err(Fault::config("chunk size must be greater than zero"));
    }
    let end = start
        .checked_add(length)
        .ok_or_else(|| Fault::config(format!("range {}+{} overflows", start, length)))?;
    let count = usize::try_from(length.div_ceil(chunk_size))
        .map_err(|_| Fault::config("too many chunks for this platform"))?;

    let mut out = Vec::with_capacity(count);
    let mut offset = start;
    while offset < end {
        let len = chunk_size.min(end - offset);
        out.push(Chunk {
            offset,
            length: len,
            index: out.len(),
        });
        offset += len;
    }
    Ok(out)
}
