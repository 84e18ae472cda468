//! Download targets filled by concurrent chunk workers.

use crate::fault::{Fault, TransportErrorKind};
use crate::reliable::read_to_count;
use crate::storage::PartFile;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Largest block copied per `write_at` when streaming into a file.
const FILE_COPY_BLOCK: usize = 256 * 1024;

/// Destination of a ranged download. Offsets are relative to the start of
/// the downloaded range; concurrent `fill` calls always cover disjoint ranges.
pub(crate) trait RangeSink: Sync {
    /// Called once, before any `fill`, with the size of the whole range.
    fn prepare(&mut self, size: u64) -> Result<(), Fault>;

    /// Copies exactly `len` bytes from `reader` to `offset`.
    fn fill(&self, offset: u64, len: u64, reader: &mut dyn Read) -> Result<(), Fault>;
}

fn short_body(offset: u64, got: u64, len: u64) -> Fault {
    Fault::transport(
        TransportErrorKind::Read,
        format!("chunk at {} ended after {} of {} bytes", offset, got, len),
    )
}

/// Caller buffer split into disjoint regions as workers claim them.
pub(crate) struct BufferSink<'a> {
    free: Mutex<Vec<(u64, &'a mut [u8])>>,
    capacity: u64,
}

impl<'a> BufferSink<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        let capacity = buf.len() as u64;
        Self {
            free: Mutex::new(vec![(0, buf)]),
            capacity,
        }
    }

    /// Removes `[offset, offset + len)` from the free list and hands it out.
    fn claim(&self, offset: u64, len: u64) -> Result<&'a mut [u8], Fault> {
        let mut free = self
            .free
            .lock()
            .map_err(|_| Fault::config("buffer sink lock poisoned"))?;
        let pos = free
            .iter()
            .position(|(start, region)| *start <= offset && offset + len <= *start + region.len() as u64)
            .ok_or_else(|| Fault::config(format!("range {}+{} outside the buffer", offset, len)))?;
        let (start, region) = free.swap_remove(pos);
        let (head, rest) = region.split_at_mut((offset - start) as usize);
        let (target, tail) = rest.split_at_mut(len as usize);
        if !head.is_empty() {
            free.push((start, head));
        }
        if !tail.is_empty() {
            free.push((offset + len, tail));
        }
        Ok(target)
    }
}

impl RangeSink for BufferSink<'_> {
    fn prepare(&mut self, size: u64) -> Result<(), Fault> {
        if size > self.capacity {
            return Err(Fault::config(format!(
                "buffer of {} bytes is too small for a {}-byte range",
                self.capacity, size
            )));
        }
        Ok(())
    }

    fn fill(&self, offset: u64, len: u64, reader: &mut dyn Read) -> Result<(), Fault> {
        let target = self.claim(offset, len)?;
        let got = read_to_count(reader, target)? as u64;
        if got != len {
            return Err(short_body(offset, got, len));
        }
        Ok(())
    }
}

/// `.part` file next to the destination, renamed into place on success.
pub(crate) struct FileSink {
    final_path: PathBuf,
    part: Option<PartFile>,
}

impl FileSink {
    pub(crate) fn new(final_path: &Path) -> Self {
        Self {
            final_path: final_path.to_path_buf(),
            part: None,
        }
    }

    fn part(&self) -> Result<&PartFile, Fault> {
        self.part
            .as_ref()
            .ok_or_else(|| Fault::Storage("file sink used before prepare".to_string()))
    }

    /// Sync and rename the temp file to the destination.
    pub(crate) fn finish(mut self) -> Result<(), Fault> {
        let part = self
            .part
            .take()
            .ok_or_else(|| Fault::Storage("nothing was downloaded".to_string()))?;
        part.commit().map_err(storage_fault)
    }

    /// Remove the temp file, if one was created.
    pub(crate) fn discard(mut self) {
        if let Some(part) = self.part.take() {
            part.abandon();
        }
    }
}

pub(crate) fn storage_fault(e: anyhow::Error) -> Fault {
    Fault::Storage(format!("{:#}", e))
}

impl RangeSink for FileSink {
    fn prepare(&mut self, size: u64) -> Result<(), Fault> {
        self.part = Some(PartFile::create(&self.final_path, size).map_err(storage_fault)?);
        Ok(())
    }

    fn fill(&self, offset: u64, len: u64, reader: &mut dyn Read) -> Result<(), Fault> {
        let part = self.part()?;
        let mut block = vec![0u8; FILE_COPY_BLOCK.min(len as usize).max(1)];
        let mut done = 0u64;
        while done < len {
            let want = block.len().min((len - done) as usize);
            let got = read_to_count(reader, &mut block[..want])?;
            if got == 0 {
                return Err(short_body(offset, done, len));
            }
            part.write_at(offset + done, &block[..got])
                .map_err(storage_fault)?;
            done += got as u64;
        }
        Ok(())
    }
}
