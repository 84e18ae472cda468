//! The `.part` file behind a file download.

use super::temp_path;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Sized temp file that chunk workers write into by offset. Shared by
/// reference; `write_at` never moves a cursor.
#[derive(Debug)]
pub struct PartFile {
    file: File,
    part: PathBuf,
    target: PathBuf,
    size: u64,
}

impl PartFile {
    /// Creates (or truncates) `<target>.part` and reserves `size` bytes.
    pub fn create(target: &Path, size: u64) -> Result<Self> {
        let part = temp_path(target);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&part)
            .with_context(|| format!("create {}", part.display()))?;
        let out = Self {
            file,
            part,
            target: target.to_path_buf(),
            size,
        };
        if let Err(e) = out.reserve() {
            out.abandon();
            return Err(e);
        }
        Ok(out)
    }

    fn reserve(&self) -> Result<()> {
        if self.size == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            // SAFETY: the descriptor is owned by `self.file` and stays open for the call.
            let rc = unsafe { libc::posix_fallocate(self.file.as_raw_fd(), 0, self.size as libc::off_t) };
            if rc == 0 {
                return Ok(());
            }
            tracing::debug!(errno = rc, path = %self.part.display(), "fallocate unsupported, extending with set_len");
        }
        self.file
            .set_len(self.size)
            .with_context(|| format!("reserve {} bytes for {}", self.size, self.part.display()))
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn part_path(&self) -> &Path {
        &self.part
    }

    /// Writes all of `data` at `offset`; writes past the reserved size are rejected.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if !end.is_some_and(|end| end <= self.size) {
            bail!(
                "write of {} bytes at {} past the end of {} ({} bytes)",
                data.len(),
                offset,
                self.part.display(),
                self.size
            );
        }
        positional_write(&self.file, offset, data)
            .with_context(|| format!("write {} bytes at {} to {}", data.len(), offset, self.part.display()))
    }

    /// Flushes to disk and renames the part file onto the target.
    pub fn commit(self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("sync {}", self.part.display()))?;
        let Self { file, part, target, .. } = self;
        drop(file);
        std::fs::rename(&part, &target)
            .with_context(|| format!("rename {} to {}", part.display(), target.display()))
    }

    /// Closes and removes the part file; the target is left untouched.
    pub fn abandon(self) {
        let Self { file, part, .. } = self;
        drop(file);
        if let Err(e) = std::fs::remove_file(&part) {
            tracing::debug!(path = %part.display(), error = %e, "part file not removed");
        }
    }
}

#[cfg(unix)]
fn positional_write(file: &File, offset: u64, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn positional_write(file: &File, mut offset: u64, mut data: &[u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        let n = file.seek_write(data, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}
