//! Local file primitives for file-backed transfers.
//!
//! Downloads land in a sized `.part` file that chunk workers fill with
//! positional writes, then the file is synced and renamed into place.
//! Uploads read the source positionally so every chunk body can be replayed
//! on retry.

mod part;
mod source;

pub use part::PartFile;
pub use source::{read_at, FileSource};

use std::path::{Path, PathBuf};

pub const PART_SUFFIX: &str = ".part";

/// `file.iso` → `file.iso.part`.
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}
