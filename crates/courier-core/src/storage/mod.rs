//! Download targets on disk.
//!
//! Targets are written to `<dest>.part` and renamed onto the final path only
//! once complete, so an interrupted or rejected transfer never leaves a
//! half-written file under the real name.

mod part_file;

pub use part_file::PartFile;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Suffix of in-progress files.
pub const TEMP_SUFFIX: &str = ".part";

/// `<final_path>.part` (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Join `dir` and `file_name`, creating `dir` if needed. An empty `dir` means the current directory.
pub fn create_file_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Ok(PathBuf::from(file_name));
    }
    std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    Ok(dir.join(file_name))
}
