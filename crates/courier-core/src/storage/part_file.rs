//! `<dest>.part` files: filled front to back, renamed onto `dest` when complete.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use super::temp_path;

/// Sequential writer for one download target.
///
/// Bytes go to `<dest>.part`; `commit` renames it onto `dest`, `discard`
/// deletes it. `dest` itself is never opened for writing.
pub struct PartFile {
    out: BufWriter<File>,
    temp_path: PathBuf,
    dest: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) `<dest>.part`.
    pub fn create(dest: &Path) -> Result<Self> {
        let temp_path = temp_path(dest);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("create {}", temp_path.display()))?;
        Ok(Self {
            out: BufWriter::with_capacity(256 * 1024, file),
            temp_path,
            dest: dest.to_path_buf(),
            written: 0,
        })
    }

    /// Like `create`, reserving `size` bytes up front when the size is known.
    pub fn with_size(dest: &Path, size: u64) -> Result<Self> {
        let part = Self::create(dest)?;
        reserve(part.out.get_ref(), size).with_context(|| format!("preallocate {}", part.temp_path.display()))?;
        Ok(part)
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn destination(&self) -> &Path {
        &self.dest
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, trim any unused reservation, sync and rename onto the destination.
    pub fn commit(self) -> Result<PathBuf> {
        let Self {
            out,
            temp_path,
            dest,
            written,
        } = self;
        let file = out
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flush {}", temp_path.display()))?;
        file.set_len(written)
            .and_then(|_| file.sync_all())
            .with_context(|| format!("sync {}", temp_path.display()))?;
        drop(file);
        std::fs::rename(&temp_path, &dest)
            .with_context(|| format!("rename {} to {}", temp_path.display(), dest.display()))?;
        Ok(dest)
    }

    /// Delete the `.part` file. Removal errors are logged, not returned.
    pub fn discard(self) {
        let Self { out, temp_path, .. } = self;
        drop(out);
        if let Err(e) = std::fs::remove_file(&temp_path) {
            tracing::warn!("could not remove {}: {}", temp_path.display(), e);
        }
    }
}

impl Write for PartFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.out.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Reserve `size` bytes. On Linux tries `posix_fallocate`; falls back to `set_len`.
fn reserve(file: &File, size: u64) -> io::Result<()> {
    if size == 0 {
        return Ok(());
    }
    #[cfg(target_os = "linux")]
    {
        let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
        if r == 0 {
            return Ok(());
        }
        tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
    }
    file.set_len(size)
}
