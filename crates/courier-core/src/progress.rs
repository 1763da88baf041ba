//! Progress reporting hooks for transfers.
//!
//! The core never renders anything; it reports byte counts to a `ProgressMgr`
//! supplied by the caller. Pass `None` to run without progress.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Identifier of one progress bar/line, handed out by `ProgressMgr::new_progress`.
pub type ProgressId = usize;

/// Receiver of transfer progress. Implementations must be cheap and thread-safe:
/// chunk workers call `advance` concurrently.
pub trait ProgressMgr: Send + Sync {
    /// Start tracking a transfer of `total` bytes (0 when unknown).
    fn new_progress(&self, total: u64, action: &str, path: &str) -> ProgressId;
    /// `bytes` more bytes were transferred.
    fn advance(&self, id: ProgressId, bytes: u64);
    /// Take back `bytes` reported by an attempt whose data was thrown away.
    fn rewind(&self, id: ProgressId, bytes: u64);
    /// Switch the displayed state (e.g. "Merging").
    fn set_state(&self, id: ProgressId, state: &str);
    /// Transfer is over, successfully or not.
    fn remove(&self, id: ProgressId);
}

/// Progress handle scoped to one transfer; removes itself on drop.
pub(crate) struct ProgressGuard<'a> {
    mgr: &'a dyn ProgressMgr,
    id: ProgressId,
}

impl<'a> ProgressGuard<'a> {
    pub(crate) fn start(
        mgr: Option<&'a dyn ProgressMgr>,
        total: u64,
        action: &str,
        path: &str,
    ) -> Option<Self> {
        mgr.map(|mgr| ProgressGuard {
            id: mgr.new_progress(total, action, path),
            mgr,
        })
    }

    #[cfg(test)]
    pub(crate) fn id(&self) -> ProgressId {
        self.id
    }

    pub(crate) fn handle(&self) -> ProgressHandle<'a> {
        ProgressHandle {
            mgr: self.mgr,
            id: self.id,
        }
    }

    pub(crate) fn set_state(&self, state: &str) {
        self.mgr.set_state(self.id, state);
    }
}

/// Copyable reference to a running progress entry, shared with worker threads.
#[derive(Clone, Copy)]
pub(crate) struct ProgressHandle<'a> {
    mgr: &'a dyn ProgressMgr,
    id: ProgressId,
}

impl ProgressHandle<'_> {
    pub(crate) fn advance(&self, bytes: u64) {
        self.mgr.advance(self.id, bytes);
    }

    pub(crate) fn rewind(&self, bytes: u64) {
        if bytes > 0 {
            self.mgr.rewind(self.id, bytes);
        }
    }
}

/// Writer that reports every written byte to a progress entry.
pub(crate) struct ProgressWriter<'a, W> {
    inner: W,
    handle: Option<ProgressHandle<'a>>,
    reported: u64,
}

impl<'a, W: Write> ProgressWriter<'a, W> {
    pub(crate) fn new(inner: W, handle: Option<ProgressHandle<'a>>) -> Self {
        Self {
            inner,
            handle,
            reported: 0,
        }
    }

    /// Bytes passed to the progress entry through this writer.
    pub(crate) fn reported(&self) -> u64 {
        self.reported
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(h) = &self.handle {
            h.advance(n as u64);
            self.reported += n as u64;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.mgr.remove(self.id);
    }
}

/// Counts bytes per transfer and logs state changes through `tracing`.
/// Used by the CLI and handy in tests.
#[derive(Default)]
pub struct LogProgress {
    next_id: AtomicUsize,
    totals: Mutex<Vec<(ProgressId, u64, AtomicU64)>>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes reported so far for `id` (None once removed).
    pub fn transferred(&self, id: ProgressId) -> Option<u64> {
        let totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        totals
            .iter()
            .find(|(i, _, _)| *i == id)
            .map(|(_, _, done)| done.load(Ordering::Relaxed))
    }
}

impl ProgressMgr for LogProgress {
    fn new_progress(&self, total: u64, action: &str, path: &str) -> ProgressId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!("{} {} ({} bytes)", action, path, total);
        self.totals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, total, AtomicU64::new(0)));
        id
    }

    fn advance(&self, id: ProgressId, bytes: u64) {
        let totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, _, done)) = totals.iter().find(|(i, _, _)| *i == id) {
            done.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    fn rewind(&self, id: ProgressId, bytes: u64) {
        let totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, _, done)) = totals.iter().find(|(i, _, _)| *i == id) {
            let _ = done.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(bytes)));
        }
    }

    fn set_state(&self, id: ProgressId, state: &str) {
        tracing::info!("[{}] {}", id, state);
    }

    fn remove(&self, id: ProgressId) {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = totals.iter().position(|(i, _, _)| *i == id) {
            let (_, total, done) = totals.remove(pos);
            tracing::debug!("[{}] done: {} of {} bytes", id, done.load(Ordering::Relaxed), total);
        }
    }
}

/// Reader that reports every byte read to a progress entry.
pub(crate) struct ProgressReader<'a, R> {
    inner: R,
    handle: Option<ProgressHandle<'a>>,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub(crate) fn new(inner: R, handle: Option<ProgressHandle<'a>>) -> Self {
        Self { inner, handle }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(h) = &self.handle {
            h.advance(n as u64);
        }
        Ok(n)
    }
}
