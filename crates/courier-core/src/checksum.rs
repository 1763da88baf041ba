//! File and stream checksums (SHA-1, MD5, SHA-256).
//!
//! Files are hashed in bounded chunks. `HashingWriter` computes a digest while
//! bytes stream to disk, so downloads and chunk merges verify in the same pass.

use anyhow::{Context, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Checksums of one file, lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumSet {
    pub sha1: String,
    pub md5: String,
    pub sha256: String,
}

/// Compute SHA-1, MD5 and SHA-256 of everything `reader` yields, in one pass.
pub fn calc_reader<R: Read>(mut reader: R) -> io::Result<ChecksumSet> {
    let mut sha1 = Sha1::new();
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha1.update(&buf[..n]);
        md5.update(&buf[..n]);
        sha256.update(&buf[..n]);
    }
    Ok(ChecksumSet {
        sha1: hex::encode(sha1.finalize()),
        md5: hex::encode(md5.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}

/// Compute all checksums of a file.
pub fn calc_path(path: &Path) -> Result<ChecksumSet> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    calc_reader(f).with_context(|| format!("read {}", path.display()))
}

fn digest_path<D: Digest>(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    digest_path::<Sha256>(path)
}

/// Compute SHA-1 of a file and return the digest as lowercase hex.
pub fn sha1_path(path: &Path) -> Result<String> {
    digest_path::<Sha1>(path)
}

/// True when a local file exists and its SHA-1 equals `remote_sha1`.
/// An empty remote checksum never matches.
pub fn local_matches_sha1(path: &Path, remote_sha1: &str) -> Result<bool> {
    if remote_sha1.is_empty() || !path.is_file() {
        return Ok(false);
    }
    Ok(sha1_path(path)?.eq_ignore_ascii_case(remote_sha1))
}

/// Writer that forwards bytes to `inner` and feeds them to a SHA-1 digest.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Option<Sha1>,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    /// `hash = false` makes this a plain counting writer.
    pub fn new(inner: W, hash: bool) -> Self {
        Self {
            inner,
            hasher: hash.then(<Sha1 as Digest>::new),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Returns the inner writer and the hex digest, if hashing was enabled.
    pub fn finish(self) -> (W, Option<String>) {
        let digest = self.hasher.map(|h| hex::encode(h.finalize()));
        (self.inner, digest)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(h) = self.hasher.as_mut() {
            h.update(&buf[..n]);
        }
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn calc_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let sums = calc_path(f.path()).unwrap();
        assert_eq!(
            sums.sha256,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert_eq!(sums.sha1, "f572d396fae9206628714fb2ce00f72e94f2258f");
        assert_eq!(sums.md5, "b1946ac92492d2347c6235b4d2611184");
        assert_eq!(sha1_path(f.path()).unwrap(), sums.sha1);
    }

    #[test]
    fn local_matches_sha1_requires_file_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        assert!(!local_matches_sha1(&path, "f572d396fae9206628714fb2ce00f72e94f2258f").unwrap());
        std::fs::write(&path, b"hello\n").unwrap();
        assert!(local_matches_sha1(&path, "f572d396fae9206628714fb2ce00f72e94f2258f").unwrap());
        assert!(local_matches_sha1(&path, "F572D396FAE9206628714FB2CE00F72E94F2258F").unwrap());
        assert!(!local_matches_sha1(&path, "").unwrap());
        assert!(!local_matches_sha1(&path, "0000").unwrap());
    }

    #[test]
    fn hashing_writer_tees_and_digests() {
        let mut w = HashingWriter::new(Vec::new(), true);
        w.write_all(b"hel").unwrap();
        w.write_all(b"lo\n").unwrap();
        assert_eq!(w.written(), 6);
        let (bytes, digest) = w.finish();
        assert_eq!(bytes, b"hello\n");
        assert_eq!(
            digest.as_deref(),
            Some("f572d396fae9206628714fb2ce00f72e94f2258f")
        );
    }

    #[test]
    fn hashing_writer_without_digest() {
        let mut w = HashingWriter::new(Vec::new(), false);
        w.write_all(b"abc").unwrap();
        let (_, digest) = w.finish();
        assert!(digest.is_none());
    }
}
