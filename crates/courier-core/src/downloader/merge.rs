//! Concatenate chunk files into the destination, in chunk order.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::checksum::HashingWriter;
use crate::storage::PartFile;

/// Write `chunk_paths` in order into `dest` via `<dest>.part`, returning the
/// SHA-1 of the merged bytes when `hash` is set. On error the `.part` file is
/// removed and `dest` is untouched.
pub(super) fn merge_chunks(
    chunk_paths: &[PathBuf],
    dest: &Path,
    file_size: u64,
    hash: bool,
) -> Result<Option<String>> {
    let mut sink = HashingWriter::new(PartFile::with_size(dest, file_size)?, hash);
    for path in chunk_paths {
        let copied = File::open(path)
            .and_then(|mut chunk| io::copy(&mut chunk, &mut sink))
            .with_context(|| format!("merge chunk {}", path.display()));
        if let Err(e) = copied {
            sink.finish().0.discard();
            return Err(e);
        }
    }
    let (part, digest) = sink.finish();
    if part.written() != file_size {
        let written = part.written();
        part.discard();
        anyhow::bail!(
            "merged {} bytes into {}, expected {}",
            written,
            dest.display(),
            file_size
        );
    }
    part.commit()?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::temp_path;

    fn write_chunks(dir: &Path, parts: &[&[u8]]) -> Vec<PathBuf> {
        parts
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let path = dir.join(format!("{}_chunk", i));
                std::fs::write(&path, p).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn merges_in_index_order_with_digest() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_chunks(dir.path(), &[b"he", b"ll", b"o\n"]);
        let dest = dir.path().join("out.txt");
        let digest = merge_chunks(&paths, &dest, 6, true).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello\n");
        assert_eq!(digest.as_deref(), Some("f572d396fae9206628714fb2ce00f72e94f2258f"));
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn short_chunks_fail_without_destination() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_chunks(dir.path(), &[b"he", b"l"]);
        let dest = dir.path().join("out.txt");
        assert!(merge_chunks(&paths, &dest, 6, false).is_err());
        assert!(!dest.exists());
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn missing_chunk_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_chunks(dir.path(), &[b"ab"]);
        paths.push(dir.path().join("1_chunk"));
        let dest = dir.path().join("out.bin");
        assert!(merge_chunks(&paths, &dest, 4, false).is_err());
        assert!(!dest.exists());
    }
}
