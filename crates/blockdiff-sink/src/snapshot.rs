//! Read access to what a sink wrote
//!
//! A snapshot is either a directory of loose block files or a tar archive.
//! Tar archives are indexed once by header (name → data offset, size) and
//! blocks are then read by seeking, so only one block is held in memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blockdiff_core::BlockdiffResult;

/// Looks up sink entries by name
pub trait SnapshotReader {
    /// Entry contents, or `None` if the snapshot has no such entry.
    fn read_entry(&mut self, name: &str) -> BlockdiffResult<Option<Vec<u8>>>;

    fn contains(&self, name: &str) -> bool;
}

/// Open a directory or tar archive written by one of the sinks.
pub fn open_snapshot(path: &Path) -> BlockdiffResult<Box<dyn SnapshotReader>> {
    if path.is_dir() {
        Ok(Box::new(DirSnapshot::new(path)))
    } else {
        Ok(Box::new(TarSnapshot::open(path)?))
    }
}

pub struct DirSnapshot {
    dir: PathBuf,
}

impl DirSnapshot {
    pub fn new(dir: &Path) -> Self {
        DirSnapshot {
            dir: dir.to_path_buf(),
        }
    }
}

impl SnapshotReader for DirSnapshot {
    fn read_entry(&mut self, name: &str) -> BlockdiffResult<Option<Vec<u8>>> {
        match std::fs::read(self.dir.join(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.dir.join(name).is_file()
    }
}

#[derive(Debug, Clone, Copy)]
struct EntrySpan {
    offset: u64,
    size: u64,
}

pub struct TarSnapshot {
    file: File,
    entries: HashMap<String, EntrySpan>,
}

impl TarSnapshot {
    pub fn open(path: &Path) -> BlockdiffResult<Self> {
        let file = File::open(path)?;
        let mut entries = HashMap::new();
        {
            let mut archive = tar::Archive::new(&file);
            for entry in archive.entries()? {
                let entry = entry?;
                let name = entry.path()?.to_string_lossy().into_owned();
                // Later entries with the same name win, as with tar extraction
                entries.insert(
                    name,
                    EntrySpan {
                        offset: entry.raw_file_position(),
                        size: entry.size(),
                    },
                );
            }
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "tar snapshot indexed");
        Ok(TarSnapshot { file, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotReader for TarSnapshot {
    fn read_entry(&mut self, name: &str) -> BlockdiffResult<Option<Vec<u8>>> {
        let Some(span) = self.entries.get(name).copied() else {
            return Ok(None);
        };
        self.file.seek(SeekFrom::Start(span.offset))?;
        let mut data = vec![0u8; span.size as usize];
        self.file.read_exact(&mut data)?;
        Ok(Some(data))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarSink;
    use crate::naming::padded_names;
    use crate::BlockSink;
    use tempfile::TempDir;

    #[test]
    fn tar_snapshot_reads_entries_by_seeking() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap.tar");
        let mut sink = TarSink::create(&path, padded_names("", 3, ".block")).unwrap();
        // Sizes straddle the 512-byte tar record boundary
        sink.write_block(0, &[1u8; 511]).unwrap();
        sink.write_block(1, &[2u8; 513]).unwrap();
        sink.write_block(4, b"").unwrap();
        sink.close().unwrap();

        let mut snap = TarSnapshot::open(&path).unwrap();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.read_entry("001.block").unwrap().unwrap(), vec![2u8; 513]);
        assert_eq!(snap.read_entry("000.block").unwrap().unwrap(), vec![1u8; 511]);
        assert_eq!(snap.read_entry("004.block").unwrap().unwrap(), Vec::<u8>::new());
        assert!(snap.read_entry("002.block").unwrap().is_none());
        assert!(snap.contains("004.block"));
        assert!(!snap.contains("002.block"));
    }

    #[test]
    fn dir_snapshot_missing_entry_is_none() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("x"), b"1").unwrap();
        let mut snap = DirSnapshot::new(tmp.path());
        assert_eq!(snap.read_entry("x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(snap.read_entry("y").unwrap(), None);
    }

    #[test]
    fn missing_archive_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = open_snapshot(&tmp.path().join("absent.tar")).err().unwrap();
        assert!(matches!(err, blockdiff_core::BlockdiffError::Io(_)));
    }
}
