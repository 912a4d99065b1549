//! Fixed-size block reader over a single file
//!
//! Blocks are cut at constant offsets (`index * block_size`); the last block
//! may be shorter. Nothing is realigned after inserts or deletions.
//!
//! Consumption is tracked in a `Cell` so that a per-block callback holding a
//! shared reference to the source can report progress while the stream runs.

use std::cell::Cell;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use blockdiff_core::{BlockdiffError, BlockdiffResult};

/// An input file split into equal-size blocks
#[derive(Debug)]
pub struct BlockSource {
    path: PathBuf,
    block_size: u64,
    /// File length captured at construction, fixed for the run
    total_bytes: u64,
    /// Bytes accounted as consumed, clamped to `total_bytes`
    bytes_read: Cell<u64>,
}

impl BlockSource {
    /// Open `path` for block streaming. The block size must be positive.
    pub fn open(path: &Path, block_size: u64) -> BlockdiffResult<Self> {
        if block_size == 0 {
            return Err(BlockdiffError::Config(
                "block size must be a positive number of bytes".into(),
            ));
        }
        let total_bytes = std::fs::metadata(path)?.len();

        Ok(BlockSource {
            path: path.to_path_buf(),
            block_size,
            total_bytes,
            bytes_read: Cell::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.get()
    }

    /// Number of *whole* blocks: `floor(total_bytes / block_size)`.
    ///
    /// A trailing short block is still streamed but is not counted here.
    pub fn block_count(&self) -> u64 {
        self.total_bytes / self.block_size
    }

    /// Fraction of the file consumed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.bytes_read.get() as f64 / self.total_bytes.max(1) as f64
    }

    /// Start a new pass over the file from offset 0.
    ///
    /// Resets `bytes_read` and reopens the file. Running two streams from the
    /// same source at once is not supported; they would share the counter.
    pub fn stream_blocks(&self) -> BlockdiffResult<BlockStream<'_>> {
        self.bytes_read.set(0);
        let file = File::open(&self.path)?;
        Ok(BlockStream {
            source: self,
            file: Some(file),
        })
    }

    fn advance(&self) {
        let next = self
            .bytes_read
            .get()
            .saturating_add(self.block_size)
            .min(self.total_bytes);
        self.bytes_read.set(next);
    }
}

/// Lazy, single-use sequence of blocks from a [`BlockSource`].
///
/// Yields `block_size` bytes per item, then one final short block if the
/// file length is not a multiple of the block size. The file handle is dropped
/// as soon as the end is reached or a read fails.
pub struct BlockStream<'a> {
    source: &'a BlockSource,
    file: Option<File>,
}

impl Iterator for BlockStream<'_> {
    type Item = BlockdiffResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.file.as_mut()?;
        let source = self.source;

        // Reserve no more than what is left of the file; at EOF nothing is reserved
        let remaining = source.total_bytes.saturating_sub(source.bytes_read());
        let capacity = match usize::try_from(source.block_size.min(remaining)) {
            Ok(n) => n,
            Err(_) => {
                self.file = None;
                return Some(Err(BlockdiffError::Config(format!(
                    "block size {} does not fit in memory on this platform",
                    source.block_size
                ))));
            }
        };
        let mut block = Vec::with_capacity(capacity);

        let result = file.by_ref().take(source.block_size).read_to_end(&mut block);
        source.advance();

        match result {
            Ok(0) => {
                self.file = None;
                None
            }
            Ok(_) => Some(Ok(block)),
            Err(e) => {
                self.file = None;
                Some(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::NamedTempFile;

    fn source_with(content: &[u8], block_size: u64) -> (NamedTempFile, BlockSource) {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), content).unwrap();
        let source = BlockSource::open(tmp.path(), block_size).unwrap();
        (tmp, source)
    }

    #[test]
    fn zero_block_size_is_config_error() {
        let tmp = NamedTempFile::new().unwrap();
        let err = BlockSource::open(tmp.path(), 0).unwrap_err();
        assert!(matches!(err, BlockdiffError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BlockSource::open(Path::new("/nonexistent/blockdiff/input.img"), 512).unwrap_err();
        assert!(matches!(err, BlockdiffError::Io(_)));
    }

    #[test]
    fn exact_multiple_yields_full_blocks() {
        let data: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        let (_tmp, source) = source_with(&data, 1024);

        let blocks: Vec<Vec<u8>> = source.stream_blocks().unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.len() == 1024));
        assert_eq!(blocks.concat(), data);
        assert_eq!(source.block_count(), 4);
    }

    #[test]
    fn short_tail_is_streamed_but_not_counted() {
        let data = vec![7u8; 2500];
        let (_tmp, source) = source_with(&data, 1000);

        let blocks: Vec<Vec<u8>> = source.stream_blocks().unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].len(), 500);
        assert_eq!(source.block_count(), 2);
    }

    #[test]
    fn empty_file_yields_nothing() {
        let (_tmp, source) = source_with(b"", 64);
        assert_eq!(source.stream_blocks().unwrap().count(), 0);
        assert_eq!(source.block_count(), 0);
        assert_eq!(source.progress(), 0.0);
    }

    #[test]
    fn huge_block_size_on_small_file_yields_one_block() {
        let (_tmp, source) = source_with(b"tiny", 1u64 << 46);
        let blocks: Vec<Vec<u8>> = source.stream_blocks().unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(blocks, vec![b"tiny".to_vec()]);
        assert_eq!(source.block_count(), 0);
        assert_eq!(source.progress(), 1.0);
    }

    #[test]
    fn stream_ends_and_stays_ended() {
        let (_tmp, source) = source_with(b"abc", 2);
        let mut stream = source.stream_blocks().unwrap();
        assert_eq!(stream.next().unwrap().unwrap(), b"ab");
        assert_eq!(stream.next().unwrap().unwrap(), b"c");
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn restarting_resets_bytes_read() {
        let (_tmp, source) = source_with(&[1u8; 300], 100);
        assert_eq!(source.stream_blocks().unwrap().count(), 3);
        assert_eq!(source.bytes_read(), 300);

        let mut stream = source.stream_blocks().unwrap();
        assert_eq!(source.bytes_read(), 0);
        stream.next().unwrap().unwrap();
        assert_eq!(source.bytes_read(), 100);
    }

    #[test]
    fn bytes_read_is_clamped_to_file_size() {
        let (_tmp, source) = source_with(&[0u8; 150], 100);
        let mut stream = source.stream_blocks().unwrap();
        stream.next().unwrap().unwrap();
        assert_eq!(source.bytes_read(), 100);
        stream.next().unwrap().unwrap();
        assert_eq!(source.bytes_read(), 150);
        assert!(stream.next().is_none());
        assert_eq!(source.bytes_read(), 150);
        assert_eq!(source.progress(), 1.0);
    }

    proptest! {
        #[test]
        fn block_count_is_floor_division(len in 0usize..=8192, block_size in 1u64..=2048) {
            let (_tmp, source) = source_with(&vec![0xA5u8; len], block_size);
            prop_assert_eq!(source.block_count(), len as u64 / block_size);
        }

        #[test]
        fn progress_is_monotonic_and_completes(len in 1usize..=8192, block_size in 1u64..=1024) {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (_tmp, source) = source_with(&data, block_size);

            let mut last = 0.0f64;
            let mut rebuilt = Vec::with_capacity(len);
            for block in source.stream_blocks().unwrap() {
                let block = block.unwrap();
                let p = source.progress();
                prop_assert!(p >= last, "progress went backwards: {} -> {}", last, p);
                prop_assert!(p <= 1.0);
                last = p;
                rebuilt.extend_from_slice(&block);
            }
            prop_assert_eq!(last, 1.0);
            prop_assert_eq!(rebuilt, data, "blocks must cover the file in order");
        }
    }
}
