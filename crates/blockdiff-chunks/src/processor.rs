//! Single-pass diff loop: stream → hash → compare → hand off.
//!
//! Blocks are processed strictly in index order, one at a time. Change
//! detection is keyed by index, so reordering would break comparison against
//! a map built by an earlier run.

use tracing::{debug, info};

use blockdiff_core::BlockdiffResult;

use crate::hash::HashFunction;
use crate::map::BlockMap;
use crate::source::BlockSource;

/// Receives every block after it has been hashed and compared
pub trait BlockHandler {
    fn handle_block(&mut self, block: &[u8], index: u64, changed: bool) -> BlockdiffResult<()>;
}

impl<F> BlockHandler for F
where
    F: FnMut(&[u8], u64, bool) -> BlockdiffResult<()>,
{
    fn handle_block(&mut self, block: &[u8], index: u64, changed: bool) -> BlockdiffResult<()> {
        self(block, index, changed)
    }
}

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks streamed, including a trailing short block
    pub blocks: u64,
    /// Blocks reported as changed
    pub changed: u64,
    /// Payload bytes streamed
    pub bytes: u64,
}

impl RunSummary {
    pub fn unchanged(&self) -> u64 {
        self.blocks - self.changed
    }
}

pub struct DiffProcessor<'a, H, B> {
    source: &'a BlockSource,
    map: &'a mut BlockMap,
    hasher: H,
    handler: B,
}

impl<'a, H, B> DiffProcessor<'a, H, B>
where
    H: HashFunction,
    B: BlockHandler,
{
    pub fn new(source: &'a BlockSource, map: &'a mut BlockMap, hasher: H, handler: B) -> Self {
        DiffProcessor {
            source,
            map,
            hasher,
            handler,
        }
    }

    /// Process every block of the source.
    ///
    /// The previous map is re-validated first, so a mismatch fails before the
    /// file is opened. Any error from reading, hashing, or the handler aborts
    /// the run where it happens; blocks already handed off stay handed off.
    pub fn run(mut self) -> BlockdiffResult<RunSummary> {
        self.map.validate()?;

        info!(
            path = %self.source.path().display(),
            block_size = self.source.block_size(),
            total_bytes = self.source.total_bytes(),
            has_previous = self.map.previous().is_some(),
            "diff started"
        );

        let mut summary = RunSummary::default();
        for (index, block) in (0u64..).zip(self.source.stream_blocks()?) {
            let block = block?;
            let hash = self.hasher.hash_block(&block)?;
            let changed = self.map.record_hash(index, hash);
            debug!(index, changed, len = block.len(), "block");

            self.handler.handle_block(&block, index, changed)?;

            summary.blocks += 1;
            summary.bytes += block.len() as u64;
            if changed {
                summary.changed += 1;
            }
        }

        info!(
            blocks = summary.blocks,
            changed = summary.changed,
            bytes = summary.bytes,
            "diff finished"
        );
        Ok(summary)
    }
}
