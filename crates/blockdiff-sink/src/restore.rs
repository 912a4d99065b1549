//! Rebuild a file from a chain of snapshots.
//!
//! Snapshots are given oldest first. Each one must come from a run that used
//! the previous snapshot's map as its input map, so that every block missing
//! from a newer snapshot is unchanged since an older one. Block `i` is taken
//! from the newest snapshot that holds it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use blockdiff_chunks::{AlgorithmHasher, HashFunction, MapRecord};
use blockdiff_core::{BlockdiffError, BlockdiffResult, HashAlgorithm};
use tracing::{debug, info};

use crate::naming::NameStrategy;
use crate::snapshot::{open_snapshot, SnapshotReader};

pub struct RestorePlan<'a> {
    /// Snapshot directories or archives, oldest first
    pub snapshots: &'a [PathBuf],
    /// Map file to restore against; defaults to the newest snapshot's map entry
    pub map: Option<&'a Path>,
    /// Name of the map entry inside a snapshot
    pub map_name: &'a str,
    pub names: &'a NameStrategy,
    /// Re-hash every block and compare with the map
    pub verify: Option<HashAlgorithm>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub blocks: u64,
    pub bytes: u64,
}

/// Write the file described by the plan's map to `output`.
pub fn restore(plan: &RestorePlan<'_>, output: &Path) -> BlockdiffResult<RestoreSummary> {
    if plan.snapshots.is_empty() {
        return Err(BlockdiffError::Config("restore needs at least one snapshot".into()));
    }

    let mut readers = plan
        .snapshots
        .iter()
        .map(|p| open_snapshot(p))
        .collect::<BlockdiffResult<Vec<Box<dyn SnapshotReader>>>>()?;

    let map = match plan.map {
        Some(path) => MapRecord::read_from(path)?,
        None => load_newest_map(&mut readers, plan.map_name)?,
    };

    let count = map.len() as u64;
    if !map.hashes.keys().copied().eq(0..count) {
        return Err(BlockdiffError::Restore(
            "map indices are not contiguous from 0".into(),
        ));
    }

    info!(
        snapshots = readers.len(),
        blocks = count,
        total_bytes = map.totalbytes,
        output = %output.display(),
        "restore started"
    );

    let hasher = plan.verify.map(AlgorithmHasher);
    let mut out = BufWriter::new(File::create(output)?);
    let mut summary = RestoreSummary::default();

    for (index, expected) in &map.hashes {
        let name = (plan.names)(*index);
        let (origin, block) = find_block(&mut readers, &name)?
            .ok_or_else(|| BlockdiffError::Restore(format!("block {index} ({name}) is in no snapshot")))?;

        if let Some(hasher) = &hasher {
            let actual = hasher.hash_block(&block)?;
            if &actual != expected {
                return Err(BlockdiffError::Restore(format!(
                    "block {index} from snapshot {origin} hashes to {actual}, map says {expected}"
                )));
            }
        }
        debug!(index, origin, len = block.len(), "block restored");

        out.write_all(&block)?;
        summary.blocks += 1;
        summary.bytes += block.len() as u64;
    }
    out.flush()?;

    if summary.bytes != map.totalbytes {
        return Err(BlockdiffError::Restore(format!(
            "restored {} bytes, map expects {}",
            summary.bytes, map.totalbytes
        )));
    }

    info!(blocks = summary.blocks, bytes = summary.bytes, "restore finished");
    Ok(summary)
}

fn load_newest_map(
    readers: &mut [Box<dyn SnapshotReader>],
    map_name: &str,
) -> BlockdiffResult<MapRecord> {
    let newest = readers
        .last_mut()
        .ok_or_else(|| BlockdiffError::Restore("no snapshots".into()))?;
    let data = newest
        .read_entry(map_name)?
        .ok_or_else(|| BlockdiffError::Restore(format!("newest snapshot has no {map_name} entry")))?;
    MapRecord::from_bytes(&data)
}

/// Search newest to oldest; returns the snapshot position and the block.
fn find_block(
    readers: &mut [Box<dyn SnapshotReader>],
    name: &str,
) -> BlockdiffResult<Option<(usize, Vec<u8>)>> {
    for (pos, reader) in readers.iter_mut().enumerate().rev() {
        if let Some(block) = reader.read_entry(name)? {
            return Ok(Some((pos, block)));
        }
    }
    Ok(None)
}
