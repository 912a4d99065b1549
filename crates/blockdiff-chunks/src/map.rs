//! Block map: the per-run record of block index → content hash.
//!
//! On disk the map is a JSON object:
//!
//! ```json
//! {"version":1,"blocksize":65536,"totalbytes":131072,"hashes":{"0":"…","1":"…"}}
//! ```
//!
//! Index keys are written as decimal strings. A map from a previous run is
//! loaded read-only and must agree with the current run on version, block
//! size, and total size before any block is processed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use blockdiff_core::{BlockdiffError, BlockdiffResult, MapField};

use crate::source::BlockSource;

/// Current map format version
pub const MAP_VERSION: i64 = 1;

/// Serialized form of a block map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    /// Signed, so any integer version in a foreign map compares as a mismatch
    pub version: i64,
    pub blocksize: u64,
    pub totalbytes: u64,
    /// Ordered by index; serde_json renders the keys as decimal strings
    pub hashes: BTreeMap<u64, String>,
}

impl MapRecord {
    /// Empty map for a run over `source`
    pub fn for_source(source: &BlockSource) -> Self {
        MapRecord {
            version: MAP_VERSION,
            blocksize: source.block_size(),
            totalbytes: source.total_bytes(),
            hashes: BTreeMap::new(),
        }
    }

    pub fn from_bytes(data: &[u8]) -> BlockdiffResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_bytes(&self) -> BlockdiffResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Read and parse a map file.
    pub fn read_from(path: &Path) -> BlockdiffResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn hash_at(&self, index: u64) -> Option<&str> {
        self.hashes.get(&index).map(String::as_str)
    }

    /// Number of recorded blocks
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// The current run's map plus the optional previous map it is diffed against
#[derive(Debug)]
pub struct BlockMap {
    current: MapRecord,
    previous: Option<MapRecord>,
}

impl BlockMap {
    pub fn new(source: &BlockSource) -> Self {
        BlockMap {
            current: MapRecord::for_source(source),
            previous: None,
        }
    }

    pub fn current(&self) -> &MapRecord {
        &self.current
    }

    pub fn previous(&self) -> Option<&MapRecord> {
        self.previous.as_ref()
    }

    /// Load the previous run's map, then validate it.
    ///
    /// `None`, an empty path, or a path that is not an existing file all leave
    /// the previous map unset, in which case every block counts as changed.
    pub fn load_previous(&mut self, path: Option<&Path>) -> BlockdiffResult<()> {
        self.previous = None;
        match path {
            Some(p) if p.is_file() => {
                debug!(path = %p.display(), "loading previous map");
                self.previous = Some(MapRecord::read_from(p)?);
            }
            Some(p) if !p.as_os_str().is_empty() => {
                warn!(path = %p.display(), "previous map not found, treating all blocks as changed");
            }
            _ => {}
        }
        self.validate()
    }

    /// Install an already-parsed previous map, then validate it.
    pub fn set_previous(&mut self, previous: MapRecord) -> BlockdiffResult<()> {
        self.previous = Some(previous);
        self.validate()
    }

    /// Check the previous map against the current run's configuration.
    pub fn validate(&self) -> BlockdiffResult<()> {
        let Some(prev) = &self.previous else {
            return Ok(());
        };

        let checks: [(MapField, i128, i128); 3] = [
            (MapField::Version, self.current.version.into(), prev.version.into()),
            (MapField::BlockSize, self.current.blocksize.into(), prev.blocksize.into()),
            (MapField::TotalBytes, self.current.totalbytes.into(), prev.totalbytes.into()),
        ];
        for (field, expected, found) in checks {
            if expected != found {
                return Err(BlockdiffError::MapMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Record `hash` for block `index`. Returns true if the block changed.
    ///
    /// A block is changed when there is no previous map, the previous map has
    /// no entry at `index`, or its entry differs from `hash`.
    pub fn record_hash(&mut self, index: u64, hash: String) -> bool {
        let changed = match &self.previous {
            Some(prev) => prev.hash_at(index) != Some(hash.as_str()),
            None => true,
        };
        self.current.hashes.insert(index, hash);
        changed
    }

    pub fn serialize(&self) -> BlockdiffResult<Vec<u8>> {
        self.current.to_bytes()
    }

    /// Write the current map to `path`.
    pub fn write_to_file(&self, path: &Path) -> BlockdiffResult<()> {
        std::fs::write(path, self.serialize()?)?;
        Ok(())
    }

    /// Write the current map to `path` if one is given; otherwise do nothing.
    pub fn persist_optional(&self, path: Option<&Path>) -> BlockdiffResult<()> {
        match path {
            Some(p) if !p.as_os_str().is_empty() => self.write_to_file(p),
            _ => Ok(()),
        }
    }

    /// Hand over the finished map.
    pub fn into_current(self) -> MapRecord {
        self.current
    }
}
