//! blockdiff-chunks: fixed-size block diffing of a single file
//!
//! # Overview
//! - `source`: streams a file as equal-size blocks and tracks consumption
//! - `hash`: pluggable block digests (SHA-1, BLAKE3, or any closure)
//! - `map`: the JSON block map and change detection against a previous run
//! - `processor`: the single-pass loop tying the three together

pub mod hash;
pub mod map;
pub mod processor;
pub mod source;

// Convenience re-exports for the most common operations
pub use hash::{blake3_hex, sha1_hex, AlgorithmHasher, Blake3Hasher, HashFunction, Sha1Hasher};
pub use map::{BlockMap, MapRecord, MAP_VERSION};
pub use processor::{BlockHandler, DiffProcessor, RunSummary};
pub use source::{BlockSource, BlockStream};
