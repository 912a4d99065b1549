//! blockdiff-sink: where changed blocks and the final map are written
//!
//! Two backends implement [`BlockSink`]:
//!   - `files`: one loose file per block in a directory
//!   - `archive`: entries appended to a single uncompressed tar file
//!
//! Both name blocks through an injected [`NameStrategy`] and store the map
//! under a fixed side-entry name. `snapshot` reads either layout back, and
//! `restore` rebuilds a file from a chain of snapshots.

pub mod archive;
pub mod files;
pub mod naming;
pub mod restore;
pub mod snapshot;

use std::path::Path;

use blockdiff_core::{BlockdiffResult, SinkMode};

pub use archive::TarSink;
pub use files::DirSink;
pub use naming::{padded_names, NameStrategy};
pub use restore::{restore, RestorePlan, RestoreSummary};
pub use snapshot::{open_snapshot, DirSnapshot, SnapshotReader, TarSnapshot};

/// Write target for changed blocks and the serialized map
pub trait BlockSink {
    /// Persist one block under the name derived from `index`.
    fn write_block(&mut self, index: u64, data: &[u8]) -> BlockdiffResult<()>;

    /// Persist the serialized map under `name`.
    fn write_map(&mut self, name: &str, data: &[u8]) -> BlockdiffResult<()>;

    /// Finalize the backing resource. Writing after `close` is an error.
    fn close(&mut self) -> BlockdiffResult<()> {
        Ok(())
    }
}

/// Build the sink for `mode` at `destination`.
pub fn open_sink(
    mode: SinkMode,
    destination: &Path,
    names: NameStrategy,
) -> BlockdiffResult<Box<dyn BlockSink>> {
    let sink: Box<dyn BlockSink> = match mode {
        SinkMode::Files => Box::new(DirSink::create(destination, names)?),
        SinkMode::Tar => Box::new(TarSink::create(destination, names)?),
    };
    tracing::debug!(%mode, destination = %destination.display(), "sink opened");
    Ok(sink)
}
