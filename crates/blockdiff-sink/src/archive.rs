//! Tar sink: blocks and the map are appended as entries of one archive.
//!
//! The archive is created exclusively; an existing file at the destination
//! is never overwritten. Entries carry mode 0644 and mtime 0 so that two runs
//! over the same data produce byte-identical archives.

use std::fs::{File, OpenOptions};
use std::path::Path;

use blockdiff_core::BlockdiffResult;

use crate::naming::NameStrategy;
use crate::BlockSink;

pub struct TarSink {
    builder: Option<tar::Builder<File>>,
    names: NameStrategy,
}

impl TarSink {
    pub fn create(path: &Path, names: NameStrategy) -> BlockdiffResult<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(TarSink {
            builder: Some(tar::Builder::new(file)),
            names,
        })
    }

    fn append(&mut self, name: &str, data: &[u8]) -> BlockdiffResult<()> {
        let builder = self
            .builder
            .as_mut()
            .ok_or_else(|| std::io::Error::other(format!("tar sink closed, cannot add {name}")))?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder.append_data(&mut header, name, data)?;
        Ok(())
    }
}

impl BlockSink for TarSink {
    fn write_block(&mut self, index: u64, data: &[u8]) -> BlockdiffResult<()> {
        let name = (self.names)(index);
        self.append(&name, data)
    }

    fn write_map(&mut self, name: &str, data: &[u8]) -> BlockdiffResult<()> {
        self.append(name, data)
    }

    fn close(&mut self) -> BlockdiffResult<()> {
        if let Some(builder) = self.builder.take() {
            let file = builder.into_inner()?;
            file.sync_all()?;
        }
        Ok(())
    }
}
