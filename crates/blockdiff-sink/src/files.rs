//! Loose-file sink: each block becomes `<dir>/<name(index)>`

use std::path::{Path, PathBuf};

use blockdiff_core::BlockdiffResult;

use crate::naming::NameStrategy;
use crate::BlockSink;

pub struct DirSink {
    dir: PathBuf,
    names: NameStrategy,
    closed: bool,
}

impl DirSink {
    /// Use `dir` as the destination, creating it if needed.
    pub fn create(dir: &Path, names: NameStrategy) -> BlockdiffResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(DirSink {
            dir: dir.to_path_buf(),
            names,
            closed: false,
        })
    }

    fn target(&self, name: &str) -> BlockdiffResult<PathBuf> {
        if self.closed {
            let msg = format!("directory sink closed, cannot write {name}");
            return Err(std::io::Error::other(msg).into());
        }
        Ok(self.dir.join(name))
    }
}

impl BlockSink for DirSink {
    fn write_block(&mut self, index: u64, data: &[u8]) -> BlockdiffResult<()> {
        let path = self.target(&(self.names)(index))?;
        std::fs::write(&path, data)?;
        Ok(())
    }

    fn write_map(&mut self, name: &str, data: &[u8]) -> BlockdiffResult<()> {
        std::fs::write(self.target(name)?, data)?;
        Ok(())
    }

    fn close(&mut self) -> BlockdiffResult<()> {
        self.closed = true;
        Ok(())
    }
}
