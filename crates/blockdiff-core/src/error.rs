use std::fmt;
use thiserror::Error;

pub type BlockdiffResult<T> = Result<T, BlockdiffError>;

/// Scalar map field compared between the previous and the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapField {
    Version,
    BlockSize,
    TotalBytes,
}

impl fmt::Display for MapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field names as they appear in the map file
        let name = match self {
            MapField::Version => "version",
            MapField::BlockSize => "blocksize",
            MapField::TotalBytes => "totalbytes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BlockdiffError {
    #[error("config error: {0}")]
    Config(String),

    #[error("input and output map \"{field}\" mismatch: expected {expected}, found {found}")]
    MapMismatch {
        field: MapField,
        /// Wide enough for both the signed version and the unsigned sizes
        expected: i128,
        found: i128,
    },

    #[error("map format error: {0}")]
    MapFormat(#[from] serde_json::Error),

    #[error("restore error: {0}")]
    Restore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlockdiffError {
    /// True for errors raised before any block is streamed
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            BlockdiffError::Config(_) | BlockdiffError::MapMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_the_field() {
        let err = BlockdiffError::MapMismatch {
            field: MapField::BlockSize,
            expected: 1024,
            found: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"blocksize\""), "{msg}");
        assert!(msg.contains("1024"));
        assert!(msg.contains("4096"));
        assert!(err.is_precondition());
    }

    #[test]
    fn io_errors_are_not_preconditions() {
        let err: BlockdiffError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!err.is_precondition());
    }
}
