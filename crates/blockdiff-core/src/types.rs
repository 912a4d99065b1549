use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BlockdiffError;

/// Output backend receiving changed blocks and the final map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// One loose file per block inside a destination directory
    Files,
    /// A single uncompressed tar archive
    Tar,
}

impl FromStr for SinkMode {
    type Err = BlockdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "files" => Ok(SinkMode::Files),
            "tar" => Ok(SinkMode::Tar),
            other => Err(BlockdiffError::Config(format!(
                "unsupported mode \"{other}\" (expected \"files\" or \"tar\")"
            ))),
        }
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkMode::Files => f.write_str("files"),
            SinkMode::Tar => f.write_str("tar"),
        }
    }
}

/// Digest used to fingerprint each block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 160-bit SHA-1, lowercase hex (40 chars)
    Sha1,
    /// 256-bit BLAKE3, lowercase hex (64 chars)
    Blake3,
}

impl FromStr for HashAlgorithm {
    type Err = BlockdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(BlockdiffError::Config(format!(
                "unsupported hash \"{other}\" (expected \"sha1\" or \"blake3\")"
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha1 => f.write_str("sha1"),
            HashAlgorithm::Blake3 => f.write_str("blake3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("files".parse::<SinkMode>().unwrap(), SinkMode::Files);
        assert_eq!("tar".parse::<SinkMode>().unwrap(), SinkMode::Tar);
    }

    #[test]
    fn unsupported_mode_is_config_error() {
        let err = "zip".parse::<SinkMode>().unwrap_err();
        assert!(matches!(err, BlockdiffError::Config(ref m) if m.contains("zip")));
    }

    #[test]
    fn hash_display_matches_parse() {
        for algo in [HashAlgorithm::Sha1, HashAlgorithm::Blake3] {
            assert_eq!(algo.to_string().parse::<HashAlgorithm>().unwrap(), algo);
        }
    }
}
