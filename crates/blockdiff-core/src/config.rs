use serde::{Deserialize, Serialize};

use crate::error::{BlockdiffError, BlockdiffResult};
use crate::types::{HashAlgorithm, SinkMode};

/// Top-level configuration (loaded from blockdiff.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockdiffConfig {
    pub diff: DiffConfig,
    pub naming: NamingConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Block size in bytes (default: 64 KiB)
    pub block_size: u64,
    /// Output backend: "files" or "tar"
    pub mode: SinkMode,
    /// Block digest: "sha1" or "blake3"
    pub hash: HashAlgorithm,
    /// Name of the map entry written into the sink (default: .blockmap)
    pub map_name: String,
}

/// Block naming inside a sink: `{prefix}{index:0width}{suffix}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub prefix: String,
    /// Zero-padding width of the index (default: 10)
    pub width: usize,
    pub suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            mode: SinkMode::Tar,
            hash: HashAlgorithm::Sha1,
            map_name: ".blockmap".into(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            width: 10,
            suffix: ".block".into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl BlockdiffConfig {
    /// Parse a TOML document, then validate it.
    pub fn from_toml(content: &str) -> BlockdiffResult<Self> {
        let config: BlockdiffConfig = toml::from_str(content)
            .map_err(|e| BlockdiffError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> BlockdiffResult<()> {
        if self.diff.block_size == 0 {
            return Err(BlockdiffError::Config(
                "diff.block_size must be a positive number of bytes".into(),
            ));
        }
        if self.diff.map_name.is_empty() {
            return Err(BlockdiffError::Config("diff.map_name must not be empty".into()));
        }
        if self.naming.width == 0 {
            return Err(BlockdiffError::Config("naming.width must be at least 1".into()));
        }
        match self.log.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(BlockdiffError::Config(format!(
                    "log.format must be \"text\" or \"json\", got \"{other}\""
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[diff]
block_size = 1048576
mode = "files"
hash = "blake3"
map_name = "snapshot.map"

[naming]
prefix = "part_"
width = 6
suffix = ".blk"

[log]
level = "debug"
format = "json"
"#;
        let config = BlockdiffConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.diff.block_size, 1048576);
        assert_eq!(config.diff.mode, SinkMode::Files);
        assert_eq!(config.diff.hash, HashAlgorithm::Blake3);
        assert_eq!(config.diff.map_name, "snapshot.map");
        assert_eq!(config.naming.prefix, "part_");
        assert_eq!(config.naming.width, 6);
        assert_eq!(config.naming.suffix, ".blk");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = BlockdiffConfig::from_toml("").unwrap();

        assert_eq!(config.diff.block_size, 65536);
        assert_eq!(config.diff.mode, SinkMode::Tar);
        assert_eq!(config.diff.hash, HashAlgorithm::Sha1);
        assert_eq!(config.diff.map_name, ".blockmap");
        assert_eq!(config.naming.width, 10);
        assert_eq!(config.naming.suffix, ".block");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[diff]
block_size = 4096
"#;
        let config = BlockdiffConfig::from_toml(toml_str).unwrap();

        // Overridden
        assert_eq!(config.diff.block_size, 4096);
        // Defaults
        assert_eq!(config.diff.mode, SinkMode::Tar);
        assert_eq!(config.naming.width, 10);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = BlockdiffConfig::from_toml("[diff]\nblock_size = 0\n").unwrap_err();
        assert!(matches!(err, BlockdiffError::Config(_)));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = BlockdiffConfig::from_toml("[diff]\nmode = \"zip\"\n").unwrap_err();
        assert!(matches!(err, BlockdiffError::Config(_)));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = BlockdiffConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = BlockdiffConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.diff.block_size, parsed.diff.block_size);
        assert_eq!(config.diff.mode, parsed.diff.mode);
        assert_eq!(config.naming.suffix, parsed.naming.suffix);
    }
}
