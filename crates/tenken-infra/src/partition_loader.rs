//! Partition definitions loaded from TOML
//!
//! ```toml
//! [[partitions]]
//! name = "大和市"
//! slug = "yamato"
//! prefix = "Y"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tenken_types::{ConfigError, Error, PartitionConfig, Result};

/// Container for parsing partitions.toml
#[derive(Debug, Deserialize)]
struct PartitionFile {
    partitions: Vec<PartitionConfig>,
}

/// Load partitions from a TOML file
pub fn load_from_file(path: &Path) -> Result<Vec<PartitionConfig>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(ConfigError::ParseError(format!(
            "Failed to read partition file {}: {}",
            path.display(),
            e
        )))
    })?;

    load_from_str(&content)
}

/// Load partitions from a TOML string
pub fn load_from_str(toml_content: &str) -> Result<Vec<PartitionConfig>> {
    let file: PartitionFile = toml::from_str(toml_content).map_err(|e| {
        Error::Config(ConfigError::ParseError(format!(
            "Failed to parse partition TOML: {}",
            e
        )))
    })?;

    validate(&file.partitions)?;
    Ok(file.partitions)
}

/// Names unique, prefixes present and unique
pub fn validate(partitions: &[PartitionConfig]) -> Result<()> {
    if partitions.is_empty() {
        return Err(ConfigError::InvalidPartition("no partitions defined".to_string()).into());
    }

    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for p in partitions {
        if p.name.trim().is_empty() {
            return Err(ConfigError::InvalidPartition("partition without a name".to_string()).into());
        }
        if p.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidPartition(format!("{} has no prefix", p.name)).into());
        }
        if !names.insert(p.name.as_str()) {
            return Err(ConfigError::InvalidPartition(format!("duplicate name {}", p.name)).into());
        }
        if !prefixes.insert(p.prefix.as_str()) {
            return Err(
                ConfigError::InvalidPartition(format!("duplicate prefix {}", p.prefix)).into(),
            );
        }
    }
    Ok(())
}
