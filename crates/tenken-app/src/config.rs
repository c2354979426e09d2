//! Configuration management for tenken-checker
//!
//! Config stored at: ~/.config/tenken-checker/config.json

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tenken_domain::service::render_state::offset_hours;
use tenken_infra::partition_loader;
use tenken_infra::sheet_client::DEFAULT_TIMEOUT_SECS;
use tenken_types::{
    default_partitions, ConfigError, OrphanPolicy, OutputFormat, PartitionConfig,
    RemainingFormula, Result,
};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spreadsheet web app URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sheet name passed as `&sheet=` on pull
    #[serde(default)]
    pub sheet: Option<String>,

    /// Client-side request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Namespace for storage keys (`<prefix>:city:<name>`)
    #[serde(default = "default_app_prefix")]
    pub app_prefix: String,

    /// Storage directory override
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Default output format (json, table)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub remaining_formula: RemainingFormula,

    #[serde(default)]
    pub orphan_policy: OrphanPolicy,

    /// Push the local working set before every pull
    #[serde(default)]
    pub push_before_pull: bool,

    /// Offset used for "today" (JST by default)
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// City partitions used when no remote config has been cached
    #[serde(default = "default_partitions")]
    pub partitions: Vec<PartitionConfig>,

    /// TOML file with `[[partitions]]`, overrides `partitions`
    #[serde(default)]
    pub partitions_file: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_app_prefix() -> String {
    "tenken".to_string()
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_utc_offset_hours() -> i32 {
    9
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            sheet: None,
            timeout_secs: default_timeout_secs(),
            app_prefix: default_app_prefix(),
            storage_dir: None,
            output_format: default_output_format(),
            remaining_formula: RemainingFormula::default(),
            orphan_policy: OrphanPolicy::default(),
            push_before_pull: false,
            utc_offset_hours: default_utc_offset_hours(),
            partitions: default_partitions(),
            partitions_file: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("tenken-checker");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("tenken-checker");
        Ok(data_dir)
    }

    pub fn offset(&self) -> FixedOffset {
        offset_hours(self.utc_offset_hours)
    }

    /// Configured endpoint, if non-blank
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            if config.timeout_secs == 0 {
                warn!("timeout_secs = 0 in {}, using 1s", path.display());
                config.timeout_secs = 1;
            }
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Partitions from the file config, falling back to the inline list
    ///
    /// Remote config cached in storage takes precedence over both; see
    /// [`crate::bootstrap::App::bootstrap`].
    pub fn local_partitions(&self) -> Result<Vec<PartitionConfig>> {
        match self.partitions_file {
            Some(ref path) => partition_loader::load_from_file(path),
            None => {
                partition_loader::validate(&self.partitions)?;
                Ok(self.partitions.clone())
            }
        }
    }

    /// Pick cached remote partitions when they are valid
    pub fn resolve_partitions(&self, cached: Option<Vec<PartitionConfig>>) -> Result<Vec<PartitionConfig>> {
        if let Some(cached) = cached {
            match partition_loader::validate(&cached) {
                Ok(()) => return Ok(cached),
                Err(e) => warn!("Ignoring cached partition config: {}", e),
            }
        }
        self.local_partitions()
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tenken Checker Configuration")?;
        writeln!(f, "============================")?;
        writeln!(f)?;
        writeln!(f, "Endpoint:        {}", self.endpoint().unwrap_or("(not set)"))?;
        writeln!(f, "Sheet:           {}", self.sheet.as_deref().unwrap_or("(default)"))?;
        writeln!(f, "Timeout:         {}s", self.timeout_secs)?;
        writeln!(f, "Storage prefix:  {}", self.app_prefix)?;
        writeln!(
            f,
            "Storage dir:     {}",
            self.storage_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        )?;
        writeln!(f, "Output format:   {}", self.output_format)?;
        writeln!(f, "Remaining:       {:?}", self.remaining_formula)?;
        writeln!(f, "Orphans:         {:?}", self.orphan_policy)?;
        writeln!(f, "Push before pull: {}", self.push_before_pull)?;
        writeln!(f, "UTC offset:      {:+}h", self.utc_offset_hours)?;
        match self.partitions_file {
            Some(ref path) => writeln!(f, "Partitions file: {}", path.display())?,
            None => {
                let names: Vec<String> = self
                    .partitions
                    .iter()
                    .map(|p| format!("{}({})", p.name, p.prefix))
                    .collect();
                writeln!(f, "Partitions:      {}", names.join(", "))?;
            }
        }

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:     {}", path.display())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.app_prefix, "tenken");
        assert_eq!(config.remaining_formula, RemainingFormula::ExcludeStopped);
        assert_eq!(config.partitions.len(), 3);
        assert!(config.endpoint().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"endpoint":"https://example.invalid/exec","remaining_formula":"subtract_stopped"}"#,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.endpoint(), Some("https://example.invalid/exec"));
        assert_eq!(config.remaining_formula, RemainingFormula::SubtractStopped);
        assert_eq!(config.utc_offset_hours, 9);
    }

    #[test]
    fn test_zero_timeout_clamped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"timeout_secs":0}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout_secs, 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            sheet: Some("5月".to_string()),
            orphan_policy: OrphanPolicy::KeepEdited,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sheet.as_deref(), Some("5月"));
        assert_eq!(loaded.orphan_policy, OrphanPolicy::KeepEdited);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.timeout_secs, 15);
    }

    #[test]
    fn test_resolve_prefers_valid_cache() {
        let config = Config::default();
        let cached = vec![PartitionConfig::new("座間市", "zama", "Z")];
        let resolved = config.resolve_partitions(Some(cached)).unwrap();
        assert_eq!(resolved[0].name, "座間市");

        let broken = vec![PartitionConfig::new("座間市", "zama", "")];
        let resolved = config.resolve_partitions(Some(broken)).unwrap();
        assert_eq!(resolved.len(), 3);
    }
}
