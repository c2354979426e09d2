//! One-time application startup
//!
//! Loads config, opens the store and resolves the partition set. Only one
//! [`App`] may be live per process; a second bootstrap fails with
//! [`Error::AlreadyInitialized`] until the first is dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use tenken_domain::repository::SheetSource;
use tenken_store::FileKeyValueStore;
use tenken_types::{Error, PartitionConfig, Result};

use crate::config::Config;
use crate::repository::{open_store, LocalStore};
use crate::sync::{SyncOrchestrator, SyncSettings};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Process-wide initialization flag, released on drop
#[derive(Debug)]
pub struct BootstrapGuard {
    _private: (),
}

impl BootstrapGuard {
    pub fn acquire() -> Result<Self> {
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }
        Ok(Self { _private: () })
    }
}

impl Drop for BootstrapGuard {
    fn drop(&mut self) {
        INITIALIZED.store(false, Ordering::SeqCst);
    }
}

/// Initialized application state
pub struct App {
    pub config: Config,
    pub store: LocalStore,
    /// Cached remote config when present, else the local definition
    pub partitions: Vec<PartitionConfig>,
    _guard: BootstrapGuard,
}

impl App {
    pub fn bootstrap(config: Config) -> Result<Self> {
        let guard = BootstrapGuard::acquire()?;
        let store = open_store(&config)?;
        let cached = store.read_partition_config();
        let from_remote = cached.is_some();
        let partitions = config.resolve_partitions(cached)?;
        debug!(
            "Partitions ({}): {:?}",
            if from_remote { "remote cache" } else { "local" },
            partitions.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        info!("Storage at {}", store.kv().path().display());

        Ok(Self {
            config,
            store,
            partitions,
            _guard: guard,
        })
    }

    /// Partition by name or slug
    pub fn partition(&self, name_or_slug: &str) -> Result<&PartitionConfig> {
        crate::checklist::find_partition(&self.partitions, name_or_slug)
    }

    /// Partitions shown to the user (stopped ones hidden)
    pub fn offered_partitions(&self) -> Vec<&PartitionConfig> {
        self.partitions.iter().filter(|p| p.is_offered()).collect()
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            sheet: self.config.sheet.clone(),
            orphan_policy: self.config.orphan_policy,
            remaining_formula: self.config.remaining_formula,
        }
    }

    /// Hand the store to a sync orchestrator; keep the guard alive meanwhile
    pub fn into_orchestrator<S: SheetSource>(
        self,
        source: S,
    ) -> (SyncOrchestrator<S, FileKeyValueStore>, BootstrapGuard) {
        let settings = self.sync_settings();
        let orchestrator = SyncOrchestrator::new(source, self.store, self.partitions, settings);
        (orchestrator, self._guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Guard state is process-global, so everything touching it lives in one test.
    #[test]
    fn test_single_bootstrap_per_process() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let app = App::bootstrap(config.clone()).unwrap();
        assert_eq!(app.partitions.len(), 3);
        assert_eq!(app.partition("ebina").unwrap().name, "海老名市");
        assert!(matches!(
            App::bootstrap(config.clone()),
            Err(Error::AlreadyInitialized)
        ));
        assert!(matches!(BootstrapGuard::acquire(), Err(Error::AlreadyInitialized)));
        drop(app);

        let mut app = App::bootstrap(config.clone()).unwrap();
        let mut cached = vec![PartitionConfig::new("座間市", "zama", "Z")];
        cached[0].status = tenken_types::PartitionStatus::Stop;
        cached.push(PartitionConfig::new("綾瀬市", "ayase", "A"));
        app.store.write_partition_config(&cached).unwrap();
        drop(app);

        let app = App::bootstrap(config).unwrap();
        assert_eq!(app.partitions.len(), 2);
        let offered: Vec<&str> = app.offered_partitions().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(offered, vec!["綾瀬市"]);
    }
}
