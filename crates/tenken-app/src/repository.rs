//! Wiring from config to concrete stores and clients

use tenken_infra::SheetClient;
use tenken_store::{FileKeyValueStore, PartitionStore};
use tenken_types::{Result, SyncError};

use crate::config::Config;

pub type LocalStore = PartitionStore<FileKeyValueStore>;

/// Open the partition store under the configured storage directory
pub fn open_store(config: &Config) -> Result<LocalStore> {
    let kv = FileKeyValueStore::open(config.storage_dir()?)?;
    Ok(PartitionStore::new(kv, &config.app_prefix))
}

/// HTTP client for the configured endpoint
pub fn open_sheet_client(config: &Config) -> Result<SheetClient> {
    let endpoint = config.endpoint().ok_or(SyncError::NoEndpoint)?;
    Ok(SheetClient::new(endpoint, config.timeout_secs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenken_domain::repository::PartitionRepository;
    use tenken_types::{Error, VehicleRecord};

    #[test]
    fn test_open_store_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut store = open_store(&config).unwrap();
        store
            .write("大和市", &[VehicleRecord { plate: "111".into(), ..Default::default() }])
            .unwrap();

        let reopened = open_store(&config).unwrap();
        assert_eq!(reopened.read("大和市").len(), 1);
        assert!(reopened.kv().path().starts_with(dir.path()));
    }

    #[test]
    fn test_missing_endpoint() {
        let err = open_sheet_client(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::Sync(SyncError::NoEndpoint)));
    }
}
