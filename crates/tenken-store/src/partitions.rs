//! Per-city partition store over a key/value backend
//!
//! Each partition lives under `<app-prefix>:city:<name>` as a versioned JSON
//! envelope. Cached partition configuration lives under `<app-prefix>:config`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use tenken_domain::repository::PartitionRepository;
use tenken_types::{locate_record, PartitionConfig, StorageError, VehicleRecord};

use crate::kv::KeyValueStore;

/// Current on-disk layout version
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PartitionEnvelope {
    schema_version: u32,
    records: Vec<VehicleRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigEnvelope {
    schema_version: u32,
    partitions: Vec<PartitionConfig>,
}

/// Layouts accepted on read
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredPartition {
    Versioned(PartitionEnvelope),
    /// Unversioned bare array written by older builds
    Legacy(Vec<VehicleRecord>),
}

/// Partition ownership boundary over the device store
pub struct PartitionStore<K: KeyValueStore> {
    kv: K,
    app_prefix: String,
}

impl<K: KeyValueStore> PartitionStore<K> {
    pub fn new(kv: K, app_prefix: &str) -> Self {
        Self {
            kv,
            app_prefix: app_prefix.to_string(),
        }
    }

    pub fn partition_key(&self, partition: &str) -> String {
        format!("{}:city:{}", self.app_prefix, partition)
    }

    pub fn config_key(&self) -> String {
        format!("{}:config", self.app_prefix)
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Names of partitions that currently have stored data
    pub fn stored_partitions(&self) -> Vec<String> {
        let prefix = self.partition_key("");
        self.kv
            .keys_with_prefix(&prefix)
            .into_iter()
            .map(|k| k[prefix.len()..].to_string())
            .collect()
    }

    /// Cached partition configuration, if any
    pub fn read_partition_config(&self) -> Option<Vec<PartitionConfig>> {
        let key = self.config_key();
        let raw = self.kv.get(&key)?;
        match serde_json::from_str::<ConfigEnvelope>(&raw) {
            Ok(envelope) if !envelope.partitions.is_empty() => Some(envelope.partitions),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring corrupt partition config at {}: {}", key, e);
                None
            }
        }
    }

    pub fn write_partition_config(&mut self, partitions: &[PartitionConfig]) -> Result<(), StorageError> {
        let envelope = ConfigEnvelope {
            schema_version: SCHEMA_VERSION,
            partitions: partitions.to_vec(),
        };
        let value = serde_json::to_string(&envelope).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.kv.set(&self.config_key(), value)
    }

    fn decode(key: &str, raw: &str) -> Vec<VehicleRecord> {
        match serde_json::from_str::<StoredPartition>(raw) {
            Ok(StoredPartition::Versioned(envelope)) => {
                if envelope.schema_version > SCHEMA_VERSION {
                    warn!(
                        "{} was written with schema {} (this build knows {})",
                        key, envelope.schema_version, SCHEMA_VERSION
                    );
                }
                envelope.records
            }
            Ok(StoredPartition::Legacy(records)) => records,
            Err(e) => {
                warn!("Ignoring corrupt partition data at {}: {}", key, e);
                Vec::new()
            }
        }
    }
}

impl<K: KeyValueStore> PartitionRepository for PartitionStore<K> {
    fn read(&self, partition: &str) -> Vec<VehicleRecord> {
        let key = self.partition_key(partition);
        let mut records = match self.kv.get(&key) {
            Some(raw) => Self::decode(&key, &raw),
            None => Vec::new(),
        };
        records.iter_mut().for_each(VehicleRecord::canonicalize);
        records
    }

    fn write(&mut self, partition: &str, records: &[VehicleRecord]) -> Result<(), StorageError> {
        let mut records = records.to_vec();
        records.iter_mut().for_each(VehicleRecord::canonicalize);
        let envelope = PartitionEnvelope {
            schema_version: SCHEMA_VERSION,
            records,
        };
        let value = serde_json::to_string(&envelope).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.kv.set(&self.partition_key(partition), value)
    }

    fn update_one(
        &mut self,
        partition: &str,
        key: &str,
        record: VehicleRecord,
    ) -> Result<bool, StorageError> {
        let mut records = self.read(partition);
        match locate_record(&records, key) {
            Some(pos) => {
                records[pos] = record;
                self.write(partition, &records)?;
                Ok(true)
            }
            None => {
                warn!("No record matching '{}' in {}; update skipped", key, partition);
                Ok(false)
            }
        }
    }

    fn clear(&mut self, partition: &str) -> Result<(), StorageError> {
        self.kv.remove(&self.partition_key(partition)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use tenken_types::InspectionStatus;

    fn store() -> PartitionStore<MemoryKeyValueStore> {
        PartitionStore::new(MemoryKeyValueStore::new(), "tenken")
    }

    fn record(plate: &str, index: &str) -> VehicleRecord {
        VehicleRecord {
            plate: plate.to_string(),
            display_index: index.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_absent_partition_reads_empty() {
        assert!(store().read("大和市").is_empty());
    }

    #[test]
    fn test_write_read_uses_namespaced_versioned_key() {
        let mut s = store();
        s.write("大和市", &[record("111", "Y1")]).unwrap();
        let raw = s.kv().get("tenken:city:大和市").unwrap();
        assert!(raw.contains("\"schema_version\":1"));
        assert_eq!(s.read("大和市"), vec![record("111", "Y1")]);
        assert_eq!(s.stored_partitions(), vec!["大和市".to_string()]);
    }

    #[test]
    fn test_corrupt_partition_reads_empty() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set("tenken:city:大和市", "{\"oops\":".to_string()).unwrap();
        let s = PartitionStore::new(kv, "tenken");
        assert!(s.read("大和市").is_empty());
    }

    #[test]
    fn test_legacy_bare_array_migrated() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set(
            "tenken:city:大和市",
            r#"[{"city":"大和市","plate":"1","status":"normal","checked":true}]"#.to_string(),
        )
        .unwrap();
        let s = PartitionStore::new(kv, "tenken");
        let records = s.read("大和市");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].area, "大和市");
        assert!(records[0].checked);
        assert_eq!(records[0].status, InspectionStatus::Standby);
    }

    #[test]
    fn test_write_canonicalizes() {
        let mut s = store();
        let mut r = record("1", "Y1");
        r.checked = true;
        r.status = InspectionStatus::Skip;
        s.write("大和市", &[r]).unwrap();
        assert_eq!(s.read("大和市")[0].status, InspectionStatus::Standby);
    }

    #[test]
    fn test_update_one_in_place() {
        let mut s = store();
        s.write("大和市", &[record("111", "Y1"), record("222", "Y2"), record("", "Y3")])
            .unwrap();

        let mut updated = record("222", "Y2");
        updated.checked = true;
        assert!(s.update_one("大和市", "222", updated).unwrap());

        let mut by_index = record("", "Y3");
        by_index.status = InspectionStatus::Stop;
        assert!(s.update_one("大和市", "Y3", by_index).unwrap());

        let records = s.read("大和市");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].plate, "111");
        assert!(records[1].checked);
        assert_eq!(records[2].status, InspectionStatus::Stop);
    }

    #[test]
    fn test_update_one_no_match_is_noop() {
        let mut s = store();
        s.write("大和市", &[record("111", "Y1")]).unwrap();
        assert!(!s.update_one("大和市", "999", record("999", "Y9")).unwrap());
        assert_eq!(s.read("大和市"), vec![record("111", "Y1")]);
    }

    #[test]
    fn test_clear() {
        let mut s = store();
        s.write("大和市", &[record("111", "Y1")]).unwrap();
        s.clear("大和市").unwrap();
        assert!(s.read("大和市").is_empty());
        assert!(s.stored_partitions().is_empty());
    }

    #[test]
    fn test_partition_config_roundtrip_and_corruption() {
        let mut s = store();
        assert!(s.read_partition_config().is_none());
        s.write_partition_config(&tenken_types::default_partitions()).unwrap();
        assert_eq!(s.read_partition_config().unwrap().len(), 3);

        let mut kv = MemoryKeyValueStore::new();
        kv.set("tenken:config", "garbage".into()).unwrap();
        assert!(PartitionStore::new(kv, "tenken").read_partition_config().is_none());
    }

    #[test]
    fn test_quota_failure_surfaces_as_storage_error() {
        let mut s = PartitionStore::new(MemoryKeyValueStore::with_quota(16), "tenken");
        let err = s.write("大和市", &[record("111", "Y1")]).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(s.read("大和市").is_empty());
    }
}
