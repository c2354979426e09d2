//! Repository and remote source traits

use tenken_types::{PartitionConfig, StorageError, SyncError, VehicleRecord};

/// Per-city record storage
pub trait PartitionRepository {
    /// Records of a partition in stored order; empty if absent or unreadable
    fn read(&self, partition: &str) -> Vec<VehicleRecord>;

    /// Replace a partition wholesale
    fn write(&mut self, partition: &str, records: &[VehicleRecord]) -> Result<(), StorageError>;

    /// Replace the record matching `key` (plate, then display index) in place
    ///
    /// Returns `Ok(false)` when nothing matched.
    fn update_one(
        &mut self,
        partition: &str,
        key: &str,
        record: VehicleRecord,
    ) -> Result<bool, StorageError>;

    /// Drop all records of a partition
    fn clear(&mut self, partition: &str) -> Result<(), StorageError>;
}

/// Remote spreadsheet endpoint
///
/// Implementations must bound every call with a client-side timeout.
#[allow(async_fn_in_trait)]
pub trait SheetSource {
    /// Raw rows from `?action=pull`
    async fn pull(&self, sheet: Option<&str>) -> Result<Vec<serde_json::Value>, SyncError>;

    /// Partition set from `?action=config`
    async fn fetch_config(&self) -> Result<Vec<PartitionConfig>, SyncError>;

    /// Submit the full local working set
    async fn push(&self, records: &[VehicleRecord]) -> Result<(), SyncError>;
}
