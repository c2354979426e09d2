//! City router - assigns a normalized record to one configured partition
//!
//! Upstream sheets are edited by hand and do not agree on which column
//! carries the locality, so the router falls back field by field:
//! area, then address, then station name. Matching is by substring on the
//! city stem ("大和市" matches "大和", "大和市役所前", ...).

use tracing::debug;

use tenken_types::{PartitionConfig, VehicleRecord};

fn field_matches(value: &str, partition: &PartitionConfig) -> bool {
    let value = value.trim();
    !value.is_empty() && value.contains(partition.city_stem())
}

/// Partition a record belongs to, or `None` if it is unassigned
pub fn route<'a>(
    record: &VehicleRecord,
    partitions: &'a [PartitionConfig],
) -> Option<&'a PartitionConfig> {
    let fields = [
        record.area.as_str(),
        record.address.as_str(),
        record.station.as_str(),
    ];
    fields.iter().filter(|f| !f.trim().is_empty()).find_map(|field| {
        partitions
            .iter()
            .find(|partition| field_matches(field, partition))
    })
}

/// Records of one pull grouped by partition
#[derive(Debug, Clone, Default)]
pub struct RoutedBatch {
    /// One entry per configured partition, in configuration order
    pub partitions: Vec<(PartitionConfig, Vec<VehicleRecord>)>,
    /// Records dropped because no partition matched
    pub unassigned: usize,
}

impl RoutedBatch {
    pub fn records_for(&self, name: &str) -> &[VehicleRecord] {
        self.partitions
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    pub fn routed_count(&self) -> usize {
        self.partitions.iter().map(|(_, records)| records.len()).sum()
    }
}

/// Route a whole batch, keeping pulled order within each partition
pub fn route_batch(records: Vec<VehicleRecord>, partitions: &[PartitionConfig]) -> RoutedBatch {
    let mut batch = RoutedBatch {
        partitions: partitions.iter().map(|p| (p.clone(), Vec::new())).collect(),
        unassigned: 0,
    };

    for record in records {
        match route(&record, partitions) {
            Some(partition) => {
                if let Some((_, bucket)) =
                    batch.partitions.iter_mut().find(|(p, _)| p.name == partition.name)
                {
                    bucket.push(record);
                }
            }
            None => {
                debug!(
                    "Unassigned record dropped (station: {:?}, plate: {:?})",
                    record.station, record.plate
                );
                batch.unassigned += 1;
            }
        }
    }

    batch
}
