//! Reconciler - merges a fresh pull with the stored partition
//!
//! Upstream descriptive fields are authoritative; user-entered state
//! (checked, status, last inspection date) survives a resync for records
//! that still exist. Pulled order decides the final order and the display
//! indices.

use std::collections::HashMap;

use tracing::{debug, info};

use tenken_types::{OrphanPolicy, PartitionConfig, StorageError, VehicleRecord};

use crate::repository::PartitionRepository;

/// Result of merging one partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub records: Vec<VehicleRecord>,
    /// Pulled records that inherited local state
    pub matched: usize,
    /// Pulled records with no local counterpart
    pub added: usize,
    /// Local-only records discarded
    pub dropped: usize,
    /// Local-only records kept under [`OrphanPolicy::KeepEdited`]
    pub kept: usize,
}

/// Display index for a 0-based position
pub fn display_index(partition: &PartitionConfig, position: usize) -> String {
    format!("{}{}", partition.prefix, position + 1)
}

fn plate_counts(records: &[VehicleRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for record in records.iter().filter(|r| !r.plate.is_empty()) {
        *counts.entry(record.plate.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Merge freshly pulled records into the existing partition contents
pub fn merge(
    existing: &[VehicleRecord],
    pulled: Vec<VehicleRecord>,
    partition: &PartitionConfig,
    policy: OrphanPolicy,
) -> ReconcileOutcome {
    let local_plates = plate_counts(existing);
    let pulled_plates = plate_counts(&pulled);
    let plate_usable = |plate: &str| {
        !plate.is_empty()
            && local_plates.get(plate).copied().unwrap_or(0) <= 1
            && pulled_plates.get(plate).copied().unwrap_or(0) == 1
    };

    let mut used = vec![false; existing.len()];
    let mut matches: Vec<Option<usize>> = vec![None; pulled.len()];

    // Plate matches first so an index fallback cannot claim a record a later
    // pulled row owns by plate.
    for (i, record) in pulled.iter().enumerate() {
        if !plate_usable(&record.plate) {
            continue;
        }
        if let Some(pos) = existing
            .iter()
            .enumerate()
            .position(|(j, local)| !used[j] && local.plate == record.plate)
        {
            used[pos] = true;
            matches[i] = Some(pos);
        }
    }

    for (i, slot) in matches.iter_mut().enumerate() {
        if slot.is_some() || plate_usable(&pulled[i].plate) {
            continue;
        }
        let index = display_index(partition, i);
        let plate = pulled[i].plate.as_str();
        // A local record with its own unique plate is a different vehicle
        let claimable = |local: &VehicleRecord| {
            local.plate.is_empty()
                || local.plate == plate
                || local_plates.get(local.plate.as_str()).copied().unwrap_or(0) > 1
        };
        if let Some(pos) = existing
            .iter()
            .enumerate()
            .position(|(j, local)| !used[j] && local.display_index == index && claimable(local))
        {
            used[pos] = true;
            *slot = Some(pos);
        }
    }

    let mut outcome = ReconcileOutcome::default();
    let mut records = Vec::with_capacity(pulled.len());
    for (mut record, slot) in pulled.into_iter().zip(matches) {
        match slot {
            Some(pos) => {
                record.take_user_state(&existing[pos]);
                outcome.matched += 1;
            }
            None => {
                record.clear_user_state();
                outcome.added += 1;
            }
        }
        record.canonicalize();
        records.push(record);
    }

    for (local, _) in existing.iter().zip(&used).filter(|(_, used)| !**used) {
        if policy == OrphanPolicy::KeepEdited && local.has_user_state() {
            records.push(local.clone());
            outcome.kept += 1;
        } else {
            debug!(
                "Dropping local-only record {} (plate: {:?})",
                local.display_index, local.plate
            );
            outcome.dropped += 1;
        }
    }

    for (position, record) in records.iter_mut().enumerate() {
        record.display_index = display_index(partition, position);
    }

    info!(
        "Reconciled {}: {} matched, {} new, {} dropped, {} kept",
        partition.name, outcome.matched, outcome.added, outcome.dropped, outcome.kept
    );

    outcome.records = records;
    outcome
}

/// Load, merge and persist one partition
pub fn reconcile<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    pulled: Vec<VehicleRecord>,
    policy: OrphanPolicy,
) -> Result<ReconcileOutcome, StorageError> {
    let existing = repo.read(&partition.name);
    let outcome = merge(&existing, pulled, partition, policy);
    repo.write(&partition.name, &outcome.records)?;
    Ok(outcome)
}

/// Clear a partition so the next pull treats every record as new
pub fn reset<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
) -> Result<(), StorageError> {
    info!("Resetting partition {}", partition.name);
    repo.clear(&partition.name)
}
