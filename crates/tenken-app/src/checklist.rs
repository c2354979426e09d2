//! User edits on stored partitions
//!
//! Every edit is a single-record replace through
//! [`PartitionRepository::update_one`]. The record key is a plate or a
//! display index.

use chrono::NaiveDate;
use tracing::info;

use tenken_domain::repository::PartitionRepository;
use tenken_domain::service::normalizer::normalize_date;
use tenken_domain::service::{reconcile, ReconcileOutcome};
use tenken_types::{
    locate_record, Error, InspectionStatus, OrphanPolicy, PartitionConfig, Result, VehicleRecord,
};

/// Partition by name or slug
pub fn find_partition<'a>(partitions: &'a [PartitionConfig], name_or_slug: &str) -> Result<&'a PartitionConfig> {
    partitions
        .iter()
        .find(|p| p.matches_name(name_or_slug))
        .ok_or_else(|| Error::UnknownPartition(name_or_slug.to_string()))
}

fn edit<R, F>(repo: &mut R, partition: &PartitionConfig, key: &str, apply: F) -> Result<VehicleRecord>
where
    R: PartitionRepository,
    F: FnOnce(&mut VehicleRecord),
{
    let records = repo.read(&partition.name);
    let pos = locate_record(&records, key).ok_or_else(|| Error::RecordNotFound {
        partition: partition.name.clone(),
        key: key.to_string(),
    })?;

    let mut record = records[pos].clone();
    apply(&mut record);
    record.canonicalize();
    repo.update_one(&partition.name, key, record.clone())?;
    Ok(record)
}

/// Mark a record inspected on `today`
pub fn check<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    key: &str,
    today: NaiveDate,
) -> Result<VehicleRecord> {
    let record = edit(repo, partition, key, |r| {
        r.checked = true;
        r.last_inspected_at = today.format("%Y-%m-%d").to_string();
    })?;
    info!("Checked {} {}", record.display_index, record.plate);
    Ok(record)
}

/// Clear the checked flag; the inspection date stays
pub fn uncheck<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    key: &str,
) -> Result<VehicleRecord> {
    edit(repo, partition, key, |r| r.checked = false)
}

/// Set the operational status; a non-standby status unchecks the record
pub fn set_status<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    key: &str,
    status: InspectionStatus,
) -> Result<VehicleRecord> {
    edit(repo, partition, key, |r| {
        if status != InspectionStatus::Standby {
            r.checked = false;
        }
        r.status = status;
    })
}

/// Set or clear (`""`) the last inspection date
pub fn set_last_inspected<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    key: &str,
    date: &str,
) -> Result<VehicleRecord> {
    let normalized = normalize_date(date);
    if !date.trim().is_empty() && normalized.is_empty() {
        return Err(Error::InvalidDate(date.to_string()));
    }
    edit(repo, partition, key, |r| r.last_inspected_at = normalized)
}

/// Merge an imported list into a partition as if it had been pulled
pub fn import_records<R: PartitionRepository>(
    repo: &mut R,
    partition: &PartitionConfig,
    mut records: Vec<VehicleRecord>,
    policy: OrphanPolicy,
) -> Result<ReconcileOutcome> {
    for record in &mut records {
        if record.area.is_empty() {
            record.area = partition.name.clone();
        }
    }
    let outcome = reconcile(repo, partition, records, policy)?;
    info!(
        "Imported {} records into {} ({} matched, {} new)",
        outcome.records.len(),
        partition.name,
        outcome.matched,
        outcome.added
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenken_store::{MemoryKeyValueStore, PartitionStore};
    use tenken_types::default_partitions;

    fn seeded() -> (PartitionStore<MemoryKeyValueStore>, PartitionConfig) {
        let partition = PartitionConfig::new("大和市", "yamato", "Y");
        let mut store = PartitionStore::new(MemoryKeyValueStore::new(), "tenken");
        let pulled = vec![
            VehicleRecord { station: "A駅".into(), plate: "111".into(), ..Default::default() },
            VehicleRecord { station: "B駅".into(), plate: "222".into(), ..Default::default() },
        ];
        import_records(&mut store, &partition, pulled, OrphanPolicy::Discard).unwrap();
        (store, partition)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[test]
    fn test_find_partition_by_slug() {
        let partitions = default_partitions();
        assert_eq!(find_partition(&partitions, "chigasaki").unwrap().prefix, "C");
        assert!(matches!(
            find_partition(&partitions, "横浜市"),
            Err(Error::UnknownPartition(_))
        ));
    }

    #[test]
    fn test_import_sets_area_and_indices() {
        let (store, _) = seeded();
        let records = store.read("大和市");
        assert_eq!(records[0].area, "大和市");
        assert_eq!(records[1].display_index, "Y2");
    }

    #[test]
    fn test_check_by_plate_and_index() {
        let (mut store, partition) = seeded();

        let record = check(&mut store, &partition, "111", today()).unwrap();
        assert!(record.checked);
        assert_eq!(record.last_inspected_at, "2024-05-20");

        check(&mut store, &partition, "Y2", today()).unwrap();
        assert!(store.read("大和市").iter().all(|r| r.checked));

        let record = uncheck(&mut store, &partition, "Y1").unwrap();
        assert!(!record.checked);
        assert_eq!(record.last_inspected_at, "2024-05-20");
    }

    #[test]
    fn test_status_unchecks() {
        let (mut store, partition) = seeded();
        check(&mut store, &partition, "111", today()).unwrap();

        let record = set_status(&mut store, &partition, "111", InspectionStatus::Stop).unwrap();
        assert!(!record.checked);
        assert_eq!(store.read("大和市")[0].status, InspectionStatus::Stop);
    }

    #[test]
    fn test_unknown_key() {
        let (mut store, partition) = seeded();
        let err = check(&mut store, &partition, "999", today()).unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { .. }));
    }

    #[test]
    fn test_set_date_validation() {
        let (mut store, partition) = seeded();
        let record = set_last_inspected(&mut store, &partition, "222", "2024/05/01").unwrap();
        assert_eq!(record.last_inspected_at, "2024-05-01");

        assert!(matches!(
            set_last_inspected(&mut store, &partition, "222", "yesterday"),
            Err(Error::InvalidDate(_))
        ));

        let record = set_last_inspected(&mut store, &partition, "222", "").unwrap();
        assert_eq!(record.last_inspected_at, "");
    }

    #[test]
    fn test_reimport_keeps_edits() {
        let (mut store, partition) = seeded();
        check(&mut store, &partition, "222", today()).unwrap();

        let again = vec![
            VehicleRecord { station: "B駅".into(), plate: "222".into(), ..Default::default() },
            VehicleRecord { station: "C駅".into(), plate: "333".into(), ..Default::default() },
        ];
        let outcome = import_records(&mut store, &partition, again, OrphanPolicy::Discard).unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.dropped, 1);
        let records = store.read("大和市");
        assert!(records[0].checked);
        assert_eq!(records[0].display_index, "Y1");
    }
}
