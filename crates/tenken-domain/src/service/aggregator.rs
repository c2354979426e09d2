//! Aggregate counts per partition and overall

use tenken_types::{AggregateCounts, InspectionStatus, PartitionConfig, RemainingFormula, VehicleRecord};

use crate::repository::PartitionRepository;

/// Count one slice of records
///
/// Each record lands in at most one bucket: done, stopped or skipped.
/// `7days_rule` records only count toward the total.
pub fn count_records(records: &[VehicleRecord], formula: RemainingFormula) -> AggregateCounts {
    let mut counts = AggregateCounts {
        total: records.len(),
        ..Default::default()
    };

    for record in records {
        if record.checked {
            counts.done += 1;
            continue;
        }
        match record.status {
            InspectionStatus::Stop => counts.stopped += 1,
            InspectionStatus::Skip => counts.skipped += 1,
            InspectionStatus::SevenDaysRule | InspectionStatus::Standby => {}
        }
    }

    let settled = match formula {
        RemainingFormula::ExcludeStopped => counts.done + counts.skipped,
        RemainingFormula::SubtractStopped => counts.done + counts.skipped + counts.stopped,
    };
    counts.remaining = counts.total.saturating_sub(settled);
    counts
}

/// Counts for one stored partition
pub fn counts_for<R: PartitionRepository>(
    repo: &R,
    partition: &str,
    formula: RemainingFormula,
) -> AggregateCounts {
    count_records(&repo.read(partition), formula)
}

/// Counts summed over all configured partitions
pub fn counts_overall<R: PartitionRepository>(
    repo: &R,
    partitions: &[PartitionConfig],
    formula: RemainingFormula,
) -> AggregateCounts {
    partitions
        .iter()
        .map(|p| counts_for(repo, &p.name, formula))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(checked: bool, status: InspectionStatus) -> VehicleRecord {
        VehicleRecord {
            checked,
            status,
            ..Default::default()
        }
    }

    fn sample() -> Vec<VehicleRecord> {
        let mut records = Vec::new();
        records.extend((0..3).map(|_| with(true, InspectionStatus::Standby)));
        records.extend((0..2).map(|_| with(false, InspectionStatus::Stop)));
        records.push(with(false, InspectionStatus::Skip));
        records.extend((0..4).map(|_| with(false, InspectionStatus::Standby)));
        records
    }

    #[test]
    fn test_counts_canonical_formula() {
        let counts = count_records(&sample(), RemainingFormula::ExcludeStopped);
        assert_eq!(
            counts,
            AggregateCounts { done: 3, stopped: 2, skipped: 1, total: 10, remaining: 6 }
        );
    }

    #[test]
    fn test_counts_subtract_stopped_formula() {
        let counts = count_records(&sample(), RemainingFormula::SubtractStopped);
        assert_eq!(counts.remaining, 4);
    }

    #[test]
    fn test_seven_day_rule_only_in_total() {
        let records = vec![with(false, InspectionStatus::SevenDaysRule)];
        let counts = count_records(&records, RemainingFormula::ExcludeStopped);
        assert_eq!(
            counts,
            AggregateCounts { done: 0, stopped: 0, skipped: 0, total: 1, remaining: 1 }
        );
    }

    #[test]
    fn test_checked_counts_once() {
        // Non-canonical input: checked wins over status
        let records = vec![with(true, InspectionStatus::Stop)];
        let counts = count_records(&records, RemainingFormula::ExcludeStopped);
        assert_eq!(counts.done, 1);
        assert_eq!(counts.stopped, 0);
    }

    #[test]
    fn test_empty() {
        let counts = count_records(&[], RemainingFormula::SubtractStopped);
        assert_eq!(counts, AggregateCounts::default());
    }
}
