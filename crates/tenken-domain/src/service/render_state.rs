//! Render state and checklist ordering

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use tenken_types::{InspectionStatus, VehicleRecord};

use super::normalizer::parse_date;

/// Days after the last inspection at which a record is due again
pub const SEVEN_DAY_WINDOW: i64 = 7;

/// Japan Standard Time (UTC+9)
pub fn jst() -> FixedOffset {
    offset_hours(9)
}

/// Fixed offset from whole hours, clamped to a valid range
pub fn offset_hours(hours: i32) -> FixedOffset {
    let hours = hours.clamp(-23, 23);
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Current calendar date at the given offset
pub fn today_at(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

/// "MM/DD HH:MM" in the given offset
pub fn format_timestamp(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%m/%d %H:%M").to_string()
}

/// How a record is shown on the checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Checked,
    Stopped,
    Skipped,
    SevenDayRule,
    Standby,
}

impl RenderState {
    pub fn label(&self) -> &'static str {
        match self {
            RenderState::Checked => "済",
            RenderState::Stopped => "停止",
            RenderState::Skipped => "スキップ",
            RenderState::SevenDayRule => "7日",
            RenderState::Standby => "待機",
        }
    }
}

/// Whether the last inspection is at least seven days old; never for an empty date
pub fn seven_day_rule_due(last_inspected_at: &str, today: NaiveDate) -> bool {
    parse_date(last_inspected_at)
        .map(|last| (today - last).num_days() >= SEVEN_DAY_WINDOW)
        .unwrap_or(false)
}

/// Priority: checked, then status tag, then recency, then standby
pub fn render_state(record: &VehicleRecord, today: NaiveDate) -> RenderState {
    if record.checked {
        return RenderState::Checked;
    }
    match record.status {
        InspectionStatus::Stop => RenderState::Stopped,
        InspectionStatus::Skip => RenderState::Skipped,
        InspectionStatus::SevenDaysRule => RenderState::SevenDayRule,
        InspectionStatus::Standby if seven_day_rule_due(&record.last_inspected_at, today) => {
            RenderState::SevenDayRule
        }
        InspectionStatus::Standby => RenderState::Standby,
    }
}

/// Checklist order: unchecked first, stored order kept within each group
pub fn display_order(records: &[VehicleRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| records[i].checked);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_priority_order() {
        let today = day("2024-01-20");
        let mut r = VehicleRecord {
            checked: true,
            status: InspectionStatus::Stop,
            last_inspected_at: "2024-01-01".into(),
            ..Default::default()
        };
        assert_eq!(render_state(&r, today), RenderState::Checked);
        r.checked = false;
        assert_eq!(render_state(&r, today), RenderState::Stopped);
        r.status = InspectionStatus::Standby;
        assert_eq!(render_state(&r, today), RenderState::SevenDayRule);
        r.last_inspected_at = "2024-01-19".into();
        assert_eq!(render_state(&r, today), RenderState::Standby);
    }

    #[test]
    fn test_seven_day_boundary() {
        let today = day("2024-01-08");
        assert!(seven_day_rule_due("2024-01-01", today));
        assert!(!seven_day_rule_due("2024-01-02", today));
        assert!(!seven_day_rule_due("", today));
        assert!(!seven_day_rule_due("garbage", today));
    }

    #[test]
    fn test_display_order_unchecked_first_stable() {
        let records: Vec<VehicleRecord> = [true, false, true, false]
            .iter()
            .map(|&checked| VehicleRecord { checked, ..Default::default() })
            .collect();
        assert_eq!(display_order(&records), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_format_timestamp_jst() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 23, 5, 0).unwrap();
        assert_eq!(format_timestamp(ts, jst()), "03/02 08:05");
    }

    #[test]
    fn test_offset_clamped() {
        assert_eq!(offset_hours(99).local_minus_utc(), 23 * 3600);
    }
}
