//! Row normalizer
//!
//! Converts one loosely-typed remote row into a [`VehicleRecord`]. Rows come
//! in three shapes: an object with arbitrary key names, an array alternating
//! keys and values, or a bare positional array. Nothing here fails; unusable
//! input degrades to an all-default record.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use tenken_types::{InspectionStatus, VehicleRecord};

use super::render_state::jst;

/// Canonical record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Area,
    Address,
    Station,
    Model,
    Plate,
    Note,
    Operator,
    Status,
    Checked,
    LastInspectedAt,
}

/// Candidate source keys per field, tried in order
///
/// Key comparison ignores ASCII case and surrounding whitespace.
pub const FIELD_CANDIDATES: &[(Field, &[&str])] = &[
    (Field::Area, &["area", "city", "エリア", "地域", "市区町村", "市町村", "自治体"]),
    (Field::Address, &["address", "addr", "住所", "所在地"]),
    (
        Field::Station,
        &["station", "stationName", "station_name", "ステーション", "ステーション名", "拠点", "場所"],
    ),
    (Field::Model, &["model", "carModel", "car", "vehicle", "車種", "車名", "車両"]),
    (
        Field::Plate,
        &["plate", "plateNumber", "plate_no", "number", "ナンバー", "登録番号", "車番"],
    ),
    (Field::Note, &["note", "memo", "remarks", "備考", "メモ"]),
    (Field::Operator, &["operator", "staff", "user", "担当者", "担当", "作業者"]),
    (Field::Status, &["status", "state", "flag", "ステータス", "状態"]),
    (Field::Checked, &["checked", "done", "inspected", "点検済", "チェック"]),
    (
        Field::LastInspectedAt,
        &["last_inspected_at", "lastInspectedAt", "checkedAt", "last", "date", "最終点検日", "点検日", "日付"],
    ),
];

/// Column order of a bare positional row
pub const POSITIONAL_COLUMNS: &[Field] = &[
    Field::Area,
    Field::Address,
    Field::Station,
    Field::Model,
    Field::Plate,
    Field::Note,
    Field::Operator,
    Field::Status,
    Field::Checked,
    Field::LastInspectedAt,
];

fn candidates(field: Field) -> &'static [&'static str] {
    FIELD_CANDIDATES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

fn is_known_key(key: &str) -> bool {
    let key = key.trim();
    FIELD_CANDIDATES
        .iter()
        .flat_map(|(_, keys)| keys.iter())
        .any(|c| c.eq_ignore_ascii_case(key))
}

/// Scalar JSON value as trimmed text; containers become empty
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Field lookup over one source shape
trait FieldSource {
    fn lookup(&self, field: Field) -> Option<&Value>;

    fn text(&self, field: Field) -> String {
        self.lookup(field).map(scalar_text).unwrap_or_default()
    }
}

struct KeyedRow<'a> {
    entries: Vec<(&'a str, &'a Value)>,
}

impl FieldSource for KeyedRow<'_> {
    fn lookup(&self, field: Field) -> Option<&Value> {
        for candidate in candidates(field) {
            let hit = self
                .entries
                .iter()
                .filter(|(key, _)| key.trim().eq_ignore_ascii_case(candidate))
                .map(|(_, value)| *value)
                .find(|value| !scalar_text(value).is_empty());
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

struct PositionalRow<'a> {
    columns: HashMap<Field, &'a Value>,
}

impl FieldSource for PositionalRow<'_> {
    fn lookup(&self, field: Field) -> Option<&Value> {
        self.columns.get(&field).copied()
    }
}

/// Even-length array whose even slots are strings naming at least one known field
fn is_alternating(items: &[Value]) -> bool {
    if items.is_empty() || items.len() % 2 != 0 {
        return false;
    }
    let keys: Vec<&str> = items.iter().step_by(2).filter_map(Value::as_str).collect();
    keys.len() == items.len() / 2 && keys.iter().any(|k| is_known_key(k))
}

fn parse_checked(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "on" | "済" | "○" | "✓" | "checked"
        ),
        _ => false,
    }
}

/// Normalize a date-ish value to `YYYY-MM-DD`, or empty if unrecognised
///
/// Numbers are treated as epoch milliseconds and read in JST.
pub fn normalize_date_value(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&jst()).date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Value::String(s) => normalize_date(s),
        _ => String::new(),
    }
}

/// Normalize a date string to `YYYY-MM-DD`, or empty if unrecognised
pub fn normalize_date(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Parse the date formats seen upstream
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&jst()).date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn build_record(source: &dyn FieldSource) -> VehicleRecord {
    let raw_status = source.text(Field::Status);
    let mut record = VehicleRecord {
        area: source.text(Field::Area),
        address: source.text(Field::Address),
        station: source.text(Field::Station),
        model: source.text(Field::Model),
        plate: source.text(Field::Plate),
        note: source.text(Field::Note),
        operator: source.text(Field::Operator),
        status: InspectionStatus::from_raw(&raw_status),
        checked: parse_checked(source.lookup(Field::Checked))
            || InspectionStatus::is_checked_marker(&raw_status),
        last_inspected_at: source
            .lookup(Field::LastInspectedAt)
            .map(normalize_date_value)
            .unwrap_or_default(),
        display_index: String::new(),
    };
    record.canonicalize();
    record
}

/// Normalize one raw row
pub fn normalize_row(raw: &Value) -> VehicleRecord {
    match raw {
        Value::Object(map) => build_record(&KeyedRow {
            entries: map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        }),
        Value::Array(items) if is_alternating(items) => build_record(&KeyedRow {
            entries: items
                .chunks(2)
                .filter_map(|pair| pair[0].as_str().map(|k| (k, &pair[1])))
                .collect(),
        }),
        Value::Array(items) => build_record(&PositionalRow {
            columns: POSITIONAL_COLUMNS.iter().copied().zip(items.iter()).collect(),
        }),
        other => {
            debug!("Unusable row degraded to defaults: {}", other);
            VehicleRecord::default()
        }
    }
}

/// Normalize a batch; bad rows degrade individually
pub fn normalize_rows(rows: &[Value]) -> Vec<VehicleRecord> {
    rows.iter().map(normalize_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_rows_degrade_to_default() {
        assert_eq!(normalize_row(&Value::Null), VehicleRecord::default());
        assert_eq!(normalize_row(&json!([])), VehicleRecord::default());
        assert_eq!(normalize_row(&json!({})), VehicleRecord::default());
        assert_eq!(normalize_row(&json!(42)), VehicleRecord::default());
        assert_eq!(normalize_row(&json!("just text")), VehicleRecord::default());
    }

    #[test]
    fn test_object_with_english_keys() {
        let r = normalize_row(&json!({
            "city": " 大和市 ",
            "station": "A駅",
            "model": "プリウス",
            "plate": "111",
        }));
        assert_eq!(r.area, "大和市");
        assert_eq!(r.station, "A駅");
        assert_eq!(r.model, "プリウス");
        assert_eq!(r.plate, "111");
        assert_eq!(r.address, "");
        assert!(!r.checked);
    }

    #[test]
    fn test_object_with_japanese_keys() {
        let r = normalize_row(&json!({
            "市区町村": "海老名市",
            "ステーション名": "B駅前",
            "車種": "アクア",
            "ナンバー": "相模 500 あ 12-34",
            "備考": "鍵は受付",
        }));
        assert_eq!(r.area, "海老名市");
        assert_eq!(r.station, "B駅前");
        assert_eq!(r.plate, "相模 500 あ 12-34");
        assert_eq!(r.note, "鍵は受付");
    }

    #[test]
    fn test_first_non_empty_candidate_wins() {
        let r = normalize_row(&json!({ "area": "  ", "city": "大和市" }));
        assert_eq!(r.area, "大和市");
    }

    #[test]
    fn test_key_case_ignored() {
        let r = normalize_row(&json!({ "Station": "C駅", "PLATE": "9" }));
        assert_eq!(r.station, "C駅");
        assert_eq!(r.plate, "9");
    }

    #[test]
    fn test_alternating_array() {
        let r = normalize_row(&json!(["city", "大和市", "station", "A駅", "plate", 111]));
        assert_eq!(r.area, "大和市");
        assert_eq!(r.station, "A駅");
        assert_eq!(r.plate, "111");
    }

    #[test]
    fn test_positional_array() {
        let r = normalize_row(&json!(["大和市", "大和市中央1-1", "A駅", "ノート", "111"]));
        assert_eq!(r.area, "大和市");
        assert_eq!(r.address, "大和市中央1-1");
        assert_eq!(r.station, "A駅");
        assert_eq!(r.model, "ノート");
        assert_eq!(r.plate, "111");
    }

    #[test]
    fn test_even_array_without_known_keys_is_positional() {
        let r = normalize_row(&json!(["大和市", "住所", "A駅", "ノート"]));
        assert_eq!(r.area, "大和市");
        assert_eq!(r.station, "A駅");
    }

    #[test]
    fn test_status_vocabulary_migrated() {
        let r = normalize_row(&json!({ "status": "stopped" }));
        assert_eq!(r.status, InspectionStatus::Stop);
        let r = normalize_row(&json!({ "status": "normal" }));
        assert_eq!(r.status, InspectionStatus::Standby);
        let r = normalize_row(&json!({ "status": "Checked" }));
        assert!(r.checked);
        assert_eq!(r.status, InspectionStatus::Standby);
    }

    #[test]
    fn test_checked_and_status_resolved() {
        let r = normalize_row(&json!({ "checked": true, "status": "skip" }));
        assert!(r.checked);
        assert_eq!(r.status, InspectionStatus::Standby);
    }

    #[test]
    fn test_dates_normalized() {
        assert_eq!(normalize_date("2024/01/05"), "2024-01-05");
        assert_eq!(normalize_date("2024年1月5日"), "2024-01-05");
        assert_eq!(normalize_date("2024-01-04T20:00:00Z"), "2024-01-05");
        assert_eq!(normalize_date("yesterday"), "");
        let r = normalize_row(&json!({ "date": "2024/03/01 10:30" }));
        assert_eq!(r.last_inspected_at, "2024-03-01");
    }

    #[test]
    fn test_epoch_millis_date_in_jst() {
        // 2024-01-01T15:00:00Z is 2024-01-02 in JST
        let r = normalize_row(&json!({ "last": 1_704_121_200_000_i64 }));
        assert_eq!(r.last_inspected_at, "2024-01-02");
    }

    #[test]
    fn test_batch_keeps_bad_rows() {
        let rows = vec![json!({"plate": "1"}), Value::Null, json!({"plate": "2"})];
        let records = normalize_rows(&rows);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], VehicleRecord::default());
    }
}
