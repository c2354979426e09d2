//! Core types for inspection rounds

use serde::{Deserialize, Serialize};

/// Inspection status tag
///
/// Serialized as `""`, `"stop"`, `"skip"`, `"7days_rule"`. Older spellings
/// are folded in once by [`InspectionStatus::from_raw`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InspectionStatus {
    /// 通常 / 待機
    #[default]
    Standby,
    /// 停止
    Stop,
    /// スキップ
    Skip,
    /// 7日ルール
    SevenDaysRule,
}

impl InspectionStatus {
    /// Migrate any known upstream spelling into the closed set
    ///
    /// Unknown values fall back to standby.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stop" | "stopped" | "停止" | "休車" | "運休" => InspectionStatus::Stop,
            "skip" | "skipped" | "スキップ" | "対象外" => InspectionStatus::Skip,
            "7days_rule" | "7days" | "7day" | "7day_rule" | "seven_days" | "7日ルール" => {
                InspectionStatus::SevenDaysRule
            }
            _ => InspectionStatus::Standby,
        }
    }

    /// True for legacy status strings that actually meant "inspected"
    pub fn is_checked_marker(raw: &str) -> bool {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "checked" | "done" | "済" | "点検済" | "完了"
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionStatus::Standby => "",
            InspectionStatus::Stop => "stop",
            InspectionStatus::Skip => "skip",
            InspectionStatus::SevenDaysRule => "7days_rule",
        }
    }

    /// Get display label in Japanese
    pub fn label(&self) -> &'static str {
        match self {
            InspectionStatus::Standby => "通常",
            InspectionStatus::Stop => "停止",
            InspectionStatus::Skip => "スキップ",
            InspectionStatus::SevenDaysRule => "7日ルール",
        }
    }
}

impl From<String> for InspectionStatus {
    fn from(raw: String) -> Self {
        InspectionStatus::from_raw(&raw)
    }
}

impl From<InspectionStatus> for String {
    fn from(status: InspectionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One inspection target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleRecord {
    /// 地域 / 市区町村
    #[serde(alias = "city")]
    pub area: String,
    /// 住所
    pub address: String,
    /// ステーション名
    pub station: String,
    /// 車種
    pub model: String,
    /// ナンバー
    pub plate: String,
    /// 備考
    pub note: String,
    /// 担当者
    pub operator: String,
    pub status: InspectionStatus,
    pub checked: bool,
    /// YYYY-MM-DD, empty if never inspected
    pub last_inspected_at: String,
    /// Prefix letter + 1-based position, e.g. "Y1"
    pub display_index: String,
}

impl VehicleRecord {
    /// Resolve contradictory flags: a checked record carries no status tag
    pub fn canonicalize(&mut self) {
        if self.checked {
            self.status = InspectionStatus::Standby;
        }
    }

    /// Whether the record carries any user-entered state
    pub fn has_user_state(&self) -> bool {
        self.checked
            || self.status != InspectionStatus::Standby
            || !self.last_inspected_at.is_empty()
    }

    /// Copy user-entered state from another record
    pub fn take_user_state(&mut self, from: &VehicleRecord) {
        self.checked = from.checked;
        self.status = from.status;
        self.last_inspected_at = from.last_inspected_at.clone();
    }

    /// Drop user-entered state
    pub fn clear_user_state(&mut self) {
        self.checked = false;
        self.status = InspectionStatus::Standby;
        self.last_inspected_at.clear();
    }
}

/// Locate a record by key: unique non-blank plate first, display index second
///
/// Returns the position of the first match.
pub fn locate_record(records: &[VehicleRecord], key: &str) -> Option<usize> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let mut plate_hits = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.plate.is_empty() && r.plate == key);
    if let Some((pos, _)) = plate_hits.next() {
        if plate_hits.next().is_none() {
            return Some(pos);
        }
    }

    records.iter().position(|r| r.display_index == key)
}

/// Whether a partition is offered to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartitionStatus {
    #[default]
    Active,
    Stop,
}

impl From<String> for PartitionStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stop" | "stopped" | "停止" => PartitionStatus::Stop,
            _ => PartitionStatus::Active,
        }
    }
}

impl From<PartitionStatus> for String {
    fn from(status: PartitionStatus) -> Self {
        match status {
            PartitionStatus::Active => "active".to_string(),
            PartitionStatus::Stop => "stop".to_string(),
        }
    }
}

/// One city partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Display name, e.g. "大和市"
    pub name: String,
    /// Romanized identifier, e.g. "yamato"
    #[serde(default)]
    pub slug: String,
    /// Display index prefix, e.g. "Y"
    pub prefix: String,
    #[serde(default)]
    pub status: PartitionStatus,
}

impl PartitionConfig {
    pub fn new(name: &str, slug: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            prefix: prefix.to_string(),
            status: PartitionStatus::Active,
        }
    }

    /// Name without a trailing 市/区/町/村 ("大和市" -> "大和")
    pub fn city_stem(&self) -> &str {
        let name = self.name.trim();
        for suffix in ['市', '区', '町', '村'] {
            if let Some(stem) = name.strip_suffix(suffix) {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
        name
    }

    pub fn is_offered(&self) -> bool {
        self.status == PartitionStatus::Active
    }

    /// Whether `name_or_slug` refers to this partition
    pub fn matches_name(&self, name_or_slug: &str) -> bool {
        let needle = name_or_slug.trim();
        !needle.is_empty()
            && (self.name == needle
                || (!self.slug.is_empty() && self.slug.eq_ignore_ascii_case(needle)))
    }
}

/// Default city set
pub fn default_partitions() -> Vec<PartitionConfig> {
    vec![
        PartitionConfig::new("大和市", "yamato", "Y"),
        PartitionConfig::new("海老名市", "ebina", "E"),
        PartitionConfig::new("茅ヶ崎市", "chigasaki", "C"),
    ]
}

/// How `remaining` is derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingFormula {
    /// total - done - skipped
    #[default]
    ExcludeStopped,
    /// total - done - stopped - skipped
    SubtractStopped,
}

/// What happens to local records no longer present upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// A full pull replaces the member set
    #[default]
    Discard,
    /// Local-only records with user state are appended after pulled ones
    KeepEdited,
}

/// Derived counts for one partition or all of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub done: usize,
    pub stopped: usize,
    pub skipped: usize,
    pub total: usize,
    pub remaining: usize,
}

impl AggregateCounts {
    /// Completion ratio in percent (done / total)
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

impl std::ops::Add for AggregateCounts {
    type Output = AggregateCounts;

    fn add(self, rhs: Self) -> Self::Output {
        AggregateCounts {
            done: self.done + rhs.done,
            stopped: self.stopped + rhs.stopped,
            skipped: self.skipped + rhs.skipped,
            total: self.total + rhs.total,
            remaining: self.remaining + rhs.remaining,
        }
    }
}

impl std::iter::Sum for AggregateCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(AggregateCounts::default(), |acc, c| acc + c)
    }
}
