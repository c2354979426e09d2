//! Sync orchestration
//!
//! One sync cycle walks `Idle -> Fetching -> Normalizing -> Reconciling ->
//! Persisting -> Done`, with `Pushing` before the fetch when requested and
//! `Failed` on any fetch or parse error. Push failures and storage write
//! failures are reported but never abort the cycle. The cycle takes
//! `&mut self`, so only one runs at a time per orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use tenken_domain::repository::{PartitionRepository, SheetSource};
use tenken_domain::service::{count_records, merge, normalize_rows, route_batch};
use tenken_store::{KeyValueStore, PartitionStore};
use tenken_types::{
    AggregateCounts, OrphanPolicy, PartitionConfig, RemainingFormula, SyncError, VehicleRecord,
};

/// Where a sync cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Pushing,
    Fetching,
    Normalizing,
    Reconciling,
    Persisting,
    Done,
    Failed,
}

impl SyncPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "待機中",
            SyncPhase::Pushing => "送信中",
            SyncPhase::Fetching => "取得中",
            SyncPhase::Normalizing => "整形中",
            SyncPhase::Reconciling => "照合中",
            SyncPhase::Persisting => "保存中",
            SyncPhase::Done => "完了",
            SyncPhase::Failed => "失敗",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

/// Fixed behaviour of an orchestrator
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
    pub sheet: Option<String>,
    pub orphan_policy: OrphanPolicy,
    pub remaining_formula: RemainingFormula,
}

/// Per-cycle options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Push the local working set before pulling
    pub push: bool,
    /// Partitions whose local state is discarded before merging
    pub reset: Vec<String>,
    /// Discard local state of every partition
    pub reset_all: bool,
    /// Fetch `?action=config` and cache it before pulling
    pub refresh_config: bool,
}

impl SyncOptions {
    /// Reject reset names that match no partition
    pub fn validate(&self, partitions: &[PartitionConfig]) -> tenken_types::Result<()> {
        for name in &self.reset {
            crate::checklist::find_partition(partitions, name)?;
        }
        Ok(())
    }

    fn resets(&self, partition: &PartitionConfig) -> bool {
        self.reset_all || self.reset.iter().any(|name| partition.matches_name(name))
    }
}

/// Result of one partition in a cycle
#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    pub name: String,
    pub prefix: String,
    pub reset: bool,
    pub matched: usize,
    pub added: usize,
    pub dropped: usize,
    pub kept: usize,
    pub counts: AggregateCounts,
    /// Storage write failure; the counts still describe the merged set
    pub storage_error: Option<String>,
}

/// Outcome of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when no push was attempted
    pub pushed: Option<bool>,
    pub push_error: Option<String>,
    pub config_refreshed: bool,
    pub config_error: Option<String>,
    pub rows_pulled: usize,
    /// Rows that matched no partition
    pub unassigned: usize,
    pub partitions: Vec<PartitionSummary>,
    pub overall: AggregateCounts,
    pub phases: Vec<SyncPhase>,
}

impl SyncReport {
    pub fn storage_errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.partitions
            .iter()
            .filter_map(|p| p.storage_error.as_deref().map(|e| (p.name.as_str(), e)))
    }
}

/// Drives pull/merge/persist cycles against one source and store
pub struct SyncOrchestrator<S: SheetSource, K: KeyValueStore> {
    source: S,
    store: PartitionStore<K>,
    partitions: Vec<PartitionConfig>,
    settings: SyncSettings,
    phase: watch::Sender<SyncPhase>,
    history: Vec<SyncPhase>,
}

impl<S: SheetSource, K: KeyValueStore> SyncOrchestrator<S, K> {
    pub fn new(
        source: S,
        store: PartitionStore<K>,
        partitions: Vec<PartitionConfig>,
        settings: SyncSettings,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            source,
            store,
            partitions,
            settings,
            phase,
            history: Vec::new(),
        }
    }

    /// Live phase updates
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn partitions(&self) -> &[PartitionConfig] {
        &self.partitions
    }

    pub fn store(&self) -> &PartitionStore<K> {
        &self.store
    }

    pub fn into_store(self) -> PartitionStore<K> {
        self.store
    }

    fn enter(&mut self, phase: SyncPhase) {
        info!("Sync phase: {:?}", phase);
        self.history.push(phase);
        self.phase.send_replace(phase);
    }

    fn fail(&mut self, error: SyncError) -> SyncError {
        warn!("Sync failed: {}", error);
        self.enter(SyncPhase::Failed);
        error
    }

    /// Run one full cycle
    pub async fn sync(&mut self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        self.history.clear();
        self.enter(SyncPhase::Idle);

        let (config_refreshed, config_error) = if options.refresh_config {
            self.refresh_config().await
        } else {
            (false, None)
        };

        let (pushed, push_error) = if options.push {
            self.enter(SyncPhase::Pushing);
            match self.push_all().await {
                Ok(()) => (Some(true), None),
                Err(e) => {
                    warn!("Push failed, continuing with pull: {}", e);
                    (Some(false), Some(e.user_message()))
                }
            }
        } else {
            (None, None)
        };

        self.enter(SyncPhase::Fetching);
        let rows = match self.source.pull(self.settings.sheet.as_deref()).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.fail(e)),
        };
        info!("Pulled {} rows", rows.len());

        self.enter(SyncPhase::Normalizing);
        let records = normalize_rows(&rows);

        self.enter(SyncPhase::Reconciling);
        let batch = route_batch(records, &self.partitions);
        if batch.unassigned > 0 {
            warn!("{} rows matched no partition", batch.unassigned);
        }
        let merged: Vec<(PartitionConfig, bool, _)> = batch
            .partitions
            .into_iter()
            .map(|(partition, pulled)| {
                let reset = options.resets(&partition);
                let existing = if reset {
                    Vec::new()
                } else {
                    self.store.read(&partition.name)
                };
                let outcome = merge(&existing, pulled, &partition, self.settings.orphan_policy);
                (partition, reset, outcome)
            })
            .collect();

        self.enter(SyncPhase::Persisting);
        let formula = self.settings.remaining_formula;
        let mut summaries = Vec::with_capacity(merged.len());
        for (partition, reset, outcome) in merged {
            let storage_error = self
                .persist(&partition, reset, &outcome.records)
                .err()
                .map(|e| {
                    warn!("Failed to store {}: {}", partition.name, e);
                    e.to_string()
                });
            summaries.push(PartitionSummary {
                name: partition.name.clone(),
                prefix: partition.prefix.clone(),
                reset,
                matched: outcome.matched,
                added: outcome.added,
                dropped: outcome.dropped,
                kept: outcome.kept,
                counts: count_records(&outcome.records, formula),
                storage_error,
            });
        }

        self.enter(SyncPhase::Done);
        let overall: AggregateCounts = summaries.iter().map(|s| s.counts).sum();
        Ok(SyncReport {
            started_at,
            finished_at: Utc::now(),
            pushed,
            push_error,
            config_refreshed,
            config_error,
            rows_pulled: rows.len(),
            unassigned: batch.unassigned,
            partitions: summaries,
            overall,
            phases: self.history.clone(),
        })
    }

    fn persist(
        &mut self,
        partition: &PartitionConfig,
        reset: bool,
        records: &[VehicleRecord],
    ) -> Result<(), tenken_types::StorageError> {
        if reset {
            self.store.clear(&partition.name)?;
        }
        self.store.write(&partition.name, records)
    }

    async fn push_all(&self) -> Result<(), SyncError> {
        let records: Vec<VehicleRecord> = self
            .partitions
            .iter()
            .flat_map(|p| self.store.read(&p.name))
            .collect();
        info!("Pushing {} records", records.len());
        self.source.push(&records).await
    }

    async fn refresh_config(&mut self) -> (bool, Option<String>) {
        match self.source.fetch_config().await {
            Ok(partitions) if partitions.is_empty() => {
                warn!("Remote config is empty, keeping current partitions");
                (false, None)
            }
            Ok(partitions) => {
                let error = self
                    .store
                    .write_partition_config(&partitions)
                    .err()
                    .map(|e| {
                        warn!("Failed to cache partition config: {}", e);
                        e.to_string()
                    });
                info!("Loaded {} partitions from remote config", partitions.len());
                self.partitions = partitions;
                (true, error)
            }
            Err(e) => {
                warn!("Config fetch failed, keeping current partitions: {}", e);
                (false, Some(e.user_message()))
            }
        }
    }
}
