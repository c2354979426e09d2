//! Domain services

pub mod aggregator;
pub mod city_router;
pub mod normalizer;
pub mod reconciler;
pub mod render_state;

pub use aggregator::{count_records, counts_for, counts_overall};
pub use city_router::{route, route_batch, RoutedBatch};
pub use normalizer::{normalize_row, normalize_rows};
pub use reconciler::{merge, reconcile, reset, ReconcileOutcome};
pub use render_state::{display_order, render_state, RenderState};
