//! Application service layer - config, bootstrap, checklist edits, sync orchestration

pub mod bootstrap;
pub mod checklist;
pub mod config;
pub mod repository;
pub mod sync;
