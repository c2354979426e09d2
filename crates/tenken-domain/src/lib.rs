//! Domain services and repository traits for inspection rounds

pub mod repository;
pub mod service;
