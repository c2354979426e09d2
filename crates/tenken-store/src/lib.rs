//! Persistent store for inspection partitions

pub mod kv;
pub mod partitions;

pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use partitions::{PartitionStore, SCHEMA_VERSION};
