//! # Persistent Storage
//!
//! Disk-backed application storage built on the redb embedded database.

mod redb_store;

pub use redb_store::RedbStore;
