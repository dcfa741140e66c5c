//! # redb-backed Application Storage
//!
//! A disk-backed store for wizard snapshots using the redb embedded
//! database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Integration with Session
//!
//! `RedbStore` backs the `Persistent` variant of `ApplicationStore`.
//! Unlike the in-memory variant, snapshots written here survive process
//! restarts; each row is a framed snapshot (magic + version header) so a
//! database written by one build can be validated by another.

use crate::formats::{snapshot_from_bytes, snapshot_to_bytes};
use crate::session::WizardSnapshot;
use crate::types::{ApplicationId, TrellisError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for applications: ApplicationId(u64) -> framed snapshot bytes.
const APPLICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("applications");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Metadata key holding the next identifier to hand out.
const NEXT_APPLICATION_ID: &str = "next_application_id";

/// A disk-backed application store using redb.
///
/// Identifiers are allocated from a metadata counter that is committed in
/// the same transaction as the allocation, so ids stay monotonic across
/// process restarts.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next identifier to allocate, mirrored from the metadata table.
    next_application_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_application_id", &self.next_application_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create an application database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| TrellisError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(APPLICATIONS)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
        }

        // Load metadata
        let next_application_id = {
            let read_txn = db
                .begin_read()
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            let table = read_txn
                .open_table(METADATA)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            table
                .get(NEXT_APPLICATION_ID)
                .map_err(|e| TrellisError::IoError(e.to_string()))?
                .map(|v| v.value())
                .unwrap_or(1)
        };

        Ok(Self {
            db,
            next_application_id,
        })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), TrellisError> {
        self.db
            .compact()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Allocate a fresh application identifier.
    ///
    /// The counter advance is committed before the id is returned, so a
    /// crash between allocation and first write can skip an id but never
    /// reuse one.
    pub fn allocate_id(&mut self) -> Result<ApplicationId, TrellisError> {
        let id = self.next_application_id;
        let next = id.saturating_add(1);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        {
            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            meta_table
                .insert(NEXT_APPLICATION_ID, next)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;

        // Update in-memory state only after successful commit.
        self.next_application_id = next;
        Ok(ApplicationId(id))
    }

    /// Store one application's snapshot, replacing any previous one.
    pub fn put(
        &mut self,
        application: ApplicationId,
        snapshot: &WizardSnapshot,
    ) -> Result<(), TrellisError> {
        let bytes = snapshot_to_bytes(snapshot)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(APPLICATIONS)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            table
                .insert(application.0, bytes.as_slice())
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load one application's snapshot.
    pub fn get(&self, application: ApplicationId) -> Result<Option<WizardSnapshot>, TrellisError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(APPLICATIONS)
            .map_err(|e| TrellisError::IoError(e.to_string()))?;

        match table
            .get(application.0)
            .map_err(|e| TrellisError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(snapshot_from_bytes(data.value())?)),
            None => Ok(None),
        }
    }

    /// All stored application identifiers in ascending order.
    pub fn list_ids(&self) -> Result<Vec<ApplicationId>, TrellisError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(APPLICATIONS)
            .map_err(|e| TrellisError::IoError(e.to_string()))?;

        let mut ids = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| TrellisError::IoError(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| TrellisError::IoError(e.to_string()))?;
            ids.push(ApplicationId(key.value()));
        }
        Ok(ids)
    }

    /// Delete one application. Returns whether it existed.
    pub fn remove(&mut self, application: ApplicationId) -> Result<bool, TrellisError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        let existed = {
            let mut table = write_txn
                .open_table(APPLICATIONS)
                .map_err(|e| TrellisError::IoError(e.to_string()))?;
            table
                .remove(application.0)
                .map_err(|e| TrellisError::IoError(e.to_string()))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        Ok(existed)
    }

    /// Number of stored applications.
    pub fn application_count(&self) -> Result<usize, TrellisError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(APPLICATIONS)
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        let count = table
            .len()
            .map_err(|e| TrellisError::IoError(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::session::WizardSession;
    use crate::stage::Stage;
    use crate::types::{FieldName, FieldValue, SubFormId};
    use tempfile::tempdir;

    fn sample_snapshot() -> WizardSnapshot {
        let mut session = WizardSession::new();
        session
            .set_field(
                Stage::FundPosition,
                &SubFormId::new("fund_position"),
                FieldName::new("fund_name"),
                FieldValue::text("Meridian Infrastructure Debt Fund"),
            )
            .expect("set field");
        session.snapshot()
    }

    #[test]
    fn put_and_get_roundtrip() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let id = store.allocate_id().expect("allocate");
        let snapshot = sample_snapshot();
        store.put(id, &snapshot).expect("put");

        let loaded = store.get(id).expect("get").expect("snapshot");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn missing_application_returns_none() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let store = RedbStore::open(&db_path).expect("open db");

        assert_eq!(store.get(ApplicationId(99)).expect("get"), None);
        assert_eq!(store.application_count().expect("count"), 0);
    }

    #[test]
    fn identifiers_are_monotonic() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let first = store.allocate_id().expect("allocate");
        let second = store.allocate_id().expect("allocate");
        let third = store.allocate_id().expect("allocate");

        assert_eq!(first, ApplicationId(1));
        assert_eq!(second, ApplicationId(2));
        assert_eq!(third, ApplicationId(3));
    }

    #[test]
    fn put_overwrites_previous_snapshot() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let id = store.allocate_id().expect("allocate");
        store.put(id, &WizardSession::new().snapshot()).expect("put");
        let updated = sample_snapshot();
        store.put(id, &updated).expect("put again");

        assert_eq!(store.get(id).expect("get"), Some(updated));
        assert_eq!(store.application_count().expect("count"), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let id = store.allocate_id().expect("allocate");
        store.put(id, &sample_snapshot()).expect("put");

        assert!(store.remove(id).expect("remove"));
        assert!(!store.remove(id).expect("remove again"));
        assert_eq!(store.get(id).expect("get"), None);
    }

    #[test]
    fn list_ids_ascending() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let snapshot = sample_snapshot();
        let mut expected = Vec::new();
        for _ in 0..3 {
            let id = store.allocate_id().expect("allocate");
            store.put(id, &snapshot).expect("put");
            expected.push(id);
        }

        assert_eq!(store.list_ids().expect("list"), expected);
    }

    // =========================================================================
    // Recovery after crash tests (simulated via reopen)
    // =========================================================================

    #[test]
    fn snapshots_persist_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let snapshot = sample_snapshot();

        let id;
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            id = store.allocate_id().expect("allocate");
            store.put(id, &snapshot).expect("put");
        }
        // Store dropped here, simulating process exit

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.get(id).expect("get"), Some(snapshot));
            assert_eq!(store.application_count().expect("count"), 1);
        }
    }

    #[test]
    fn next_identifier_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let last_before_reopen;
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.allocate_id().expect("allocate");
            last_before_reopen = store.allocate_id().expect("allocate");
        }

        {
            let mut store = RedbStore::open(&db_path).expect("reopen db");
            let fresh = store.allocate_id().expect("allocate");
            assert!(
                fresh.0 > last_before_reopen.0,
                "fresh id {} should be > previous {}",
                fresh.0,
                last_before_reopen.0
            );
        }
    }

    #[test]
    fn multiple_reopen_cycles() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let snapshot = sample_snapshot();

        for round in 1..=3u64 {
            let mut store = RedbStore::open(&db_path).expect("open db");
            assert_eq!(store.application_count().expect("count"), round as usize - 1);
            let id = store.allocate_id().expect("allocate");
            store.put(id, &snapshot).expect("put");
        }

        let store = RedbStore::open(&db_path).expect("final open");
        assert_eq!(store.application_count().expect("count"), 3);
    }

    #[test]
    fn compact_preserves_data() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let snapshot = sample_snapshot();

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            for _ in 0..5 {
                let id = store.allocate_id().expect("allocate");
                store.put(id, &snapshot).expect("put");
            }
            store.compact().expect("compact");
        }

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.application_count().expect("count"), 5);
            assert_eq!(store.get(ApplicationId(3)).expect("get"), Some(snapshot));
        }
    }
}
