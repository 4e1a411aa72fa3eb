//! # redb-backed Part Catalog
//!
//! A local catalog cache using the redb embedded database. It implements
//! `CandidateSource`, so a run can pick straight from disk.
//!
//! - ACID imports: a batch lands completely or not at all
//! - Candidate order per module type is preserved (it is the priority)
//! - An explicit object opened for a run, never a global

use crate::PartError;
use crate::picker::{Candidate, CandidateSource};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Module type -> postcard `Vec<Candidate>` in priority order.
const CANDIDATES: TableDefinition<&str, &[u8]> = TableDefinition::new("candidates");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const CANDIDATE_COUNT_KEY: &str = "candidate_count";

fn io(e: impl std::fmt::Display) -> PartError {
    PartError::IoError(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<Vec<Candidate>, PartError> {
    postcard::from_bytes(bytes).map_err(|e| PartError::SerializationError(e.to_string()))
}

/// A persistent candidate catalog.
pub struct CatalogStore {
    db: Database,
    name: String,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CatalogStore {
    /// Open or create a catalog database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PartError> {
        let db = Database::create(path.as_ref()).map_err(io)?;
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(CANDIDATES).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }
        Ok(Self {
            db,
            name: "catalog".to_string(),
        })
    }

    /// Name reported as the `Part` source.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Append candidates behind the stored ones of their type, in one
    /// transaction. Every candidate is validated before anything is written.
    pub fn import(
        &self,
        candidates: impl IntoIterator<Item = Candidate>,
    ) -> Result<usize, PartError> {
        let mut by_type: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            candidate.validate()?;
            by_type
                .entry(candidate.module_type.clone())
                .or_default()
                .push(candidate);
        }

        let write_txn = self.db.begin_write().map_err(io)?;
        let mut added = 0usize;
        {
            let mut table = write_txn.open_table(CANDIDATES).map_err(io)?;
            for (module_type, fresh) in by_type {
                let mut stored = match table.get(module_type.as_str()).map_err(io)? {
                    Some(guard) => decode(guard.value())?,
                    None => Vec::new(),
                };
                added = added.saturating_add(fresh.len());
                stored.extend(fresh);
                let bytes = postcard::to_allocvec(&stored)
                    .map_err(|e| PartError::SerializationError(e.to_string()))?;
                table.insert(module_type.as_str(), bytes.as_slice()).map_err(io)?;
            }

            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            let count = meta
                .get(CANDIDATE_COUNT_KEY)
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta.insert(CANDIDATE_COUNT_KEY, count.saturating_add(added as u64))
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        info!(added, "catalog import committed");
        Ok(added)
    }

    /// Drop every candidate of `module_type`. Returns how many were removed.
    pub fn remove_type(&self, module_type: &str) -> Result<usize, PartError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let removed = {
            let mut table = write_txn.open_table(CANDIDATES).map_err(io)?;
            let removed = match table.remove(module_type).map_err(io)? {
                Some(guard) => decode(guard.value())?.len(),
                None => 0,
            };
            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            let count = meta
                .get(CANDIDATE_COUNT_KEY)
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta.insert(CANDIDATE_COUNT_KEY, count.saturating_sub(removed as u64))
                .map_err(io)?;
            removed
        };
        write_txn.commit().map_err(io)?;
        Ok(removed)
    }

    /// Total stored candidates.
    pub fn candidate_count(&self) -> Result<u64, PartError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(METADATA).map_err(io)?;
        Ok(table
            .get(CANDIDATE_COUNT_KEY)
            .map_err(io)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    /// Number of module types with candidates.
    pub fn type_count(&self) -> Result<u64, PartError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(CANDIDATES).map_err(io)?;
        table.len().map_err(io)
    }

    /// Module types with candidates, in order.
    pub fn module_types(&self) -> Result<Vec<String>, PartError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(CANDIDATES).map_err(io)?;
        let mut types = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            types.push(key.value().to_string());
        }
        Ok(types)
    }

    /// Compact the database.
    pub fn compact(&mut self) -> Result<(), PartError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }
}

impl CandidateSource for CatalogStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, module_type: &str) -> Result<Vec<Candidate>, PartError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(CANDIDATES).map_err(io)?;
        match table.get(module_type).map_err(io)? {
            Some(guard) => decode(guard.value()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn capacitors() -> Vec<Candidate> {
        vec![
            Candidate::new("Capacitor", "C1525")
                .param("capacitance", "100nF".parse().expect("param"))
                .param("rated_voltage", "16V".parse().expect("param")),
            Candidate::new("Capacitor", "C19702")
                .param("capacitance", "10uF".parse().expect("param"))
                .param("rated_voltage", "10V".parse().expect("param")),
        ]
    }

    #[test]
    fn import_and_lookup_preserve_order() {
        let temp = tempdir().expect("temp dir");
        let store = CatalogStore::open(temp.path().join("catalog.redb")).expect("open db");

        assert_eq!(store.import(capacitors()).expect("import"), 2);
        let found = store.candidates("Capacitor").expect("lookup");
        let parts: Vec<_> = found.iter().map(|c| c.part.as_str()).collect();
        assert_eq!(parts, vec!["C1525", "C19702"]);
        assert_eq!(
            found[0]
                .params
                .get("capacitance")
                .map(ToString::to_string)
                .as_deref(),
            Some("100nF")
        );
        assert!(store.candidates("Resistor").expect("lookup").is_empty());
    }

    #[test]
    fn persistence_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("catalog.redb");

        {
            let store = CatalogStore::open(&db_path).expect("open db");
            store.import(capacitors()).expect("import");
        }

        let store = CatalogStore::open(&db_path).expect("reopen db");
        assert_eq!(store.candidate_count().expect("count"), 2);
        assert_eq!(store.type_count().expect("types"), 1);
        assert_eq!(store.module_types().expect("types"), vec!["Capacitor".to_string()]);

        store
            .import(vec![Candidate::new("Capacitor", "C25076")
                .param("capacitance", "10uF".parse().expect("param"))])
            .expect("append");
        let parts: Vec<_> = store
            .candidates("Capacitor")
            .expect("lookup")
            .into_iter()
            .map(|c| c.part)
            .collect();
        assert_eq!(parts, vec!["C1525", "C19702", "C25076"]);
    }

    #[test]
    fn invalid_batch_writes_nothing() {
        let temp = tempdir().expect("temp dir");
        let store = CatalogStore::open(temp.path().join("catalog.redb")).expect("open db");
        let mut batch = capacitors();
        batch.push(Candidate::new("Capacitor", "OPEN").param("capacitance", Default::default()));
        assert!(store.import(batch).is_err());
        assert_eq!(store.candidate_count().expect("count"), 0);
    }

    #[test]
    fn remove_type_updates_count() {
        let temp = tempdir().expect("temp dir");
        let store = CatalogStore::open(temp.path().join("catalog.redb")).expect("open db");
        store.import(capacitors()).expect("import");
        assert_eq!(store.remove_type("Capacitor").expect("remove"), 2);
        assert_eq!(store.candidate_count().expect("count"), 0);
        assert_eq!(store.remove_type("Capacitor").expect("remove"), 0);
    }
}
