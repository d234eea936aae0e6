//! Persistence of the dual-level index.
//!
//! The index is stored as a unit in two redb files under the data
//! directory: `documents.redb` and `chunks.redb`. Each holds an `index`
//! table with the serialized vector index blob and a `records` table
//! mapping array position to the JSON-encoded metadata record. Absence of
//! either file means "no index"; anything unreadable or inconsistent is
//! [`Error::PersistenceCorrupt`], and the caller decides whether to rebuild.

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    analyzer::{ChunkRecord, DocumentRecord},
    data_dir::DataDir,
    error::{Error, Result},
    index_store::IndexStore,
    vector_index::VectorIndex,
};

/// Single-entry table holding the vector index blob under key 0.
const INDEX: TableDefinition<u64, &[u8]> = TableDefinition::new("index");

/// Metadata records keyed by array position.
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::PersistenceCorrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Persist both index levels, replacing any previous files.
pub fn save(store: &IndexStore, data_dir: &DataDir) -> Result<()> {
    save_level(
        &data_dir.documents_db(),
        store.document_index(),
        store.documents(),
    )?;
    save_level(&data_dir.chunks_db(), store.chunk_index(), store.chunks())?;
    tracing::info!(
        documents = store.documents().len(),
        chunks = store.chunks().len(),
        dir = %data_dir.root().display(),
        "index saved"
    );
    Ok(())
}

fn save_level<R: Serialize>(
    path: &Path,
    index: &VectorIndex,
    records: &[R],
) -> Result<()> {
    // Replace rather than update: the persisted set must always mirror
    // exactly one build.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let db = Database::create(path)
        .map_err(|e| corrupt(path, e.to_string()))?;

    let txn = db.begin_write()?;
    {
        let mut index_table = txn.open_table(INDEX)?;
        index_table.insert(0u64, index.to_bytes().as_slice())?;

        let mut records_table = txn.open_table(RECORDS)?;
        for (position, record) in records.iter().enumerate() {
            let bytes = serde_json::to_vec(record).map_err(|e| {
                Error::Config(format!("record serialization failed: {e}"))
            })?;
            records_table.insert(position as u64, bytes.as_slice())?;
        }
    }
    txn.commit()?;
    Ok(())
}

/// Load the persisted index, if a complete one exists.
///
/// Returns `Ok(None)` when the file set is absent or partial (treated as
/// "no index"); corrupt or inconsistent contents are an error.
pub fn load(data_dir: &DataDir) -> Result<Option<IndexStore>> {
    let documents_path = data_dir.documents_db();
    let chunks_path = data_dir.chunks_db();

    let documents_present = documents_path.exists();
    let chunks_present = chunks_path.exists();

    if !documents_present || !chunks_present {
        if documents_present != chunks_present {
            tracing::warn!(
                dir = %data_dir.root().display(),
                "partial index file set found; treating as no index"
            );
        }
        return Ok(None);
    }

    let (document_index, documents) =
        load_level::<DocumentRecord>(&documents_path)?;
    let (chunk_index, chunks) = load_level::<ChunkRecord>(&chunks_path)?;

    let store =
        IndexStore::from_parts(documents, chunks, document_index, chunk_index)
            .map_err(|e| corrupt(&chunks_path, e.to_string()))?;

    tracing::info!(
        documents = store.documents().len(),
        chunks = store.chunks().len(),
        "index loaded"
    );
    Ok(Some(store))
}

fn load_level<R: DeserializeOwned>(
    path: &Path,
) -> Result<(VectorIndex, Vec<R>)> {
    let db =
        Database::open(path).map_err(|e| corrupt(path, e.to_string()))?;
    let txn = db
        .begin_read()
        .map_err(|e| corrupt(path, e.to_string()))?;

    let index_table = txn
        .open_table(INDEX)
        .map_err(|e| corrupt(path, e.to_string()))?;
    let blob = index_table
        .get(0u64)
        .map_err(|e| corrupt(path, e.to_string()))?
        .ok_or_else(|| corrupt(path, "missing vector index entry"))?;
    let index = VectorIndex::from_bytes(blob.value())
        .map_err(|e| corrupt(path, e.to_string()))?;

    let records_table = txn
        .open_table(RECORDS)
        .map_err(|e| corrupt(path, e.to_string()))?;

    let mut records = Vec::new();
    for entry in records_table
        .iter()
        .map_err(|e| corrupt(path, e.to_string()))?
    {
        let (key, value) =
            entry.map_err(|e| corrupt(path, e.to_string()))?;

        // redb iterates keys in ascending order; any gap means the
        // positional pairing with the vector index is broken.
        if key.value() != records.len() as u64 {
            return Err(corrupt(
                path,
                format!(
                    "non-contiguous record keys: expected {}, found {}",
                    records.len(),
                    key.value()
                ),
            ));
        }

        let record: R =
            serde_json::from_slice(value.value()).map_err(|e| {
                corrupt(path, format!("record deserialization failed: {e}"))
            })?;
        records.push(record);
    }

    Ok((index, records))
}
