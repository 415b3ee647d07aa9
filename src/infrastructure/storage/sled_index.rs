use std::path::Path;

use bincode::Options;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::{
    transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError},
    Config, Db, Transactional, Tree,
};
use tracing::debug;

use crate::{
    application::services::VectorIndex,
    domain::{Document, DomainError, IndexedDocument, RetrievedChunk},
};

use super::{ensure_dims, rank, validate_batch};

const DOCUMENTS_TREE: &str = "documents";
const IDS_TREE: &str = "document_ids";
const META_TREE: &str = "meta";
const DIMS_KEY: &[u8] = b"dims";

/// Persistent vector index backed by `sled`.
///
/// Documents are stored under a monotonically increasing sequence key so a
/// scan yields insertion order; a second tree maps document ids to those keys
/// to enforce uniqueness. Similarity is computed in memory at query time.
pub struct SledVectorIndex {
    db: Db,
    documents: Tree,
    ids: Tree,
    meta: Tree,
    write_lock: Mutex<()>,
}

impl SledVectorIndex {
    /// Opens (or creates) a sled database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            DomainError::storage(format!("failed to create data directory {:?}: {err}", dir))
        })?;

        let db = Config::default()
            .path(&dir)
            .cache_capacity(16 * 1024 * 1024)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        Self::from_db(db)
    }

    /// Opens a throwaway database that is removed when dropped.
    pub fn temporary() -> Result<Self, DomainError> {
        let db = Config::default()
            .temporary(true)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, DomainError> {
        let open = |name: &str| {
            db.open_tree(name).map_err(|err| {
                DomainError::storage(format!("failed to open {name} tree: {err}"))
            })
        };
        let documents = open(DOCUMENTS_TREE)?;
        let ids = open(IDS_TREE)?;
        let meta = open(META_TREE)?;

        Ok(Self {
            db,
            documents,
            ids,
            meta,
            write_lock: Mutex::new(()),
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .serialize(value)
            .map_err(|err| DomainError::storage(format!("serialization error: {err}")))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .deserialize(bytes)
            .map_err(|err| DomainError::storage(format!("deserialization error: {err}")))
    }

    fn stored_dims(&self) -> Result<Option<usize>, DomainError> {
        let raw = self
            .meta
            .get(DIMS_KEY)
            .map_err(|err| DomainError::storage(format!("failed to read index metadata: {err}")))?;
        raw.map(|bytes| Self::deserialize::<u64>(&bytes).map(|dims| dims as usize))
            .transpose()
    }

    fn load_all(&self) -> Result<Vec<IndexedDocument>, DomainError> {
        self.documents
            .iter()
            .map(|entry| {
                let (_, value) = entry.map_err(|err| {
                    DomainError::storage(format!("failed to read document record: {err}"))
                })?;
                Self::deserialize(&value)
            })
            .collect()
    }
}

impl VectorIndex for SledVectorIndex {
    fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
    ) -> Result<(), DomainError> {
        let batch_dims = validate_batch(ids, vectors, documents)?;
        let _guard = self.write_lock.lock();

        let mut staged = Vec::with_capacity(ids.len());
        for ((id, vector), body) in ids.iter().zip(vectors).zip(documents) {
            let seq = self
                .db
                .generate_id()
                .map_err(|err| DomainError::storage(format!("failed to allocate key: {err}")))?;
            let record = IndexedDocument::new(
                Document::new(id.as_str(), body.as_str()),
                vector.clone(),
            );
            staged.push((seq.to_be_bytes().to_vec(), id.as_str(), Self::serialize(&record)?));
        }
        let dims_record = batch_dims
            .map(|dims| Self::serialize(&(dims as u64)))
            .transpose()?;

        // The whole batch lands or none of it does.
        (&self.documents, &self.ids, &self.meta)
            .transaction(|(doc_tree, id_tree, meta_tree)| -> ConflictableTransactionResult<(), DomainError> {
                match meta_tree.get(DIMS_KEY)? {
                    Some(raw) => {
                        let dims = Self::deserialize::<u64>(&raw)
                            .map_err(ConflictableTransactionError::Abort)?;
                        ensure_dims(dims as usize, vectors)
                            .map_err(ConflictableTransactionError::Abort)?;
                    }
                    None => {
                        if let Some(encoded) = &dims_record {
                            meta_tree.insert(DIMS_KEY, encoded.clone())?;
                        }
                    }
                }

                for (key, id, record) in &staged {
                    if id_tree.get(id.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            DomainError::validation(format!("document `{id}` is already indexed")),
                        ));
                    }
                    doc_tree.insert(key.clone(), record.clone())?;
                    id_tree.insert(id.as_bytes(), key.clone())?;
                }
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => {
                    DomainError::storage(format!("failed to persist documents: {err}"))
                }
            })?;

        self.db
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush index: {err}")))?;

        debug!(target: "reflect_rag::sled", added = ids.len(), "documents persisted");
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, DomainError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let entries = self.load_all()?;
        rank(&entries, vector, k)
    }

    fn len(&self) -> Result<usize, DomainError> {
        Ok(self.documents.len())
    }
}
