//! Semantic Index
//!
//! Maps a free-text question to the most relevant pieces of dataset/column
//! documentation by embedding similarity. One document is built per dataset
//! and one per column (with its note line and up to five distinct example
//! values). The whole index is cached on disk keyed by a content signature
//! over the catalog; a changed file or edited note invalidates everything and
//! triggers a full rebuild, while a matching signature means zero
//! re-embedding work.

pub mod embedder;
pub mod vector_store;

use crate::catalog::{Catalog, DatasetDescriptor};
use crate::error::{AssistantError, Result};
use crate::table_store::{Table, TableStore};
use embedder::Embedder;
use itertools::Itertools;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use vector_store::{DocKind, Document, SearchResult, VectorStore};

pub const DEFAULT_TOP_K: usize = 8;
const SNAPSHOT_FILE: &str = "index.json";
const EXAMPLE_VALUE_LIMIT: usize = 5;

pub struct SemanticIndex {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    signature: String,
}

impl SemanticIndex {
    /// Open (or build) the index for a catalog. The persisted snapshot is
    /// reused only when its stored signature matches the freshly computed
    /// one; any mismatch rebuilds the whole index before the first
    /// retrieval. This must complete before any question is served.
    pub async fn open(
        catalog: &Catalog,
        tables: &TableStore,
        embedder: Arc<dyn Embedder>,
        index_dir: &Path,
    ) -> Result<Self> {
        let signature = compute_signature(catalog)?;
        let snapshot_path = index_dir.join(SNAPSHOT_FILE);

        if snapshot_path.exists() {
            match VectorStore::load(&snapshot_path) {
                Ok((stored_signature, store))
                    if stored_signature == signature && !store.is_empty() =>
                {
                    info!(
                        "Semantic index up to date ({} documents), reusing cached embeddings",
                        store.len()
                    );
                    return Ok(Self {
                        store,
                        embedder,
                        signature,
                    });
                }
                Ok(_) => {
                    info!("Dataset config or files changed, rebuilding semantic index");
                }
                Err(e) => {
                    warn!("Unreadable semantic index snapshot, rebuilding: {}", e);
                }
            }
        }

        let store = build_store(catalog, tables, embedder.as_ref()).await?;
        store.save(&snapshot_path, &signature)?;
        info!("Indexed {} documents (datasets + columns)", store.len());

        Ok(Self {
            store,
            embedder,
            signature,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Top-k documents for a question, each annotated with its kind, source
    /// dataset, and column. An empty index yields an empty result, never an
    /// error.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed(question).await?;
        Ok(self.store.search(&query_embedding, top_k))
    }
}

async fn build_store(
    catalog: &Catalog,
    tables: &TableStore,
    embedder: &dyn Embedder,
) -> Result<VectorStore> {
    let mut store = VectorStore::new();

    for descriptor in catalog.iter() {
        let table = tables.get(&descriptor.name).ok_or_else(|| {
            AssistantError::Index(format!(
                "No table loaded for dataset '{}'",
                descriptor.name
            ))
        })?;

        let text = dataset_document_text(descriptor, &table.columns);
        let embedding = embedder.embed(&text).await?;
        store.add_document(Document {
            id: format!("dataset::{}", descriptor.name),
            text,
            kind: DocKind::Dataset,
            dataset: descriptor.name.clone(),
            column: None,
            embedding,
        });

        for column in &table.columns {
            let note = descriptor.note_for_column(column).unwrap_or("");
            let examples = sample_values(table, column);
            let text = column_document_text(&descriptor.name, column, note, &examples);
            let embedding = embedder.embed(&text).await?;
            store.add_document(Document {
                id: format!("column::{}::{}", descriptor.name, column),
                text,
                kind: DocKind::Column,
                dataset: descriptor.name.clone(),
                column: Some(column.clone()),
                embedding,
            });
        }
    }

    Ok(store)
}

fn dataset_document_text(descriptor: &DatasetDescriptor, columns: &[String]) -> String {
    format!(
        "DATASET: {}\nDESCRIPTION: {}\nCOLUMNS: {}",
        descriptor.name,
        descriptor.description,
        columns.join(", ")
    )
}

fn column_document_text(dataset: &str, column: &str, note: &str, examples: &[String]) -> String {
    format!(
        "DATASET: {}\nCOLUMN: {}\nNOTE: {}\nEXAMPLE_VALUES: {}",
        dataset,
        column,
        note,
        examples.join(", ")
    )
}

/// Up to five distinct non-null example values, in row order.
fn sample_values(table: &Table, column: &str) -> Vec<String> {
    table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|cell| !cell.is_null())
        .map(|cell| cell.display())
        .unique()
        .take(EXAMPLE_VALUE_LIMIT)
        .collect()
}

/// Content signature over the sorted catalog: dataset name, path, file
/// modification time, description, and column notes. Any change to one of
/// these invalidates the whole persisted index.
pub fn compute_signature(catalog: &Catalog) -> Result<String> {
    let mut descriptors: Vec<&DatasetDescriptor> = catalog.iter().collect();
    descriptors.sort_by(|a, b| a.name.cmp(&b.name));

    let mut payload = Vec::new();
    for descriptor in descriptors {
        let mtime_ms = std::fs::metadata(&descriptor.path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        payload.push(serde_json::json!({
            "dataset_name": descriptor.name,
            "path": descriptor.path.to_string_lossy(),
            "mtime_ms": mtime_ms,
            "description": descriptor.description,
            "column_notes": descriptor.column_notes,
        }));
    }

    let bytes = serde_json::to_vec(&payload)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DatasetDescriptor;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: hashes the text into a small vector and
    /// counts how many embeddings were computed.
    struct StubEmbedder {
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut vector = vec![0.0f32; 8];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % 8] += byte as f32;
            }
            Ok(vector)
        }
    }

    fn fixture(dir_name: &str) -> (Catalog, TableStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(dir_name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("access.csv");
        fs::write(
            &csv_path,
            "country,date_YY,safely_managed_pct\n\
             Kenya,2020,80\nKenya,2021,90\nUganda,2020,70\n",
        )
        .unwrap();
        let catalog = Catalog::new(vec![DatasetDescriptor::new(
            "water_access",
            csv_path,
            "Water access levels",
            "- country: Country name\n- safely_managed_pct: Share safely managed\n",
        )]);
        let tables = TableStore::load(&catalog).unwrap();
        (catalog, tables, dir)
    }

    #[tokio::test]
    async fn builds_one_document_per_dataset_and_column() {
        let (catalog, tables, dir) = fixture("wash_assistant_index_build");
        let embedder = StubEmbedder::new();
        let index = SemanticIndex::open(&catalog, &tables, embedder.clone(), &dir.join("idx"))
            .await
            .unwrap();

        // 1 dataset doc + 3 column docs
        assert_eq!(index.len(), 4);
        assert_eq!(embedder.call_count(), 4);

        let retrieved = index.retrieve("safely managed water", 10).await.unwrap();
        assert_eq!(retrieved.len(), 4);
        let ids: Vec<&str> = retrieved
            .iter()
            .map(|r| r.document.id.as_str())
            .collect();
        assert!(ids.contains(&"dataset::water_access"));
        assert!(ids.contains(&"column::water_access::safely_managed_pct"));
    }

    #[tokio::test]
    async fn column_documents_carry_notes_and_examples() {
        let (catalog, tables, dir) = fixture("wash_assistant_index_docs");
        let embedder = StubEmbedder::new();
        let index = SemanticIndex::open(&catalog, &tables, embedder, &dir.join("idx"))
            .await
            .unwrap();

        let retrieved = index.retrieve("country", 10).await.unwrap();
        let country_doc = retrieved
            .iter()
            .find(|r| r.document.id == "column::water_access::country")
            .unwrap();
        assert!(country_doc.document.text.contains("NOTE: - country: Country name"));
        // distinct example values only
        assert!(country_doc
            .document
            .text
            .contains("EXAMPLE_VALUES: Kenya, Uganda"));
        assert_eq!(country_doc.document.kind, DocKind::Column);
        assert_eq!(country_doc.document.dataset, "water_access");
    }

    #[tokio::test]
    async fn second_open_reuses_cache_without_embedding() {
        let (catalog, tables, dir) = fixture("wash_assistant_index_idempotent");
        let index_dir = dir.join("idx");

        let first = StubEmbedder::new();
        let built = SemanticIndex::open(&catalog, &tables, first.clone(), &index_dir)
            .await
            .unwrap();
        assert_eq!(first.call_count(), 4);

        let second = StubEmbedder::new();
        let reopened = SemanticIndex::open(&catalog, &tables, second.clone(), &index_dir)
            .await
            .unwrap();
        assert_eq!(second.call_count(), 0, "cache hit must not re-embed");
        assert_eq!(reopened.signature(), built.signature());
        assert_eq!(reopened.len(), built.len());
    }

    #[tokio::test]
    async fn changed_file_invalidates_signature_and_rebuilds() {
        let (catalog, tables, dir) = fixture("wash_assistant_index_invalidate");
        let index_dir = dir.join("idx");

        let first = StubEmbedder::new();
        let built = SemanticIndex::open(&catalog, &tables, first, &index_dir)
            .await
            .unwrap();

        // touch the backing file so its mtime moves
        std::thread::sleep(std::time::Duration::from_millis(50));
        let csv_path = catalog.iter().next().unwrap().path.clone();
        fs::write(
            &csv_path,
            "country,date_YY,safely_managed_pct\nKenya,2022,95\n",
        )
        .unwrap();
        let tables = TableStore::load(&catalog).unwrap();

        let second = StubEmbedder::new();
        let rebuilt = SemanticIndex::open(&catalog, &tables, second.clone(), &index_dir)
            .await
            .unwrap();
        assert_ne!(rebuilt.signature(), built.signature());
        assert!(second.call_count() > 0, "stale index must be re-embedded");
        // 1 dataset doc + 3 column docs for the rewritten table
        assert_eq!(rebuilt.len(), 4);
    }

    #[tokio::test]
    async fn edited_description_changes_signature() {
        let (catalog, tables, dir) = fixture("wash_assistant_index_description");
        let original = compute_signature(&catalog).unwrap();

        let descriptor = catalog.iter().next().unwrap();
        let edited = Catalog::new(vec![DatasetDescriptor::new(
            descriptor.name.clone(),
            descriptor.path.clone(),
            "A different description",
            descriptor.column_notes.clone(),
        )]);
        assert_ne!(compute_signature(&edited).unwrap(), original);

        drop(tables);
        let _ = fs::remove_dir_all(&dir);
    }
}
