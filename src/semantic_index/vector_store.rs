//! Vector Store
//!
//! In-memory store of embedded documentation with cosine similarity search.
//! The whole store (embeddings included) round-trips through one JSON
//! snapshot on disk, stamped with the index signature that produced it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Dataset,
    Column,
}

/// One indexed unit of documentation about a dataset or a column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub kind: DocKind,
    pub dataset: String,
    #[serde(default)]
    pub column: Option<String>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Default)]
pub struct VectorStore {
    documents: Vec<Document>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    signature: String,
    documents: Vec<Document>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Top-k documents by cosine similarity. Empty store yields no results.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .map(|doc| SearchResult {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        results
    }

    /// Persist documents + embeddings alongside the signature they were
    /// built from.
    pub fn save(&self, path: &Path, signature: &str) -> Result<()> {
        let snapshot = Snapshot {
            signature: signature.to_string(),
            documents: self.documents.clone(),
        };
        let encoded = serde_json::to_string(&snapshot)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Load a snapshot, returning the signature it was stamped with.
    pub fn load(path: &Path) -> Result<(String, Self)> {
        let encoded = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&encoded)?;
        Ok((
            snapshot.signature,
            Self {
                documents: snapshot.documents,
            },
        ))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
