//! Vector index access.
//!
//! [`VectorStore`] is the seam between the retriever and whatever service
//! holds the embeddings. [`pinecone::PineconeIndex`] is the production
//! backend; [`memory::InMemoryVectorStore`] is a brute-force store used in
//! tests.
pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use thiserror::Error;

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Option<String>,
    pub page_content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Similarity as reported by the store; higher is closer.
    pub score: Option<f32>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            id: None,
            page_content: page_content.into(),
            metadata: serde_json::Map::new(),
            score: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("index is not ready: {0}")]
    IndexNotReady(String),

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("dimension mismatch: index has {index}, query has {query}")]
    DimensionMismatch { index: usize, query: usize },

    #[error("vector store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vector store returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Nearest-neighbour search over stored passages.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `k` passages closest to `vector`, closest first.
    async fn similarity_search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, VectorStoreError>;

    /// Dimensionality of the stored vectors.
    fn dimension(&self) -> usize;
}
