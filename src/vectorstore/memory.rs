/// Brute-force in-process vector store.
///
/// Scores every stored vector by cosine similarity. Also records the `k`
/// of every search it serves, which lets tests observe how the retriever
/// calls its store.
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Document, VectorStore, VectorStoreError};

pub struct InMemoryVectorStore {
    dimension: usize,
    entries: Vec<(Document, Vec<f32>)>,
    requests: Mutex<Vec<usize>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Store a passage under `vector`.
    pub fn insert(&mut self, doc: Document, vector: Vec<f32>) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                index: self.dimension,
                query: vector.len(),
            });
        }
        self.entries.push((doc, vector));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` of every search served so far, in call order.
    #[must_use]
    pub fn requested_k(&self) -> Vec<usize> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, VectorStoreError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(k);
        }

        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                index: self.dimension,
                query: vector.len(),
            });
        }

        let mut scored: Vec<(f32, &Document)> = self
            .entries
            .iter()
            .map(|(doc, v)| (cosine_similarity(vector, v), doc))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, doc)| Document {
                score: Some(score),
                ..doc.clone()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}
