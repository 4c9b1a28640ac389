/// Deterministic embedder for tests.
///
/// Hashes the input text into a fixed-size unit vector, so equal inputs
/// always land on equal vectors without loading a model.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        // Offset by one so no component is zero and the norm never vanishes.
        let embedding: Vec<f32> = (0..self.dimensions)
            .map(|i| (f32::from(bytes[i % 8]) + 1.0) / 256.0)
            .collect();

        Ok(super::onnx::l2_normalize(&embedding))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(16);
        assert_eq!(embedder.embed("fever").unwrap().len(), 16);
        assert_eq!(embedder.dimensions(), 16);
    }

    #[test]
    fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("what is acne?").unwrap();
        let b = embedder.embed("what is acne?").unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("asthma").unwrap();
        let b = embedder.embed("migraine").unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::default();
        let vec = embedder.embed("").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "expected unit length, got {norm}");
    }
}
