//! Retrieval-augmented answer pipeline.
//!
//! `query → embed → top-k passages → stuffed prompt → completion`. The
//! whole pipeline is one [`RagChain`] value, built once at startup and
//! shared read-only by every request.
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::embedder::{Embedder, EmbedderError};
use crate::llm::{LanguageModel, LlmError};
use crate::prompt::{self, ChatPromptTemplate, PromptError};
use crate::vectorstore::{Document, VectorStore, VectorStoreError};

/// Passages retrieved per query.
pub const RETRIEVER_TOP_K: usize = 3;

/// Placed between stuffed passages.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error("prompt formatting failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("embedding task aborted: {0}")]
    Task(String),
}

// ── Retriever ────────────────────────────────────────────────────────

/// Similarity retriever over a vector store.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    /// Pair an embedder with a store; both must agree on dimensionality.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, VectorStoreError> {
        if embedder.dimensions() != store.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                index: store.dimension(),
                query: embedder.dimensions(),
            });
        }

        Ok(Self {
            embedder,
            store,
            k: RETRIEVER_TOP_K,
        })
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Embed `query` and fetch its nearest passages.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, ChainError> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| ChainError::Task(e.to_string()))??;

        let docs = self.store.similarity_search(&vector, self.k).await?;
        debug!("Retrieved {} passages (k={})", docs.len(), self.k);
        Ok(docs)
    }
}

// ── Chain ────────────────────────────────────────────────────────────

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub input: String,
    pub context: Vec<Document>,
    pub answer: String,
}

pub struct RagChain {
    retriever: Retriever,
    prompt: ChatPromptTemplate,
    llm: Arc<dyn LanguageModel>,
}

impl RagChain {
    pub fn new(retriever: Retriever, prompt: ChatPromptTemplate, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            prompt,
            llm,
        }
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `input` from the retrieved passages.
    pub async fn invoke(&self, input: &str) -> Result<ChainOutput, ChainError> {
        let context = self.retriever.retrieve(input).await?;
        let rendered = self.render(input, &context)?;
        let answer = self.llm.complete(&rendered).await?;

        Ok(ChainOutput {
            input: input.to_string(),
            context,
            answer,
        })
    }

    /// Fill the prompt with `input` and the stuffed passages, flattened to text.
    pub fn render(&self, input: &str, context: &[Document]) -> Result<String, PromptError> {
        let stuffed = stuff_documents(context);
        let vars = HashMap::from([("context", stuffed.as_str()), ("input", input)]);
        let messages = self.prompt.format_messages(&vars)?;
        Ok(prompt::to_buffer_string(&messages))
    }
}

/// Concatenate passage texts in retrieval order.
#[must_use]
pub fn stuff_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::llm::mock::StaticModel;
    use crate::vectorstore::memory::InMemoryVectorStore;

    const DIM: usize = 8;

    fn store_with_passages() -> Arc<InMemoryVectorStore> {
        let embedder = MockEmbedder::new(DIM);
        let mut store = InMemoryVectorStore::new(DIM);
        for text in [
            "Anemia is a lack of healthy red blood cells.",
            "Asthma narrows the airways.",
            "Acne occurs when hair follicles clog.",
            "Migraine causes throbbing headaches.",
            "Gout is a form of arthritis.",
        ] {
            let vector = embedder.embed(text).unwrap();
            store.insert(Document::new(text), vector).unwrap();
        }
        Arc::new(store)
    }

    fn chain(store: Arc<InMemoryVectorStore>, llm: Arc<StaticModel>) -> RagChain {
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(DIM)), store).unwrap();
        RagChain::new(retriever, ChatPromptTemplate::question_answering(), llm)
    }

    #[tokio::test]
    async fn test_retriever_always_requests_three() {
        let store = store_with_passages();
        let retriever = Retriever::new(Arc::new(MockEmbedder::new(DIM)), store.clone()).unwrap();
        assert_eq!(retriever.k(), 3);

        for query in ["", "anemia", "what helps with a very long and detailed question?"] {
            let docs = retriever.retrieve(query).await.unwrap();
            assert_eq!(docs.len(), 3);
        }
        assert_eq!(store.requested_k(), vec![3, 3, 3]);
    }

    #[test]
    fn test_retriever_rejects_dimension_mismatch() {
        let store = Arc::new(InMemoryVectorStore::new(384));
        let result = Retriever::new(Arc::new(MockEmbedder::new(DIM)), store);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch { index: 384, query: DIM })
        ));
    }

    #[tokio::test]
    async fn test_invoke_returns_model_answer() {
        let llm = Arc::new(StaticModel::new("X"));
        let chain = chain(store_with_passages(), llm.clone());

        let output = chain.invoke("hello").await.unwrap();
        assert_eq!(output.answer, "X");
        assert_eq!(output.input, "hello");
        assert_eq!(output.context.len(), 3);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("System: You are a medical assistant"));
        assert!(prompts[0].ends_with("\nHuman: hello"));
        for doc in &output.context {
            assert!(prompts[0].contains(&doc.page_content));
        }
    }

    #[tokio::test]
    async fn test_invoke_is_repeatable() {
        let chain = chain(store_with_passages(), Arc::new(StaticModel::new("same")));
        let first = chain.invoke("gout").await.unwrap();
        let second = chain.invoke("gout").await.unwrap();
        assert_eq!(first.answer, second.answer);
        assert_eq!(first.context, second.context);
    }

    #[tokio::test]
    async fn test_invoke_surfaces_model_failure() {
        let chain = chain(store_with_passages(), Arc::new(StaticModel::failing("down")));
        let err = chain.invoke("asthma").await.unwrap_err();
        assert!(matches!(err, ChainError::Generation(LlmError::Api { status: 503, .. })));
    }

    #[test]
    fn test_render_does_not_expand_braces_in_passages() {
        let chain = chain(store_with_passages(), Arc::new(StaticModel::new("x")));
        let docs = vec![Document::new("dose {input} mg"), Document::new("second")];
        let rendered = chain.render("q", &docs).unwrap();
        assert!(rendered.contains("dose {input} mg\n\nsecond"));
        assert!(rendered.ends_with("Human: q"));
    }

    #[test]
    fn test_stuff_documents() {
        let docs = vec![Document::new("a"), Document::new("b"), Document::new("c")];
        assert_eq!(stuff_documents(&docs), "a\n\nb\n\nc");
        assert_eq!(stuff_documents(&[]), "");
    }
}
