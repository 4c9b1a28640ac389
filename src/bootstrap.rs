//! Startup assembly of the answer pipeline.
//!
//! Every step here either succeeds or stops the process before the
//! listener is bound: a server that cannot answer should not accept
//! connections.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::chain::{RagChain, Retriever};
use crate::config::{Config, Credentials, EmbeddingConfig};
use crate::embedder::Embedder;
use crate::embedder::download;
use crate::embedder::onnx::OnnxEmbedder;
use crate::llm::LanguageModel;
use crate::llm::openai::OpenAiCompletions;
use crate::prompt::ChatPromptTemplate;
use crate::vectorstore::pinecone::PineconeIndex;

/// Build the production pipeline: local ONNX embedder, Pinecone, OpenAI.
pub async fn assemble(config: &Config, creds: &Credentials) -> Result<RagChain> {
    let embedder = load_embedder(&config.embedding).await?;
    assemble_with_embedder(config, creds, embedder).await
}

/// Build the pipeline around an already-loaded embedder.
pub async fn assemble_with_embedder(
    config: &Config,
    creds: &Credentials,
    embedder: Arc<dyn Embedder>,
) -> Result<RagChain> {
    let index = PineconeIndex::connect(&config.pinecone, &config.index_name, &creds.pinecone_api_key)
        .await
        .with_context(|| format!("failed to connect to index {}", config.index_name))?;

    let retriever = Retriever::new(embedder, Arc::new(index))
        .context("embedding model does not match the index")?;

    let llm = OpenAiCompletions::new(&config.llm, &creds.openai_api_key)
        .context("failed to build language model client")?;
    llm.verify()
        .await
        .with_context(|| format!("language model {} is not usable", config.llm.model))?;
    info!(
        "Pipeline ready: index={}, k={}, model={}",
        config.index_name,
        retriever.k(),
        llm.model_name()
    );

    Ok(RagChain::new(
        retriever,
        ChatPromptTemplate::question_answering(),
        Arc::new(llm),
    ))
}

/// Download (if needed) and load the sentence embedding model.
async fn load_embedder(settings: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let name = settings.model_name.clone();
    let dir = PathBuf::from(&settings.model_dir);
    let dimensions = settings.dimensions;

    let embedder = tokio::task::spawn_blocking(move || -> Result<OnnxEmbedder> {
        download::ensure_model_files(&name, &dir)?;
        Ok(OnnxEmbedder::new(&dir, dimensions)?)
    })
    .await
    .context("embedding model loader panicked")?
    .context("failed to load embedding model")?;

    Ok(Arc::new(embedder))
}
