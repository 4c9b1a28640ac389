//! # medicalbot — retrieval-augmented chat endpoint
//!
//! Answers questions over HTTP by embedding the question, pulling the
//! nearest passages from a pre-built Pinecone index and asking an OpenAI
//! completion model to answer from them.
//!
//! ## Architecture
//!
//! - **[`config`]** — Credentials from the environment, settings from JSON
//! - **[`embedder`]** — Query embedding via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`vectorstore`]** — Similarity search (Pinecone, in-memory)
//! - **[`llm`]** — Completion model client (OpenAI)
//! - **[`prompt`]** — System instruction and chat-prompt templating
//! - **[`chain`]** — Retriever and the composed answer pipeline
//! - **[`bootstrap`]** — Startup assembly of the pipeline
//! - **[`server`]** — axum routes: chat page and chat endpoint

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod embedder;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod vectorstore;
