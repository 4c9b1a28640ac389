/// Pinecone serverless index client.
///
/// Binds to an index that already exists: the control plane is asked for
/// the index's data-plane host and dimension once, after which every query
/// goes straight to that host.
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Document, VectorStore, VectorStoreError};
use crate::config::PineconeConfig;

#[derive(Deserialize)]
struct IndexDescription {
    dimension: usize,
    host: String,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

pub struct PineconeIndex {
    client: reqwest::Client,
    name: String,
    host: String,
    dimension: usize,
    namespace: String,
    text_key: String,
}

impl PineconeIndex {
    /// Look up `index_name` on the control plane and bind to its data plane.
    pub async fn connect(
        settings: &PineconeConfig,
        index_name: &str,
        api_key: &str,
    ) -> Result<Self, VectorStoreError> {
        let mut headers = HeaderMap::new();
        let mut key =
            HeaderValue::from_str(api_key).map_err(|_| VectorStoreError::InvalidHeader("Api-Key"))?;
        key.set_sensitive(true);
        headers.insert("api-key", key);
        headers.insert(
            "x-pinecone-api-version",
            HeaderValue::from_str(&settings.api_version)
                .map_err(|_| VectorStoreError::InvalidHeader("X-Pinecone-API-Version"))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let url = format!(
            "{}/indexes/{index_name}",
            settings.controller_url.trim_end_matches('/')
        );
        debug!("Describing Pinecone index: {url}");
        let resp = client.get(&url).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::IndexNotFound(index_name.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VectorStoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let desc: IndexDescription = resp.json().await?;
        if let Some(st) = &desc.status {
            if !st.ready {
                return Err(VectorStoreError::IndexNotReady(format!(
                    "{index_name} ({})",
                    st.state
                )));
            }
        }

        let host = normalize_host(&desc.host);
        info!(
            "Bound to Pinecone index {index_name} at {host} (dimension {}, metric {})",
            desc.dimension,
            desc.metric.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            client,
            name: index_name.to_string(),
            host,
            dimension: desc.dimension,
            namespace: settings.namespace.clone(),
            text_key: settings.text_key.clone(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn to_document(&self, m: QueryMatch) -> Option<Document> {
        let mut metadata = m.metadata.unwrap_or_default();
        let text = match metadata.remove(&self.text_key) {
            Some(serde_json::Value::String(s)) => s,
            _ => {
                warn!(
                    "Match {} has no string `{}` metadata, skipping",
                    m.id, self.text_key
                );
                return None;
            }
        };

        Some(Document {
            id: Some(m.id),
            page_content: text,
            metadata,
            score: m.score,
        })
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn similarity_search(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                index: self.dimension,
                query: vector.len(),
            });
        }

        let body = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            include_values: false,
            namespace: &self.namespace,
        };

        let resp = self
            .client
            .post(format!("{}/query", self.host))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VectorStoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QueryResponse = resp.json().await?;
        Ok(parsed
            .matches
            .into_iter()
            .filter_map(|m| self.to_document(m))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Data-plane hosts come back without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
