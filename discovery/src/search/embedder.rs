//! Embeddings over HTTP.
//!
//! Talks to any endpoint implementing the OpenAI `POST /v1/embeddings` shape
//! (OpenAI, vLLM, Ollama, text-embeddings-inference).

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::semantic::Embedder;
use crate::{core::config::EmbeddingConfig, error::EmbeddingError};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    /// Vector length observed during `initialize`.
    dimension: OnceLock<usize>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            dimension: OnceLock::new(),
        })
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Request(format!("HTTP {}: {}", status, body)));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        order_embeddings(body.data, input.len())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), EmbeddingError> {
        match self.dimension.get() {
            Some(&expected) if expected != embedding.len() => Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Place embeddings by their reported `index`, falling back to response order.
fn order_embeddings(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.into_iter().enumerate() {
        let slot = item.index.unwrap_or(position);
        match slots.get_mut(slot) {
            Some(target @ None) => *target = Some(item.embedding),
            _ => {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "bad or duplicate embedding index {}",
                    slot
                )))
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        if self.dimension.get().is_some() {
            return Ok(());
        }
        let sample = self.request(&["initialize".to_string()]).await?;
        let dimension = sample.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "endpoint returned an empty embedding".to_string(),
            ));
        }
        let _ = self.dimension.set(dimension);
        info!(model = %self.model, dimension, "Embedding endpoint ready");
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension.get().is_none() {
            return Err(EmbeddingError::ModelNotInitialized);
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.request(texts).await?;
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(index: Option<usize>, value: f32) -> EmbeddingData {
        EmbeddingData {
            embedding: vec![value],
            index,
        }
    }

    #[test]
    fn test_order_embeddings_by_index() {
        let ordered =
            order_embeddings(vec![data(Some(1), 1.0), data(Some(0), 0.0)], 2).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0]]);

        let positional = order_embeddings(vec![data(None, 3.0), data(None, 4.0)], 2).unwrap();
        assert_eq!(positional, vec![vec![3.0], vec![4.0]]);
    }

    #[test]
    fn test_order_embeddings_rejects_bad_responses() {
        assert!(order_embeddings(vec![data(None, 1.0)], 2).is_err());
        assert!(order_embeddings(vec![data(Some(0), 1.0), data(Some(0), 2.0)], 2).is_err());
        assert!(order_embeddings(vec![data(Some(5), 1.0)], 1).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding.len(), 2);
    }

    #[tokio::test]
    async fn test_embed_before_initialize_fails() {
        let embedder = HttpEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.dimension().is_none());
        assert!(matches!(
            embedder.embed("hello").await,
            Err(EmbeddingError::ModelNotInitialized)
        ));
    }
}
