//! Client for OpenAI-compatible APIs (OpenAI itself, LM Studio, a local
//! llama.cpp server, ...). One client serves both collaborator roles:
//! embeddings and streaming chat.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{ChatModel, Embedder, TokenStream};
use crate::core::config::LlmConfig;
use crate::core::errors::AppError;

#[derive(Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            client: Client::new(),
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

/// One parsed line of a chat completion SSE stream.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Token(String),
    Done,
    Skip,
}

fn parse_stream_line(line: &str) -> StreamEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamEvent::Skip;
    };
    if data == "[DONE]" {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(payload) => match payload["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => StreamEvent::Token(content.to_string()),
            _ => StreamEvent::Skip,
        },
        Err(_) => StreamEvent::Skip,
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_all(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("empty embedding response".to_string()))
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Embedding(err.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "embeddings request failed: {text}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| AppError::Embedding(err.to_string()))?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(values) = item["embedding"].as_array() {
                    embeddings.push(
                        values
                            .iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect(),
                    );
                }
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn stream_chat(&self, prompt: &str) -> Result<TokenStream, AppError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Generation(err.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!("chat request failed: {text}")));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        for line in String::from_utf8_lossy(&bytes).lines() {
                            match parse_stream_line(line) {
                                StreamEvent::Token(token) => {
                                    if tx.send(Ok(token)).await.is_err() {
                                        return;
                                    }
                                }
                                StreamEvent::Done => return,
                                StreamEvent::Skip => {}
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(AppError::Generation(err.to_string()))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
