use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::GenConfig;
use crate::types::{Result, TaggerError};

/// A single in-flight generation: yields text fragments in delivery order
/// and terminates either cleanly or with one trailing error.
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Option<Result<String>>;
}

/// Seam for the generative-language service, so the augmenter can run
/// against a mock in tests.
#[async_trait]
pub trait KeywordModel: Send + Sync {
    async fn stream_keywords(&self, prompt: &str) -> Result<Box<dyn ChunkStream>>;
}

#[async_trait]
impl<M: KeywordModel + ?Sized> KeywordModel for std::sync::Arc<M> {
    async fn stream_keywords(&self, prompt: &str) -> Result<Box<dyn ChunkStream>> {
        (**self).stream_keywords(prompt).await
    }
}

/// Drain a stream into one string. A mid-stream error is logged and the
/// text collected so far is kept, possibly empty.
pub async fn collect_chunks(mut stream: Box<dyn ChunkStream>) -> String {
    let mut text = String::new();
    while let Some(chunk) = stream.next_chunk().await {
        match chunk {
            Ok(fragment) => text.push_str(&fragment),
            Err(e) => {
                error!("Gemini API error: {}", e);
                break;
            }
        }
    }
    text
}

pub struct GeminiClient {
    http: Client,
    config: GenConfig,
}

impl GeminiClient {
    pub fn new(config: GenConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl KeywordModel for GeminiClient {
    async fn stream_keywords(&self, prompt: &str) -> Result<Box<dyn ChunkStream>> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or(TaggerError::MissingApiKey)?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let builder = self
            .http
            .post(self.endpoint())
            .query(&[("alt", "sse"), ("key", api_key.as_str())])
            .json(&body);

        let source = EventSource::new(builder)
            .map_err(|e| TaggerError::Stream(e.to_string()))?;
        Ok(Box::new(GeminiStream { source }))
    }
}

struct GeminiStream {
    source: EventSource,
}

#[async_trait]
impl ChunkStream for GeminiStream {
    async fn next_chunk(&mut self) -> Option<Result<String>> {
        loop {
            match self.source.next().await? {
                Ok(Event::Open) => continue,
                Ok(Event::Message(msg)) => match extract_text(&msg.data) {
                    Ok(Some(text)) => return Some(Ok(text)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.source.close();
                        return Some(Err(e));
                    }
                },
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    self.source.close();
                    return None;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    self.source.close();
                    let message = api_error_message(response).await;
                    return Some(Err(TaggerError::Api {
                        status: status.as_u16(),
                        message,
                    }));
                }
                Err(e) => {
                    self.source.close();
                    return Some(Err(TaggerError::Stream(e.to_string())));
                }
            }
        }
    }
}

async fn api_error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body,
    }
}

/// Pull the text parts out of one SSE `data:` payload. Payloads without
/// text (e.g. usage metadata) yield `None`.
fn extract_text(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    let text: String = chunk
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Scripted model for tests: every call pops one script of chunk results.
/// A call with no script left streams nothing.
#[derive(Default)]
pub struct MockModel {
    scripts: Mutex<VecDeque<MockScript>>,
    prompts: Mutex<Vec<String>>,
}

pub enum MockScript {
    Chunks(Vec<Result<String>>),
    RequestError(TaggerError),
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream of chunk outcomes for the next call.
    pub fn push_chunks(&self, chunks: Vec<Result<String>>) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(MockScript::Chunks(chunks));
    }

    /// Queue a failure of the request itself, before any chunk arrives.
    pub fn push_request_error(&self, err: TaggerError) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(MockScript::RequestError(err));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

struct MockStream {
    chunks: VecDeque<Result<String>>,
}

#[async_trait]
impl ChunkStream for MockStream {
    async fn next_chunk(&mut self) -> Option<Result<String>> {
        self.chunks.pop_front()
    }
}

#[async_trait]
impl KeywordModel for MockModel {
    async fn stream_keywords(&self, prompt: &str) -> Result<Box<dyn ChunkStream>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockScript::Chunks(Vec::new()));
        match script {
            MockScript::Chunks(chunks) => Ok(Box::new(MockStream {
                chunks: chunks.into(),
            })),
            MockScript::RequestError(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model_and_trims_slash() {
        let client = GeminiClient::new(GenConfig {
            api_key: Some("test".into()),
            model: "gemini-2.5-flash".into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/".into(),
        });
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent"
        );
    }

    #[test]
    fn request_body_serializes_single_user_turn() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hello" }],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn extract_text_reads_candidate_parts() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"foo"},{"text":"bar"}]}}]}"#;
        assert_eq!(extract_text(data).unwrap(), Some("foobar".to_string()));
    }

    #[test]
    fn extract_text_skips_payloads_without_text() {
        let data = r#"{"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(extract_text(data).unwrap(), None);
    }

    #[test]
    fn extract_text_rejects_invalid_json() {
        assert!(extract_text("not json").is_err());
    }

    #[tokio::test]
    async fn missing_api_key_fails_at_call_time() {
        let client = GeminiClient::new(GenConfig::default());
        let err = client.stream_keywords("prompt").await.err().unwrap();
        assert!(matches!(err, TaggerError::MissingApiKey));
    }

    #[tokio::test]
    async fn mock_model_replays_scripts_and_records_prompts() {
        let mock = MockModel::new();
        mock.push_chunks(vec![Ok("a,".into()), Ok("b".into())]);

        let stream = mock.stream_keywords("p1").await.unwrap();
        assert_eq!(collect_chunks(stream).await, "a,b");
        assert_eq!(mock.prompts(), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn collect_chunks_keeps_prefix_on_mid_stream_error() {
        let mock = MockModel::new();
        mock.push_chunks(vec![
            Ok("sports,".into()),
            Err(TaggerError::Stream("connection reset".into())),
            Ok("never seen".into()),
        ]);

        let stream = mock.stream_keywords("p").await.unwrap();
        assert_eq!(collect_chunks(stream).await, "sports,");
    }

    #[tokio::test]
    async fn collect_chunks_is_empty_when_stream_fails_immediately() {
        let mock = MockModel::new();
        mock.push_chunks(vec![Err(TaggerError::Api {
            status: 500,
            message: "boom".into(),
        })]);

        let stream = mock.stream_keywords("p").await.unwrap();
        assert_eq!(collect_chunks(stream).await, "");
    }
}
