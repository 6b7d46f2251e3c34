//! Query backend
//!
//! `POST {base}/api/query` with `{"query", "audio"}` returns
//! `{"answer", "audio_file"}`; the spoken answer is then served from
//! `{base}/api/audio/{audio_file}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ChatError, ChatResult, NO_ANSWER};
use crate::sound::RecordedAudio;

/// Request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub audio: Option<RecordedAudio>,
}

impl QueryRequest {
    pub fn text(query: &str) -> Self {
        Self {
            query: query.to_string(),
            audio: None,
        }
    }

    /// Recorded speech with an empty text query
    pub fn audio(recording: RecordedAudio) -> Self {
        Self {
            query: String::new(),
            audio: Some(recording),
        }
    }
}

/// Response body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub audio_file: Option<String>,
}

impl QueryResponse {
    /// Answer text, falling back when missing or empty
    pub fn answer_text(&self) -> &str {
        match self.answer.as_deref() {
            Some(answer) if !answer.is_empty() => answer,
            _ => NO_ANSWER,
        }
    }

    /// Audio file reference, ignoring empty strings
    pub fn audio_file(&self) -> Option<&str> {
        self.audio_file.as_deref().filter(|f| !f.is_empty())
    }
}

/// Remote question answering service
pub trait QueryBackend: Send + Sync {
    /// Blocking call; run it off the frame loop
    fn query(&self, request: &QueryRequest) -> ChatResult<QueryResponse>;

    /// URL of a generated audio file
    fn audio_url(&self, audio_file: &str) -> String;
}

/// Join a base URL and a path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// HTTP/JSON backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> ChatResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::NetworkFailure(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query_url(&self) -> String {
        join_url(&self.base_url, "api/query")
    }
}

impl QueryBackend for HttpBackend {
    fn query(&self, request: &QueryRequest) -> ChatResult<QueryResponse> {
        let url = self.query_url();
        debug!(url = %url, has_audio = request.audio.is_some(), "sending query");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| ChatError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::NetworkFailure(format!("HTTP {status}")));
        }

        response
            .json::<QueryResponse>()
            .map_err(|e| ChatError::NetworkFailure(format!("invalid response body: {e}")))
    }

    fn audio_url(&self, audio_file: &str) -> String {
        join_url(&self.base_url, &format!("api/audio/{audio_file}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/b2/", "/api/query"), "http://h/b2/api/query");
        assert_eq!(join_url("http://h", "api/query"), "http://h/api/query");
    }

    #[test]
    fn test_http_backend_urls() {
        let backend = HttpBackend::new("https://example.test/backend2/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(backend.base_url(), "https://example.test/backend2");
        assert_eq!(backend.query_url(), "https://example.test/backend2/api/query");
        assert_eq!(
            backend.audio_url("reply_42.mp3"),
            "https://example.test/backend2/api/audio/reply_42.mp3"
        );
    }

    #[test]
    fn test_request_body() {
        let json = serde_json::to_string(&QueryRequest::text("halo")).unwrap();
        assert_eq!(json, r#"{"query":"halo","audio":null}"#);

        let request = QueryRequest::audio(RecordedAudio::new(16_000, 1, vec![3]));
        assert_eq!(request.query, "");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["audio"]["sample_rate"], 16_000);
    }

    #[test]
    fn test_response_fallbacks() {
        let full: QueryResponse =
            serde_json::from_str(r#"{"answer": "Hai", "audio_file": "a.mp3"}"#).unwrap();
        assert_eq!(full.answer_text(), "Hai");
        assert_eq!(full.audio_file(), Some("a.mp3"));

        let bare: QueryResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.answer_text(), "No answer available.");
        assert_eq!(bare.audio_file(), None);

        let empty: QueryResponse =
            serde_json::from_str(r#"{"answer": "", "audio_file": ""}"#).unwrap();
        assert_eq!(empty.answer_text(), "No answer available.");
        assert_eq!(empty.audio_file(), None);
    }
}
