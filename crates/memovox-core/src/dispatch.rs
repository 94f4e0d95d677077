//! Transcription dispatch: one outbound request per finalized recording.
//!
//! The proxy contract is a multipart POST with an `audio` file part and an
//! `apiKey` text field, answered with JSON:
//! `{ "success": true, "transcription": "...", "language": "..." }` on
//! success, `{ "error": "...", "details": "..." }` otherwise.

use async_trait::async_trait;
use serde::Deserialize;

use crate::capture::AudioPayload;
use crate::error::{Error, Result};

/// A finalized recording plus request options, ready to upload.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub payload: AudioPayload,
    /// Optional language hint forwarded to the recognizer.
    pub language: Option<String>,
}

/// The transcript produced by one successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    /// Detected language, when the service reports one.
    pub language: Option<String>,
}

/// Seam between the session machine and the transcription service.
///
/// Implementations must not retry: the session machine guarantees each
/// finalized payload is dispatched at most once, and every retry is a
/// fresh user-initiated recording.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(
        &self,
        credential: &str,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResult>;
}

/// Reject a request before any network I/O happens.
pub fn validate(credential: &str, request: &TranscriptionRequest) -> Result<()> {
    if credential.trim().is_empty() {
        return Err(Error::MissingCredential);
    }
    if request.payload.bytes.is_empty() {
        return Err(Error::EmptyAudio);
    }
    Ok(())
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    transcription: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl TranscribeResponse {
    /// The most specific failure message the server offered.
    fn failure_message(&self) -> String {
        self.details
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "transcription service returned no message".into())
    }
}

/// Parse a response body into a result or a service failure.
fn parse_response(status: Option<u16>, body: &str) -> Result<TranscriptionResult> {
    let response: TranscribeResponse = serde_json::from_str(body).map_err(|e| Error::Service {
        status,
        message: format!("malformed response: {e}"),
    })?;

    let ok_status = status.map(|s| (200..300).contains(&s)).unwrap_or(true);
    if !ok_status || !response.success {
        return Err(Error::Service {
            status,
            message: response.failure_message(),
        });
    }

    match response.transcription {
        Some(text) => Ok(TranscriptionResult {
            text,
            language: response.language,
        }),
        None => Err(Error::Service {
            status,
            message: "response contained no transcription".into(),
        }),
    }
}

/// HTTP dispatcher for the transcription proxy endpoint.
pub struct HttpDispatcher {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TranscriptionBackend for HttpDispatcher {
    async fn transcribe(
        &self,
        credential: &str,
        request: TranscriptionRequest,
    ) -> Result<TranscriptionResult> {
        validate(credential, &request)?;

        let audio_part = reqwest::multipart::Part::bytes(request.payload.bytes)
            .file_name(request.payload.file_name)
            .mime_str(request.payload.mime_type)
            .map_err(|e| Error::Network(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("audio", audio_part)
            .text("apiKey", credential.to_string());
        if let Some(lang) = request.language {
            form = form.text("language", lang);
        }

        crate::verbose!("dispatching recording to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        parse_response(Some(status), &body)
    }
}
