use crate::dub::{chunk, Transcriber};
use crate::error::{RedubError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Maximum file size for Whisper API (25 MB).
const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Maximum attempts for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

/// Speech recognition through the OpenAI Whisper API.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_delay: Duration,
    max_upload_bytes: u64,
}

impl WhisperTranscriber {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            model: "whisper-1".to_string(),
            retry_delay: Duration::from_millis(BASE_DELAY_MS),
            max_upload_bytes: MAX_FILE_SIZE,
        }
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Delay before the first retry; doubles on each further attempt.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Largest file sent in one request; longer WAV input is split.
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    async fn build_form(&self, audio_path: &Path, language: Option<&str>) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mime_type = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<WhisperResponse> {
        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let error_body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .map(|e| e.error.message)
                .unwrap_or(error_body);
            return Err(RedubError::Api(format!(
                "Whisper API rejected request ({status}): {message}"
            )));
        }

        Err(RedubError::Transcription(format!(
            "Whisper API error ({status}): {error_body}"
        )))
    }

    /// One request for one file, retried on server errors.
    async fn transcribe_file(&self, audio: &Path, language: Option<&str>) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                debug!("Retry attempt {} after {:?}", attempt, delay);
                tokio::time::sleep(delay).await;
            }

            // The form is consumed by the request, so it is rebuilt per attempt.
            let form = self.build_form(audio, language).await?;
            match self.call_api(form).await {
                Ok(response) => return Ok(response.text.trim().to_string()),
                Err(e @ RedubError::Api(_)) => return Err(e),
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RedubError::Transcription("Unknown error".to_string())))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<String> {
        let size = fs::metadata(audio).await?.len();
        let limit = self.max_upload_bytes;
        if size <= limit {
            return self.transcribe_file(audio, language).await;
        }
        if audio.extension().and_then(|e| e.to_str()) != Some("wav") {
            return Err(RedubError::Transcription(format!(
                "File too large for Whisper API: {size} bytes (max {limit} bytes)"
            )));
        }

        info!("{:?} is {} bytes, over the {} byte upload limit", audio, size, limit);
        let parent = audio
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix("whisper-chunks-")
            .tempdir_in(parent)?;
        let source = audio.to_path_buf();
        let dir = scratch.path().to_path_buf();
        let chunks = tokio::task::spawn_blocking(move || chunk::split_wav(&source, &dir, limit))
            .await
            .map_err(|e| RedubError::Transcription(format!("splitting audio failed: {e}")))??;

        let mut texts = Vec::with_capacity(chunks.len());
        for (i, piece) in chunks.iter().enumerate() {
            debug!("Transcribing piece {}/{}", i + 1, chunks.len());
            let text = self.transcribe_file(piece, language).await?;
            if !text.is_empty() {
                texts.push(text);
            }
        }
        Ok(texts.join(" "))
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = WhisperTranscriber::new("test-key".to_string());
        assert_eq!(client.base_url, OPENAI_API_BASE);
        assert_eq!(client.model, "whisper-1");
        assert_eq!(client.name(), "OpenAI Whisper");
        assert_eq!(client.max_upload_bytes, MAX_FILE_SIZE);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = WhisperTranscriber::new("k".to_string()).with_base_url("http://localhost:9/v1/");
        assert_eq!(client.base_url, "http://localhost:9/v1");
    }

    #[tokio::test]
    async fn test_oversized_non_wav_rejected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("speech.mp3");
        std::fs::write(&audio, vec![0u8; 64]).unwrap();

        let client = WhisperTranscriber::new("k".to_string())
            .with_base_url("http://127.0.0.1:9")
            .with_max_upload_bytes(32);
        let err = client.transcribe(&audio, None).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let client = WhisperTranscriber::new("k".to_string());
        let result = client.transcribe(Path::new("/nonexistent/audio.wav"), None).await;
        assert!(result.is_err());
    }
}
