//! Upstream services of the dubbing flow: speech recognition, translation and
//! speech synthesis.

pub mod chunk;
pub mod edge_tts;
pub mod gemini;
pub mod whisper;

pub use edge_tts::EdgeTtsSynthesizer;
pub use gemini::GeminiTranslator;
pub use whisper::WhisperTranscriber;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::languages::Language;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Plain text spoken in `audio`. `language` is an ISO 639-1 hint.
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &Language) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` with `voice` into `output`.
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<()>;
    /// File extension of the audio this synthesizer writes.
    fn output_extension(&self) -> &'static str;
    fn name(&self) -> &'static str;
}

/// The three services a dubbing run calls, in order.
pub struct Collaborators {
    pub transcriber: Box<dyn Transcriber>,
    pub translator: Box<dyn Translator>,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
}
