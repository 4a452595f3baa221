use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::dub::SpeechSynthesizer;
use crate::error::{RedubError, Result};
use crate::media::ToolRunner;

/// Speech synthesis through the `edge-tts` command-line client.
pub struct EdgeTtsSynthesizer {
    program: PathBuf,
    rate: String,
    runner: ToolRunner,
}

impl EdgeTtsSynthesizer {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("edge-tts"),
            rate: "-10%".to_string(),
            runner: ToolRunner::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.edge_tts.clone(),
            rate: config.tts_rate.clone(),
            runner: ToolRunner::new().with_timeout(config.tool_timeout()),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, text_file: &Path, voice: &str, output: &Path) -> Vec<OsString> {
        vec![
            OsString::from("--voice"),
            OsString::from(voice),
            OsString::from(format!("--rate={}", self.rate)),
            OsString::from("--file"),
            text_file.into(),
            OsString::from("--write-media"),
            output.into(),
        ]
    }
}

impl Default for EdgeTtsSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<()> {
        if text.trim().is_empty() {
            return Err(RedubError::Synthesis("nothing to speak".to_string()));
        }

        // Long transcripts do not fit on a command line; pass them as a file.
        let text_file = output.with_extension("txt");
        tokio::fs::write(&text_file, text).await?;

        info!("Synthesizing {} chars with voice {}", text.len(), voice);
        self.runner
            .run(&self.program, &self.args(&text_file, voice, output), Some(output))
            .await
            .map_err(|e| RedubError::Synthesis(e.to_string()))?;

        if !output.exists() {
            return Err(RedubError::Synthesis(format!(
                "{} did not write {}",
                self.program.display(),
                output.display()
            )));
        }
        Ok(())
    }

    fn output_extension(&self) -> &'static str {
        "mp3"
    }

    fn name(&self) -> &'static str {
        "edge-tts"
    }
}
