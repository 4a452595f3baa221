use crate::error::{RedubError, Result};
use crate::languages::VoiceGender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// ffmpeg executable (name on PATH or absolute path).
    pub ffmpeg: PathBuf,
    /// ffprobe executable (name on PATH or absolute path).
    pub ffprobe: PathBuf,
    /// edge-tts executable used for speech synthesis.
    pub edge_tts: PathBuf,
    /// Per-invocation timeout for external tools, in seconds. 0 disables it.
    pub tool_timeout_secs: u64,
    /// Parent directory for run workspaces (system temp dir when unset).
    pub temp_dir: Option<PathBuf>,
    /// Keep the run directory on disk when a run fails.
    pub keep_artifacts_on_failure: bool,
    pub default_voice: VoiceGender,
    /// Language spoken in the original video (ISO 639-1).
    pub source_language: String,
    /// Speaking rate passed to the synthesizer, e.g. "-10%".
    pub tts_rate: String,
    pub gemini_model: String,
    /// Largest accepted difference between normalized audio and video length.
    pub drift_tolerance_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            gemini_api_key: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            edge_tts: PathBuf::from("edge-tts"),
            tool_timeout_secs: 600,
            temp_dir: None,
            keep_artifacts_on_failure: true,
            default_voice: VoiceGender::default(),
            source_language: "en".to_string(),
            tts_rate: "-10%".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            drift_tolerance_secs: 0.05,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    RedubError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override file values with environment variables.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Ok(path) = std::env::var("REDUB_FFMPEG") {
            self.ffmpeg = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("REDUB_FFPROBE") {
            self.ffprobe = PathBuf::from(path);
        }
        if let Ok(timeout) = std::env::var("REDUB_TOOL_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.tool_timeout_secs = t;
            }
        }
        if let Ok(dir) = std::env::var("REDUB_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(dir));
        }
        if let Ok(voice) = std::env::var("REDUB_DEFAULT_VOICE") {
            if let Ok(v) = voice.parse() {
                self.default_voice = v;
            }
        }
    }

    /// Checks shared by every mode.
    pub fn validate(&self) -> Result<()> {
        if !(self.drift_tolerance_secs.is_finite() && self.drift_tolerance_secs > 0.0) {
            return Err(RedubError::Config(
                "drift_tolerance_secs must be a positive number".to_string(),
            ));
        }
        if let Some(ref dir) = self.temp_dir {
            if !dir.is_dir() {
                return Err(RedubError::Config(format!(
                    "temp_dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Checks required before running the full dubbing flow.
    pub fn validate_for_dub(&self) -> Result<()> {
        self.validate()?;

        if self.openai_api_key.is_none() {
            return Err(RedubError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-...".to_string(),
            ));
        }
        if self.gemini_api_key.is_none() {
            return Err(RedubError::Config(
                "GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        match self.tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redub").join("config.toml"))
    }
}
