use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

/// Coarse classification of a failure, reported alongside the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProbeFailed,
    ToolExecutionFailed,
    UnsupportedRatio,
    IoFailed,
    CollaboratorFailed,
    Cancelled,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ProbeFailed => "ProbeFailed",
            ErrorKind::ToolExecutionFailed => "ToolExecutionFailed",
            ErrorKind::UnsupportedRatio => "UnsupportedRatio",
            ErrorKind::IoFailed => "IOFailed",
            ErrorKind::CollaboratorFailed => "CollaboratorFailed",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "Config",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RedubError {
    #[error("Probe failed for {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Unsupported tempo ratio {ratio}: {reason}")]
    UnsupportedRatio { ratio: f64, reason: String },

    #[error("{tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output not writable: {0}")]
    OutputNotWritable(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Stage '{stage}' failed ({kind}): {source}", kind = .source.kind())]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<RedubError>,
        /// Run directory kept on disk for inspection, if any.
        artifacts: Option<PathBuf>,
    },
}

impl RedubError {
    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        RedubError::ToolExecutionFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn probe(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        RedubError::ProbeFailed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RedubError::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            RedubError::UnsupportedRatio { .. } => ErrorKind::UnsupportedRatio,
            RedubError::ToolExecutionFailed { .. } => ErrorKind::ToolExecutionFailed,
            RedubError::Io(_) | RedubError::OutputNotWritable(_) => ErrorKind::IoFailed,
            RedubError::Transcription(_)
            | RedubError::Translation(_)
            | RedubError::Synthesis(_)
            | RedubError::Api(_)
            | RedubError::Http(_)
            | RedubError::Json(_) => ErrorKind::CollaboratorFailed,
            RedubError::Config(_) => ErrorKind::Config,
            RedubError::Cancelled => ErrorKind::Cancelled,
            RedubError::StageFailed { source, .. } => source.kind(),
        }
    }

    /// The stage a run failed in, when this error came out of the orchestrator.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RedubError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedubError>;
