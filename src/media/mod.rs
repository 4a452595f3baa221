pub mod probe;
pub mod runner;
pub mod toolkit;

pub use probe::probe;
pub use runner::{ToolOutput, ToolRunner};
pub use toolkit::{AudioFormat, FfmpegToolkit, MediaToolkit};

use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of stream a probe asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// ffprobe stream specifier for the first stream of this kind.
    pub fn stream_selector(&self) -> &'static str {
        match self {
            MediaKind::Video => "v:0",
            MediaKind::Audio => "a:0",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// A media file whose stream duration has been measured.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    path: PathBuf,
    kind: MediaKind,
    duration_secs: f64,
}

impl MediaAsset {
    pub(crate) fn new(path: impl Into<PathBuf>, kind: MediaKind, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            kind,
            duration_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}
