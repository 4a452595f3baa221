pub mod config;
pub mod dub;
pub mod error;
pub mod languages;
pub mod media;
pub mod pipeline;
pub mod sync;
pub mod workspace;

pub use config::Config;
pub use error::{ErrorKind, RedubError, Result};
pub use languages::{Language, VoiceGender};
pub use media::{FfmpegToolkit, MediaAsset, MediaKind, MediaToolkit};
pub use pipeline::{
    print_summary, DubRequest, Orchestrator, PipelineOptions, PipelineRun, RunMode, Stage,
};
pub use sync::TempoPlan;
