use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ErrorKind, RedubError};
use crate::media::MediaAsset;
use crate::sync::TempoPlan;
use crate::workspace::RunId;

/// Position of a run in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ExtractingAudio,
    Transcribing,
    Translating,
    Synthesizing,
    Probing,
    ComputingTempo,
    Normalizing,
    Remuxing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Short name used in artifact keys.
    pub fn key(&self) -> &'static str {
        match self {
            Stage::ExtractingAudio => "extract",
            Stage::Transcribing => "transcribe",
            Stage::Translating => "translate",
            Stage::Synthesizing => "synthesize",
            Stage::Probing => "probe",
            Stage::ComputingTempo => "tempo",
            Stage::Normalizing => "normalize",
            Stage::Remuxing => "remux",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ExtractingAudio => "extracting audio",
            Stage::Transcribing => "transcribing",
            Stage::Translating => "translating",
            Stage::Synthesizing => "synthesizing speech",
            Stage::Probing => "probing",
            Stage::ComputingTempo => "computing tempo",
            Stage::Normalizing => "normalizing",
            Stage::Remuxing => "remuxing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which chain of stages a run walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fit an existing speech track onto the video.
    Sync,
    /// Extract, transcribe, translate and synthesize first, then sync.
    Dub,
}

const SYNC_STAGES: &[Stage] = &[
    Stage::Probing,
    Stage::ComputingTempo,
    Stage::Normalizing,
    Stage::Remuxing,
];

const DUB_STAGES: &[Stage] = &[
    Stage::ExtractingAudio,
    Stage::Transcribing,
    Stage::Translating,
    Stage::Synthesizing,
    Stage::Probing,
    Stage::ComputingTempo,
    Stage::Normalizing,
    Stage::Remuxing,
];

impl RunMode {
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            RunMode::Sync => SYNC_STAGES,
            RunMode::Dub => DUB_STAGES,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

/// State of one conversion request, owned and mutated by the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    run_id: RunId,
    mode: RunMode,
    stage: Stage,
    video_in: Option<MediaAsset>,
    audio_in: Option<MediaAsset>,
    plan: Option<TempoPlan>,
    transcript: Option<String>,
    translation: Option<String>,
    artifacts: BTreeMap<String, PathBuf>,
    timings: Vec<(Stage, Duration)>,
    normalized_secs: Option<f64>,
    final_video: Option<PathBuf>,
    failure: Option<StageFailure>,
}

impl PipelineRun {
    pub(crate) fn new(run_id: RunId, mode: RunMode) -> Self {
        Self {
            run_id,
            mode,
            stage: mode.stages()[0],
            video_in: None,
            audio_in: None,
            plan: None,
            transcript: None,
            translation: None,
            artifacts: BTreeMap::new(),
            timings: Vec::new(),
            normalized_secs: None,
            final_video: None,
            failure: None,
        }
    }

    /// Move to the stage after the current one; `Done` after the last.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> Stage {
        self.timings.push((self.stage, elapsed));
        let stages = self.mode.stages();
        self.stage = match stages.iter().position(|s| *s == self.stage) {
            Some(i) if i + 1 < stages.len() => stages[i + 1],
            Some(_) => Stage::Done,
            None => self.stage,
        };
        self.stage
    }

    pub(crate) fn fail(&mut self, error: &RedubError) {
        if self.stage.is_terminal() {
            return;
        }
        self.failure = Some(StageFailure {
            stage: self.stage,
            kind: error.kind(),
            message: error.to_string(),
        });
        self.stage = Stage::Failed;
    }

    pub(crate) fn set_inputs(&mut self, video: MediaAsset, audio: MediaAsset) {
        self.video_in = Some(video);
        self.audio_in = Some(audio);
    }

    pub(crate) fn set_plan(&mut self, plan: TempoPlan) {
        self.plan = Some(plan);
    }

    pub(crate) fn set_transcript(&mut self, text: String) {
        self.transcript = Some(text);
    }

    pub(crate) fn set_translation(&mut self, text: String) {
        self.translation = Some(text);
    }

    pub(crate) fn set_normalized_secs(&mut self, secs: Option<f64>) {
        self.normalized_secs = secs;
    }

    pub(crate) fn record_artifact(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.artifacts.insert(name.into(), path.into());
    }

    pub(crate) fn set_final_video(&mut self, path: PathBuf) {
        self.final_video = Some(path);
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 1-based index of the current stage and the number of stages.
    pub fn step(&self) -> (usize, usize) {
        let stages = self.mode.stages();
        let index = stages
            .iter()
            .position(|s| *s == self.stage)
            .map(|i| i + 1)
            .unwrap_or(stages.len());
        (index, stages.len())
    }

    pub fn video_in(&self) -> Option<&MediaAsset> {
        self.video_in.as_ref()
    }

    pub fn audio_in(&self) -> Option<&MediaAsset> {
        self.audio_in.as_ref()
    }

    pub fn plan(&self) -> Option<&TempoPlan> {
        self.plan.as_ref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn translation(&self) -> Option<&str> {
        self.translation.as_deref()
    }

    /// Intermediate files by name. Paths inside the run directory are gone
    /// once the run has finished successfully.
    pub fn artifacts(&self) -> &BTreeMap<String, PathBuf> {
        &self.artifacts
    }

    pub fn timings(&self) -> &[(Stage, Duration)] {
        &self.timings
    }

    pub fn total_time(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    pub fn normalized_secs(&self) -> Option<f64> {
        self.normalized_secs
    }

    /// The finished video; set only once the run is `Done`.
    pub fn final_video(&self) -> Option<&Path> {
        match self.stage {
            Stage::Done => self.final_video.as_deref(),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }
}
