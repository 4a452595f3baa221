//! Orchestration of one dubbing or sync run.

pub mod progress;
pub mod run;

pub use progress::{ConsoleProgress, NoProgress, ProgressSink};
pub use run::{PipelineRun, RunMode, Stage, StageFailure};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dub::Collaborators;
use crate::error::{ErrorKind, RedubError, Result};
use crate::languages::{Language, VoiceGender};
use crate::media::{probe, MediaKind, MediaToolkit};
use crate::sync::{normalize_audio, output_path_for, remux, NormalizeOptions, TempoPlan};
use crate::workspace::{RunId, RunWorkspace};

/// Settings shared by every run of an orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Parent of the run directories (system temp dir when unset).
    pub temp_dir: Option<PathBuf>,
    /// Keep the run directory when a run fails, for inspection.
    pub keep_artifacts_on_failure: bool,
    pub normalize: NormalizeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            temp_dir: None,
            keep_artifacts_on_failure: true,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            keep_artifacts_on_failure: config.keep_artifacts_on_failure,
            normalize: NormalizeOptions {
                drift_tolerance_secs: config.drift_tolerance_secs,
                ..NormalizeOptions::default()
            },
        }
    }
}

/// What to dub, and into which language.
#[derive(Debug, Clone)]
pub struct DubRequest {
    pub video: PathBuf,
    pub output: PathBuf,
    pub target: &'static Language,
    pub voice: VoiceGender,
    /// Language spoken in the video, passed to the transcriber as a hint.
    pub source_language: Option<String>,
}

/// Drives runs through their stages, one external call at a time.
///
/// Runs are independent: each gets its own id and temp directory, so one
/// orchestrator can serve several runs concurrently. Setting the cancel flag
/// stops every run at its next stage boundary.
pub struct Orchestrator {
    toolkit: Arc<dyn MediaToolkit>,
    options: PipelineOptions,
    progress: Arc<dyn ProgressSink>,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self {
            toolkit,
            options: PipelineOptions::default(),
            progress: Arc::new(NoProgress),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Share an existing cancel flag, e.g. one set from a Ctrl+C handler.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Fit `speech` onto `video` and write the result to `output`.
    ///
    /// `output` takes the container extension of `video`.
    pub async fn sync(&self, video: &Path, speech: &Path, output: &Path) -> Result<PipelineRun> {
        let (mut run, workspace) = self.start(RunMode::Sync)?;
        info!("Run {}: syncing {:?} onto {:?}", run.run_id(), speech, video);

        let output = output_path_for(video, output);
        let result = self
            .sync_stages(&mut run, &workspace, video, speech, &output)
            .await;
        self.finish(run, workspace, result)
    }

    /// Dub `request.video` into `request.target` end to end.
    pub async fn dub(
        &self,
        request: &DubRequest,
        collaborators: &Collaborators,
    ) -> Result<PipelineRun> {
        let (mut run, workspace) = self.start(RunMode::Dub)?;
        info!(
            "Run {}: dubbing {:?} into {}",
            run.run_id(),
            request.video,
            request.target.name
        );

        let output = output_path_for(&request.video, &request.output);
        let result = self
            .dub_stages(&mut run, &workspace, request, collaborators, &output)
            .await;
        self.finish(run, workspace, result)
    }

    fn start(&self, mode: RunMode) -> Result<(PipelineRun, RunWorkspace)> {
        let run_id = RunId::next();
        let run = PipelineRun::new(run_id.clone(), mode);
        debug!("Run {} ({:?}) using {}", run_id, mode, self.toolkit.name());
        let workspace = RunWorkspace::create(run_id, self.options.temp_dir.as_deref())
            .map_err(|e| RedubError::StageFailed {
                stage: run.stage(),
                source: Box::new(e),
                artifacts: None,
            })?;
        Ok((run, workspace))
    }

    async fn dub_stages(
        &self,
        run: &mut PipelineRun,
        workspace: &RunWorkspace,
        request: &DubRequest,
        collaborators: &Collaborators,
        output: &Path,
    ) -> Result<PathBuf> {
        let started = self.begin(run)?;
        let extracted = workspace.artifact(Stage::ExtractingAudio.key(), "wav");
        self.toolkit.extract_audio(&request.video, &extracted).await?;
        run.record_artifact("extracted_audio", &extracted);
        self.end(run, started);

        let started = self.begin(run)?;
        let transcript = collaborators
            .transcriber
            .transcribe(&extracted, request.source_language.as_deref())
            .await?;
        if transcript.trim().is_empty() {
            return Err(RedubError::Transcription("no speech recognized".to_string()));
        }
        info!("Transcribed {} chars with {}", transcript.len(), collaborators.transcriber.name());
        let transcript_path = workspace.artifact(Stage::Transcribing.key(), "txt");
        tokio::fs::write(&transcript_path, &transcript).await?;
        run.record_artifact("transcript", &transcript_path);
        run.set_transcript(transcript.clone());
        self.end(run, started);

        let started = self.begin(run)?;
        let translation = collaborators
            .translator
            .translate(&transcript, request.target)
            .await?;
        if translation.trim().is_empty() {
            return Err(RedubError::Translation(format!(
                "{} returned an empty translation",
                collaborators.translator.name()
            )));
        }
        let translation_path = workspace.artifact(Stage::Translating.key(), "txt");
        tokio::fs::write(&translation_path, &translation).await?;
        run.record_artifact("translation", &translation_path);
        run.set_translation(translation.clone());
        self.end(run, started);

        let started = self.begin(run)?;
        let voice = request.target.voice(request.voice);
        let speech = workspace.artifact(
            Stage::Synthesizing.key(),
            collaborators.synthesizer.output_extension(),
        );
        collaborators
            .synthesizer
            .synthesize(&translation, voice, &speech)
            .await?;
        info!("Synthesized speech with {} ({})", collaborators.synthesizer.name(), voice);
        run.record_artifact("speech", &speech);
        self.end(run, started);

        self.sync_stages(run, workspace, &request.video, &speech, output)
            .await
    }

    async fn sync_stages(
        &self,
        run: &mut PipelineRun,
        workspace: &RunWorkspace,
        video: &Path,
        speech: &Path,
        output: &Path,
    ) -> Result<PathBuf> {
        let toolkit = self.toolkit.as_ref();

        let started = self.begin(run)?;
        let video_in = probe(toolkit, video, MediaKind::Video).await?;
        let audio_in = probe(toolkit, speech, MediaKind::Audio).await?;
        info!(
            "Video {:.3}s, speech {:.3}s",
            video_in.duration_secs(),
            audio_in.duration_secs()
        );
        run.set_inputs(video_in.clone(), audio_in.clone());
        self.end(run, started);

        let started = self.begin(run)?;
        let plan = TempoPlan::for_durations(video_in.duration_secs(), audio_in.duration_secs())?;
        info!(
            "Duration ratio {:.6} in {} stage(s): {:?}",
            plan.target_ratio(),
            plan.stages().len(),
            plan.stages()
        );
        run.set_plan(plan.clone());
        self.end(run, started);

        let started = self.begin(run)?;
        let normalized = normalize_audio(
            toolkit,
            &audio_in,
            &plan,
            video_in.duration_secs(),
            workspace,
            &self.options.normalize,
        )
        .await?;
        for (i, path) in normalized.tempo_outputs.iter().enumerate() {
            run.record_artifact(format!("tempo_{}", i + 1), path);
        }
        run.record_artifact("normalized_audio", &normalized.path);
        run.set_normalized_secs(normalized.measured_secs);
        self.end(run, started);

        let started = self.begin(run)?;
        let final_video = remux(toolkit, video, &normalized.path, output, workspace).await?;
        run.record_artifact("final_video", &final_video);
        self.end(run, started);

        Ok(final_video)
    }

    /// Enter the current stage, unless the run was cancelled.
    fn begin(&self, run: &PipelineRun) -> Result<Instant> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(RedubError::Cancelled);
        }
        let (step, total) = run.step();
        info!("Stage {}/{}: {}", step, total, run.stage());
        self.progress.stage_started(run.stage(), step, total);
        Ok(Instant::now())
    }

    fn end(&self, run: &mut PipelineRun, started: Instant) {
        let elapsed = started.elapsed();
        let stage = run.stage();
        debug!("Stage {} finished in {:.2}s", stage, elapsed.as_secs_f64());
        self.progress.stage_finished(stage, elapsed);
        run.advance(elapsed);
    }

    fn finish(
        &self,
        mut run: PipelineRun,
        workspace: RunWorkspace,
        result: Result<PathBuf>,
    ) -> Result<PipelineRun> {
        match result {
            Ok(final_video) => {
                run.set_final_video(final_video);
                info!(
                    "Run {} done in {:.2}s",
                    run.run_id(),
                    run.total_time().as_secs_f64()
                );
                self.progress.run_finished(&run);
                // Dropping the workspace deletes every intermediate file.
                drop(workspace);
                Ok(run)
            }
            Err(error) => {
                // A tool killed by the same Ctrl+C still counts as a cancellation.
                let error = if self.cancelled.load(Ordering::Relaxed)
                    && error.kind() != ErrorKind::Cancelled
                {
                    debug!("Error after cancellation: {}", error);
                    RedubError::Cancelled
                } else {
                    error
                };
                let stage = run.stage();
                run.fail(&error);
                self.progress.run_failed(stage, &error);

                let keep = self.options.keep_artifacts_on_failure
                    && error.kind() != ErrorKind::Cancelled;
                let artifacts = if keep {
                    let dir = workspace.persist();
                    warn!("Run {} failed while {}; artifacts kept in {:?}", run.run_id(), stage, dir);
                    Some(dir)
                } else {
                    warn!("Run {} stopped while {}: {}", run.run_id(), stage, error);
                    None
                };

                Err(RedubError::StageFailed {
                    stage,
                    source: Box::new(error),
                    artifacts,
                })
            }
        }
    }
}

/// Print a summary of a finished run.
pub fn print_summary(run: &PipelineRun) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                          Redub Complete                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    if let Some(path) = run.final_video() {
        println!("  Output:     {}", path.display());
    }
    if let Some(video) = run.video_in() {
        println!("  Video:      {:.2}s", video.duration_secs());
    }
    if let Some(audio) = run.audio_in() {
        println!("  Speech:     {:.2}s", audio.duration_secs());
    }
    if let Some(plan) = run.plan() {
        let stages: Vec<String> = plan.stages().iter().map(|s| format!("{s:.4}")).collect();
        println!(
            "  Stretch:    x{:.4} ({})",
            plan.target_ratio(),
            stages.join(" · ")
        );
    }
    if let Some(secs) = run.normalized_secs() {
        println!("  Fitted:     {:.3}s", secs);
    }
    println!();
    println!("  Timing:");
    for (stage, elapsed) in run.timings() {
        println!("    {:<20} {:.2}s", stage.to_string(), elapsed.as_secs_f64());
    }
    println!("    {:<20} {:.2}s", "total", run.total_time().as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
