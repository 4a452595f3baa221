use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::media::{probe, AudioFormat, MediaAsset, MediaKind, MediaToolkit};
use crate::workspace::RunWorkspace;

use super::tempo::TempoPlan;

/// Settings for the exact-length pass.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub format: AudioFormat,
    /// Drift above this is logged after the final write.
    pub drift_tolerance_secs: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            format: AudioFormat::FINAL,
            drift_tolerance_secs: 0.05,
        }
    }
}

/// Audio track that now lasts as long as the video.
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub path: PathBuf,
    /// Output of each tempo step, in the order they ran.
    pub tempo_outputs: Vec<PathBuf>,
    /// Duration measured after writing, when the probe succeeded.
    pub measured_secs: Option<f64>,
}

/// Apply `plan` to `audio`, then pad or trim it to exactly `target_secs`.
pub async fn normalize_audio(
    toolkit: &dyn MediaToolkit,
    audio: &MediaAsset,
    plan: &TempoPlan,
    target_secs: f64,
    workspace: &RunWorkspace,
    options: &NormalizeOptions,
) -> Result<NormalizedAudio> {
    let speeds = plan.speed_multipliers();
    let mut current = audio.path().to_path_buf();
    let mut tempo_outputs = Vec::with_capacity(speeds.len());

    if speeds.is_empty() {
        debug!("Tempo plan is identity, skipping tempo pass");
    }

    for (i, speed) in speeds.iter().enumerate() {
        let output = workspace.artifact(&format!("tempo{}", i + 1), "wav");
        info!(
            "Tempo step {}/{}: atempo={:.6} -> {:?}",
            i + 1,
            speeds.len(),
            speed,
            output.file_name().unwrap_or_default()
        );
        toolkit.apply_tempo(&current, &output, *speed).await?;
        tempo_outputs.push(output.clone());
        current = output;
    }

    let final_path = workspace.final_artifact("normalize", options.format.extension);
    info!(
        "Fitting audio to {:.3}s ({} samples at {} Hz)",
        target_secs,
        options.format.total_samples(target_secs),
        options.format.sample_rate
    );
    toolkit
        .pad_trim(&current, &final_path, target_secs, &options.format)
        .await?;

    let measured_secs = match probe(toolkit, &final_path, MediaKind::Audio).await {
        Ok(asset) => {
            let drift = asset.duration_secs() - target_secs;
            if drift.abs() > options.drift_tolerance_secs {
                warn!(
                    "Normalized audio is {:.4}s vs video {:.4}s (drift {:+.4}s)",
                    asset.duration_secs(),
                    target_secs,
                    drift
                );
            } else {
                debug!("Normalized audio drift {:+.6}s", drift);
            }
            Some(asset.duration_secs())
        }
        Err(e) => {
            warn!("Could not verify normalized audio length: {}", e);
            None
        }
    };

    Ok(NormalizedAudio {
        path: final_path,
        tempo_outputs,
        measured_secs,
    })
}
