//! Tempo planning: how far an audio track must be stretched to fit the video,
//! split into steps a tempo filter accepts.

use crate::error::{RedubError, Result};

/// Smallest factor a single tempo step may apply.
pub const MIN_STAGE: f64 = 0.5;
/// Largest factor a single tempo step may apply.
pub const MAX_STAGE: f64 = 2.0;
/// Upper bound on the number of steps in one plan.
pub const MAX_STAGES: usize = 10;
/// Relative tolerance between the product of the steps and the ratio.
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// Chain of per-step factors whose product is `target_ratio`.
///
/// `target_ratio` is `video_duration / audio_duration`: the factor by which the
/// audio's duration must be scaled to match the video. Each stage scales the
/// duration by its value; the tempo tool is driven with the reciprocal
/// playback-speed multiplier (see [`TempoPlan::speed_multipliers`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TempoPlan {
    target_ratio: f64,
    stages: Vec<f64>,
}

impl TempoPlan {
    /// Plan the stretch that turns an `audio_secs` track into a `video_secs` one.
    pub fn for_durations(video_secs: f64, audio_secs: f64) -> Result<Self> {
        let durations_valid = video_secs.is_finite()
            && audio_secs.is_finite()
            && video_secs > 0.0
            && audio_secs > 0.0;
        if !durations_valid {
            return Err(RedubError::UnsupportedRatio {
                ratio: video_secs / audio_secs,
                reason: format!("durations must be positive (video {video_secs}s, audio {audio_secs}s)"),
            });
        }
        Self::from_ratio(video_secs / audio_secs)
    }

    /// Decompose `ratio` into stages within `[MIN_STAGE, MAX_STAGE]`.
    pub fn from_ratio(ratio: f64) -> Result<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(RedubError::UnsupportedRatio {
                ratio,
                reason: "ratio must be finite and positive".to_string(),
            });
        }

        let mut stages = Vec::new();
        let mut remaining = ratio;
        while remaining > MAX_STAGE || remaining < MIN_STAGE {
            if stages.len() == MAX_STAGES - 1 {
                return Err(RedubError::UnsupportedRatio {
                    ratio,
                    reason: format!("needs more than {MAX_STAGES} tempo stages"),
                });
            }
            let boundary = if remaining > MAX_STAGE { MAX_STAGE } else { MIN_STAGE };
            stages.push(boundary);
            remaining /= boundary;
        }
        stages.push(remaining);

        Ok(Self {
            target_ratio: ratio,
            stages,
        })
    }

    pub fn target_ratio(&self) -> f64 {
        self.target_ratio
    }

    pub fn stages(&self) -> &[f64] {
        &self.stages
    }

    pub fn product(&self) -> f64 {
        self.stages.iter().product()
    }

    /// True when no stage changes the audio.
    pub fn is_identity(&self) -> bool {
        self.stages.iter().all(|s| is_identity_stage(*s))
    }

    /// Playback-speed multipliers for the tempo tool, one per non-identity stage.
    pub fn speed_multipliers(&self) -> Vec<f64> {
        self.stages
            .iter()
            .filter(|s| !is_identity_stage(**s))
            .map(|s| 1.0 / s)
            .collect()
    }
}

fn is_identity_stage(stage: f64) -> bool {
    (stage - 1.0).abs() <= f64::EPSILON
}
