use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{RedubError, Result};

use super::runner::ToolRunner;
use super::MediaKind;

/// Encoding of the normalized audio handed to the remuxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: &'static str,
    pub extension: &'static str,
}

impl AudioFormat {
    pub const FINAL: AudioFormat = AudioFormat {
        sample_rate: 48_000,
        channels: 2,
        codec: "aac",
        extension: "m4a",
    };

    /// Whole samples covering `secs` at this format's rate.
    pub fn total_samples(&self, secs: f64) -> u64 {
        (secs * self.sample_rate as f64).round() as u64
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::FINAL
    }
}

/// The external media operations the sync engine depends on.
///
/// Each method is one tool invocation that blocks the calling task until the
/// tool exits.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Duration in seconds of the first stream of `kind` in `path`.
    async fn probe_duration(&self, path: &Path, kind: MediaKind) -> Result<f64>;

    /// Re-time `input` by the playback-speed multiplier `speed` into `output`.
    async fn apply_tempo(&self, input: &Path, output: &Path, speed: f64) -> Result<()>;

    /// Pad with silence or cut so `output` lasts exactly `target_secs`.
    async fn pad_trim(
        &self,
        input: &Path,
        output: &Path,
        target_secs: f64,
        format: &AudioFormat,
    ) -> Result<()>;

    /// Copy the video stream of `video` and the audio stream of `audio` into `output`.
    async fn remux(&self, video: &Path, audio: &Path, output: &Path, copy_audio: bool)
        -> Result<()>;

    /// Extract the soundtrack of `video` as 16 kHz mono PCM for speech recognition.
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// `MediaToolkit` backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    runner: ToolRunner,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            runner: ToolRunner::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
            runner: ToolRunner::new().with_timeout(config.tool_timeout()),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    /// Check that both executables are installed.
    pub async fn check_available(&self) -> Result<()> {
        self.runner.check_available(&self.ffmpeg).await?;
        self.runner.check_available(&self.ffprobe).await
    }

    async fn ffmpeg(&self, args: Vec<OsString>, output: &Path) -> Result<()> {
        self.runner.run(&self.ffmpeg, &args, Some(output)).await?;
        if !output.exists() {
            return Err(RedubError::tool(
                "ffmpeg",
                format!("output file {} was not created", output.display()),
            ));
        }
        Ok(())
    }

    async fn probe_entry(&self, path: &Path, kind: MediaKind, entry: &str) -> Result<ProbeReading> {
        let args = probe_args(path, kind, entry);
        let output = self.runner.run(&self.ffprobe, &args, None).await?;
        Ok(ProbeReading::parse(&output.stdout))
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe_duration(&self, path: &Path, kind: MediaKind) -> Result<f64> {
        let reading = match self.probe_entry(path, kind, "stream=duration").await? {
            ProbeReading::Unavailable => {
                debug!("No per-stream duration in {:?}, using container duration", path);
                self.probe_entry(path, kind, "format=duration").await?
            }
            other => other,
        };

        match reading {
            ProbeReading::Seconds(secs) => Ok(secs),
            ProbeReading::Absent => Err(RedubError::probe(
                path.display(),
                format!("no {kind} stream"),
            )),
            ProbeReading::Unavailable => Err(RedubError::probe(
                path.display(),
                "duration not reported",
            )),
            ProbeReading::Garbage(text) => Err(RedubError::probe(
                path.display(),
                format!("non-numeric duration '{text}'"),
            )),
        }
    }

    async fn apply_tempo(&self, input: &Path, output: &Path, speed: f64) -> Result<()> {
        self.ffmpeg(tempo_args(input, output, speed), output).await
    }

    async fn pad_trim(
        &self,
        input: &Path,
        output: &Path,
        target_secs: f64,
        format: &AudioFormat,
    ) -> Result<()> {
        let samples = format.total_samples(target_secs);
        self.ffmpeg(pad_trim_args(input, output, samples, format), output)
            .await
    }

    async fn remux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        copy_audio: bool,
    ) -> Result<()> {
        self.ffmpeg(remux_args(video, audio, output, copy_audio), output)
            .await
    }

    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()> {
        self.ffmpeg(extract_args(video, output), output).await
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// What ffprobe printed for a single requested entry.
#[derive(Debug, Clone, PartialEq)]
enum ProbeReading {
    /// Nothing printed: no stream matched the selector.
    Absent,
    /// The entry exists but has no value ("N/A").
    Unavailable,
    Seconds(f64),
    Garbage(String),
}

impl ProbeReading {
    fn parse(stdout: &str) -> Self {
        let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return ProbeReading::Absent;
        };
        if line.eq_ignore_ascii_case("N/A") {
            return ProbeReading::Unavailable;
        }
        match line.parse::<f64>() {
            Ok(secs) => ProbeReading::Seconds(secs),
            Err(_) => ProbeReading::Garbage(line.to_string()),
        }
    }
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

fn ffmpeg_prelude(input: &Path) -> Vec<OsString> {
    vec![os("-y"), os("-v"), os("error"), os("-i"), input.into()]
}

pub(crate) fn probe_args(path: &Path, kind: MediaKind, entry: &str) -> Vec<OsString> {
    vec![
        os("-v"),
        os("error"),
        os("-select_streams"),
        os(kind.stream_selector()),
        os("-show_entries"),
        os(entry),
        os("-of"),
        os("default=noprint_wrappers=1:nokey=1"),
        path.into(),
    ]
}

pub(crate) fn tempo_args(input: &Path, output: &Path, speed: f64) -> Vec<OsString> {
    let mut args = ffmpeg_prelude(input);
    args.extend([
        os("-vn"),
        os("-filter:a"),
        os(format!("atempo={speed:.6}")),
        os("-c:a"),
        os("pcm_s16le"),
        output.into(),
    ]);
    args
}

/// Resample first so padding and trimming count output samples.
pub(crate) fn pad_trim_filter(total_samples: u64, format: &AudioFormat) -> String {
    format!(
        "aresample={rate},apad=whole_len={total_samples},atrim=end_sample={total_samples}",
        rate = format.sample_rate
    )
}

pub(crate) fn pad_trim_args(
    input: &Path,
    output: &Path,
    total_samples: u64,
    format: &AudioFormat,
) -> Vec<OsString> {
    let mut args = ffmpeg_prelude(input);
    args.extend([
        os("-vn"),
        os("-af"),
        os(pad_trim_filter(total_samples, format)),
        os("-ar"),
        os(format.sample_rate.to_string()),
        os("-ac"),
        os(format.channels.to_string()),
        os("-c:a"),
        os(format.codec),
        output.into(),
    ]);
    args
}

pub(crate) fn remux_args(
    video: &Path,
    audio: &Path,
    output: &Path,
    copy_audio: bool,
) -> Vec<OsString> {
    let mut args = ffmpeg_prelude(video);
    args.extend([
        os("-i"),
        audio.into(),
        os("-map"),
        os("0:v:0"),
        os("-map"),
        os("1:a:0"),
        os("-c:v"),
        os("copy"),
    ]);
    if copy_audio {
        args.extend([os("-c:a"), os("copy")]);
    }
    args.push(output.into());
    args
}

pub(crate) fn extract_args(video: &Path, output: &Path) -> Vec<OsString> {
    let mut args = ffmpeg_prelude(video);
    args.extend([
        os("-vn"),
        os("-acodec"),
        os("pcm_s16le"),
        os("-ar"),
        os("16000"),
        os("-ac"),
        os("1"),
        output.into(),
    ]);
    args
}
