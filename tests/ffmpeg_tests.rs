//! End-to-end tests against real ffmpeg and ffprobe.
//!
//! Each test returns early when the tools are not installed.

use redub::error::ErrorKind;
use redub::media::{probe, FfmpegToolkit, MediaKind, MediaToolkit};
use redub::pipeline::{Orchestrator, PipelineOptions, Stage};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn tools_available() -> bool {
    let ok = |tool: &str| {
        Command::new(tool)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    };
    let available = ok("ffmpeg") && ok("ffprobe");
    if !available {
        eprintln!("ffmpeg/ffprobe not found, skipping");
    }
    available
}

fn ffmpeg(args: &[&str]) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error"])
        .args(args)
        .status()
        .unwrap();
    assert!(status.success(), "ffmpeg {:?} failed", args);
}

/// Test-pattern video of `secs`, optionally with a tone track.
fn make_video(dir: &TempDir, name: &str, secs: f64, with_audio: bool) -> PathBuf {
    let out = dir.path().join(name);
    let video_src = format!("testsrc=size=160x120:rate=25:duration={secs}");
    let mut args = vec!["-f", "lavfi", "-i", video_src.as_str()];
    let audio_src = format!("sine=frequency=220:duration={secs}");
    if with_audio {
        args.extend(["-f", "lavfi", "-i", audio_src.as_str(), "-c:a", "aac"]);
    }
    args.extend(["-c:v", "mpeg4", "-shortest"]);
    let out_str = out.to_string_lossy().into_owned();
    args.push(out_str.as_str());
    ffmpeg(&args);
    out
}

fn make_speech(dir: &TempDir, name: &str, secs: f64) -> PathBuf {
    let out = dir.path().join(name);
    let src = format!("sine=frequency=440:sample_rate=24000:duration={secs}");
    let out_str = out.to_string_lossy().into_owned();
    ffmpeg(&["-f", "lavfi", "-i", src.as_str(), out_str.as_str()]);
    out
}

/// MD5 of the first video stream's packets.
fn video_md5(path: &Path) -> String {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-map", "0:v:0", "-c", "copy", "-f", "md5", "-"])
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn orchestrator(scratch: &Path) -> Orchestrator {
    Orchestrator::new(Arc::new(FfmpegToolkit::new())).with_options(PipelineOptions {
        temp_dir: Some(scratch.to_path_buf()),
        keep_artifacts_on_failure: false,
        ..PipelineOptions::default()
    })
}

async fn check_fit(video_secs: f64, speech_secs: f64) {
    let dir = tempfile::tempdir().unwrap();
    let video = make_video(&dir, "in.mp4", video_secs, true);
    let speech = make_speech(&dir, "speech.wav", speech_secs);
    let output = dir.path().join("out.mp4");

    let run = orchestrator(dir.path())
        .sync(&video, &speech, &output)
        .await
        .unwrap();
    assert_eq!(run.stage(), Stage::Done);

    let toolkit = FfmpegToolkit::new();
    let video_len = toolkit
        .probe_duration(&output, MediaKind::Video)
        .await
        .unwrap();
    let audio_len = toolkit
        .probe_duration(&output, MediaKind::Audio)
        .await
        .unwrap();
    // One AAC frame of slack for encoder priming.
    assert!(
        (audio_len - video_len).abs() < 0.05,
        "audio {audio_len}s vs video {video_len}s"
    );
    assert_eq!(video_md5(&video), video_md5(&output));
}

#[tokio::test]
async fn test_long_speech_is_compressed_to_video_length() {
    if !tools_available() {
        return;
    }
    check_fit(4.0, 9.0).await;
}

#[tokio::test]
async fn test_short_speech_is_stretched_to_video_length() {
    if !tools_available() {
        return;
    }
    check_fit(6.0, 2.5).await;
}

#[tokio::test]
async fn test_ratio_beyond_one_stage() {
    if !tools_available() {
        return;
    }
    // 5x needs three tempo steps.
    check_fit(5.0, 1.0).await;
}

#[tokio::test]
async fn test_resyncing_output_changes_nothing() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = make_video(&dir, "in.mp4", 3.0, true);
    let speech = make_speech(&dir, "speech.wav", 4.0);
    let first = dir.path().join("first.mp4");
    let second = dir.path().join("second.mp4");

    let orchestrator = orchestrator(dir.path());
    orchestrator.sync(&video, &speech, &first).await.unwrap();
    let run = orchestrator.sync(&first, &first, &second).await.unwrap();

    let plan = run.plan().unwrap();
    assert!((plan.target_ratio() - 1.0).abs() < 0.05, "ratio {}", plan.target_ratio());
    assert_eq!(video_md5(&first), video_md5(&second));
}

#[tokio::test]
async fn test_same_pair_twice_gives_same_result() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let video = make_video(&dir, "in.mp4", 3.0, true);
    let speech = make_speech(&dir, "speech.wav", 4.7);
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();

    let toolkit = FfmpegToolkit::new();
    let mut results = Vec::new();
    for name in ["first.mp4", "second.mp4"] {
        let output = dir.path().join(name);
        orchestrator(&scratch)
            .sync(&video, &speech, &output)
            .await
            .unwrap();
        // Nothing from the earlier run is left to reuse.
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);

        let audio_len = toolkit
            .probe_duration(&output, MediaKind::Audio)
            .await
            .unwrap();
        results.push((video_md5(&output), audio_len));
    }

    let (first_md5, first_len) = &results[0];
    let (second_md5, second_len) = &results[1];
    assert_eq!(first_md5, second_md5);
    assert_eq!(first_md5, &video_md5(&video));
    assert!(
        (first_len - second_len).abs() < 0.01,
        "audio {first_len}s then {second_len}s"
    );
}

#[tokio::test]
async fn test_video_without_audio_probes_as_failed() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mute = make_video(&dir, "mute.mp4", 2.0, false);

    let toolkit = FfmpegToolkit::new();
    let video = probe(&toolkit, &mute, MediaKind::Video).await.unwrap();
    assert!((video.duration_secs() - 2.0).abs() < 0.1);

    let err = probe(&toolkit, &mute, MediaKind::Audio).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProbeFailed);

    // As a speech source the mute file fails the run during probing.
    let video = make_video(&dir, "in.mp4", 2.0, true);
    let err = orchestrator(dir.path())
        .sync(&video, &mute, &dir.path().join("out.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProbeFailed);
    assert_eq!(err.stage(), Some(Stage::Probing));
}

#[tokio::test]
async fn test_normalized_audio_has_exact_length() {
    if !tools_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let speech = make_speech(&dir, "speech.wav", 1.3);
    let output = dir.path().join("fitted.m4a");
    let toolkit = FfmpegToolkit::new();

    let format = redub::media::AudioFormat::FINAL;
    toolkit
        .pad_trim(&speech, &output, 2.0, &format)
        .await
        .unwrap();
    let secs = toolkit
        .probe_duration(&output, MediaKind::Audio)
        .await
        .unwrap();
    assert!((secs - 2.0).abs() < 0.03, "got {secs}s");
}
