use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redub::config::Config;
use redub::dub::{Collaborators, EdgeTtsSynthesizer, GeminiTranslator, WhisperTranscriber};
use redub::languages::{self, VoiceGender, LANGUAGES};
use redub::pipeline::{ConsoleProgress, DubRequest, Orchestrator, PipelineOptions, RunMode};
use redub::{print_summary, FfmpegToolkit, RedubError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "redub")]
#[command(version, about = "Fit a new speech track onto a video")]
#[command(
    long_about = "Re-dub videos: stretch or compress a speech track until it lasts exactly as long as the video, then swap it in without re-encoding the picture."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Timeout for each external tool call, in seconds (0 disables)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Keep intermediate files when a run fails (true/false)
    #[arg(long, global = true, value_name = "BOOL")]
    keep_artifacts: Option<bool>,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the audio of a video with an existing speech track
    Sync {
        /// Input video file
        video: PathBuf,

        /// Speech track to fit onto the video
        audio: PathBuf,

        /// Output video (defaults to <video>_synced with the video's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transcribe, translate and re-voice a video
    Dub {
        /// Input video file
        video: PathBuf,

        /// Target language, by name or code (e.g. Spanish, es)
        #[arg(short, long = "to")]
        to: String,

        /// Voice gender: male, female
        #[arg(long)]
        voice: Option<VoiceGender>,

        /// Language spoken in the video (ISO 639-1)
        #[arg(long = "from")]
        from: Option<String>,

        /// Output video (defaults to <video>_<language> with the video's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported target languages and their voices
    Languages,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn derive_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let mut output = input.to_path_buf();
    let name = match input.extension() {
        Some(ext) => format!(
            "{}_{}.{}",
            stem.to_string_lossy(),
            suffix,
            ext.to_string_lossy()
        ),
        None => format!("{}_{}", stem.to_string_lossy(), suffix),
    };
    output.set_file_name(name);
    output
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("{} not found: {}", what, path.display());
    }
    Ok(())
}

/// Ctrl+C sets the flag; the running stage finishes, the next one is refused.
fn install_cancel_handler() -> Result<Arc<AtomicBool>> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::Relaxed) {
            eprintln!("\nCancelling after the current stage...");
        }
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(cancelled)
}

fn print_languages() {
    println!("{:<12} {:<7} {:<26} {}", "Language", "Code", "Male voice", "Female voice");
    for lang in LANGUAGES {
        println!(
            "{:<12} {:<7} {:<26} {}",
            lang.name, lang.code, lang.male_voice, lang.female_voice
        );
    }
}

fn report_failure(err: &RedubError) {
    if let RedubError::StageFailed {
        stage, artifacts, ..
    } = err
    {
        error!("Failed while {} ({})", stage, err.kind());
        if let Some(dir) = artifacts {
            warn!("Intermediate files kept in {}", dir.display());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Command::Languages = cli.command {
        print_languages();
        return Ok(());
    }

    // Load and validate configuration
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(secs) = cli.timeout {
        config.tool_timeout_secs = secs;
    }
    if let Some(keep) = cli.keep_artifacts {
        config.keep_artifacts_on_failure = keep;
    }
    config.validate().context("Configuration validation failed")?;

    let toolkit = FfmpegToolkit::from_config(&config);
    toolkit
        .check_available()
        .await
        .context("ffmpeg and ffprobe must be installed and on PATH")?;

    let cancelled = install_cancel_handler()?;
    let mode = match cli.command {
        Command::Dub { .. } => RunMode::Dub,
        _ => RunMode::Sync,
    };
    let orchestrator = Orchestrator::new(Arc::new(toolkit))
        .with_options(PipelineOptions::from_config(&config))
        .with_progress(Arc::new(ConsoleProgress::new(mode.stages().len())))
        .with_cancel_flag(cancelled);

    if let Some(timeout) = config.tool_timeout() {
        info!("Tool timeout: {}s", timeout.as_secs());
    }

    let result = match cli.command {
        Command::Sync {
            video,
            audio,
            output,
        } => {
            require_file(&video, "Video")?;
            require_file(&audio, "Audio")?;
            let output = output.unwrap_or_else(|| derive_output_path(&video, "synced"));

            info!("Video:  {}", video.display());
            info!("Audio:  {}", audio.display());
            info!("Output: {}", output.display());

            orchestrator.sync(&video, &audio, &output).await
        }
        Command::Dub {
            video,
            to,
            voice,
            from,
            output,
        } => {
            require_file(&video, "Video")?;
            config
                .validate_for_dub()
                .context("Configuration validation failed")?;
            let target = languages::lookup(&to)?;
            let voice = voice.unwrap_or(config.default_voice);
            let output = output.unwrap_or_else(|| derive_output_path(&video, target.code));

            info!("Video:    {}", video.display());
            info!("Language: {} ({})", target.name, target.code);
            info!("Voice:    {} ({})", target.voice(voice), voice);
            info!("Output:   {}", output.display());

            // validate_for_dub guarantees both keys are present.
            let openai_key = config.openai_api_key.clone().unwrap_or_default();
            let gemini_key = config.gemini_api_key.clone().unwrap_or_default();
            let collaborators = Collaborators {
                transcriber: Box::new(WhisperTranscriber::new(openai_key)),
                translator: Box::new(
                    GeminiTranslator::new(gemini_key).with_model(config.gemini_model.clone()),
                ),
                synthesizer: Box::new(EdgeTtsSynthesizer::from_config(&config)),
            };
            let request = DubRequest {
                video,
                output,
                target,
                voice,
                source_language: from.or(Some(config.source_language.clone())),
            };

            orchestrator.dub(&request, &collaborators).await
        }
        Command::Languages => unreachable!("handled above"),
    };

    match result {
        Ok(run) => {
            print_summary(&run);
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_output_path() {
        let input = PathBuf::from("/path/to/video.mp4");

        assert_eq!(
            derive_output_path(&input, "synced"),
            PathBuf::from("/path/to/video_synced.mp4")
        );
        assert_eq!(
            derive_output_path(&input, "es"),
            PathBuf::from("/path/to/video_es.mp4")
        );
        assert_eq!(
            derive_output_path(Path::new("clip"), "fr"),
            PathBuf::from("clip_fr")
        );
    }

    #[test]
    fn test_cli_parses_sync() {
        let cli = Cli::try_parse_from(["redub", "sync", "in.mp4", "speech.wav", "--timeout", "30"])
            .unwrap();
        assert_eq!(cli.timeout, Some(30));
        match cli.command {
            Command::Sync { video, audio, output } => {
                assert_eq!(video, PathBuf::from("in.mp4"));
                assert_eq!(audio, PathBuf::from("speech.wav"));
                assert!(output.is_none());
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_cli_parses_dub_voice() {
        let cli = Cli::try_parse_from(["redub", "dub", "in.mkv", "--to", "Hindi", "--voice", "male", "--from", "en"])
            .unwrap();
        match cli.command {
            Command::Dub { to, voice, from, .. } => {
                assert_eq!(to, "Hindi");
                assert_eq!(voice, Some(VoiceGender::Male));
                assert_eq!(from.as_deref(), Some("en"));
            }
            _ => panic!("expected dub"),
        }
    }
}
