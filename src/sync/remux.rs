use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{RedubError, Result};
use crate::media::MediaToolkit;
use crate::workspace::RunWorkspace;

/// Containers that carry AAC audio without re-encoding.
const AAC_CONTAINERS: &[&str] = &["mp4", "m4v", "mov", "mkv"];

/// Output path whose extension matches the input video's container.
pub fn output_path_for(video: &Path, requested: &Path) -> PathBuf {
    match video.extension() {
        Some(ext) if requested.extension() != Some(ext) => {
            let fixed = requested.with_extension(ext);
            warn!(
                "Output container must match the input video, writing {:?} instead of {:?}",
                fixed, requested
            );
            fixed
        }
        _ => requested.to_path_buf(),
    }
}

fn accepts_aac(output: &Path) -> bool {
    output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AAC_CONTAINERS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(path.file_name()?))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Check that `output` can be created without clobbering an input.
fn check_writable(video: &Path, audio: &Path, output: &Path) -> Result<()> {
    if is_same_file(output, video) || is_same_file(output, audio) {
        return Err(RedubError::OutputNotWritable(format!(
            "{} is also an input",
            output.display()
        )));
    }

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let meta = std::fs::metadata(parent).map_err(|e| {
        RedubError::OutputNotWritable(format!("{}: {e}", parent.display()))
    })?;
    if !meta.is_dir() {
        return Err(RedubError::OutputNotWritable(format!(
            "{} is not a directory",
            parent.display()
        )));
    }
    if meta.permissions().readonly() {
        return Err(RedubError::OutputNotWritable(format!(
            "{} is read-only",
            parent.display()
        )));
    }
    Ok(())
}

/// Replace the audio of `video` with `audio`, copying the video stream as-is.
///
/// Video becomes track 0 and audio track 1 of `output`. Inputs are left untouched.
/// The muxer writes into `workspace`; `output` only appears once it succeeded.
pub async fn remux(
    toolkit: &dyn MediaToolkit,
    video: &Path,
    audio: &Path,
    output: &Path,
    workspace: &RunWorkspace,
) -> Result<PathBuf> {
    check_writable(video, audio, output)?;

    let copy_audio = accepts_aac(output);
    info!(
        "Muxing {:?} + {:?} -> {:?} (audio {})",
        video.file_name().unwrap_or_default(),
        audio.file_name().unwrap_or_default(),
        output,
        if copy_audio { "copied" } else { "re-encoded by container default" }
    );

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mkv");
    let muxed = workspace.artifact("remux", ext);
    toolkit.remux(video, audio, &muxed, copy_audio).await?;
    workspace.claim(&muxed, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_output_extension_follows_video() {
        assert_eq!(
            output_path_for(Path::new("in.mkv"), Path::new("/out/dub.mp4")),
            PathBuf::from("/out/dub.mkv")
        );
        assert_eq!(
            output_path_for(Path::new("in.mp4"), Path::new("/out/dub.mp4")),
            PathBuf::from("/out/dub.mp4")
        );
        assert_eq!(
            output_path_for(Path::new("in.mov"), Path::new("dub")),
            PathBuf::from("dub.mov")
        );
    }

    #[test]
    fn test_accepts_aac() {
        assert!(accepts_aac(Path::new("a.mp4")));
        assert!(accepts_aac(Path::new("a.MKV")));
        assert!(!accepts_aac(Path::new("a.webm")));
        assert!(!accepts_aac(Path::new("a")));
    }

    #[test]
    fn test_output_equal_to_input_rejected() {
        let err = check_writable(Path::new("v.mp4"), Path::new("a.m4a"), Path::new("v.mp4"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailed);
    }

    #[test]
    fn test_other_spelling_of_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let video = dir.path().join("v.mp4");
        std::fs::write(&video, b"video").unwrap();

        let aliased = dir.path().join("sub").join("..").join("v.mp4");
        let err = check_writable(&video, Path::new("a.m4a"), &aliased).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailed);

        #[cfg(unix)]
        {
            let link = dir.path().join("link.mp4");
            std::os::unix::fs::symlink(&video, &link).unwrap();
            assert!(check_writable(&video, Path::new("a.m4a"), &link).is_err());
        }
        assert_eq!(std::fs::read(&video).unwrap(), b"video");
    }

    #[test]
    fn test_relative_spelling_of_input_rejected() {
        let cwd = std::env::current_dir().unwrap();
        let video = cwd.join("Cargo.toml");
        assert!(check_writable(&video, Path::new("a.m4a"), Path::new("Cargo.toml")).is_err());
        assert!(check_writable(&video, Path::new("a.m4a"), Path::new("./Cargo.toml")).is_err());
    }

    #[test]
    fn test_missing_parent_rejected() {
        let err = check_writable(
            Path::new("v.mp4"),
            Path::new("a.m4a"),
            Path::new("/nonexistent/dir/out.mp4"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailed);
    }

    #[test]
    fn test_existing_directory_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        assert!(check_writable(Path::new("v.mp4"), Path::new("a.m4a"), &out).is_ok());
    }
}
