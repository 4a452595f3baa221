use std::path::Path;

use tracing::debug;

use crate::error::{RedubError, Result};

use super::{MediaAsset, MediaKind, MediaToolkit};

/// Measure the duration of the first `kind` stream in `path`.
///
/// Every failure mode (missing file, unreadable container, absent stream,
/// non-numeric or non-positive duration) is reported as `ProbeFailed`.
pub async fn probe(toolkit: &dyn MediaToolkit, path: &Path, kind: MediaKind) -> Result<MediaAsset> {
    if !path.is_file() {
        return Err(RedubError::probe(path.display(), "file not found"));
    }

    let secs = toolkit
        .probe_duration(path, kind)
        .await
        .map_err(|e| match e {
            RedubError::ProbeFailed { .. } => e,
            other => RedubError::probe(path.display(), other.to_string()),
        })?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(RedubError::probe(
            path.display(),
            format!("invalid {kind} duration {secs}"),
        ));
    }

    debug!("{} duration of {:?}: {:.3}s", kind, path, secs);
    Ok(MediaAsset::new(path, kind, secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::media::AudioFormat;
    use async_trait::async_trait;

    /// Toolkit whose probe always answers with a fixed result.
    struct FixedProbe(std::result::Result<f64, &'static str>);

    #[async_trait]
    impl MediaToolkit for FixedProbe {
        async fn probe_duration(&self, _path: &Path, _kind: MediaKind) -> Result<f64> {
            self.0.map_err(|reason| RedubError::tool("ffprobe", reason))
        }
        async fn apply_tempo(&self, _: &Path, _: &Path, _: f64) -> Result<()> {
            unreachable!()
        }
        async fn pad_trim(&self, _: &Path, _: &Path, _: f64, _: &AudioFormat) -> Result<()> {
            unreachable!()
        }
        async fn remux(&self, _: &Path, _: &Path, _: &Path, _: bool) -> Result<()> {
            unreachable!()
        }
        async fn extract_audio(&self, _: &Path, _: &Path) -> Result<()> {
            unreachable!()
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn existing_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[tokio::test]
    async fn test_probe_returns_asset() {
        let file = existing_file();
        let asset = probe(&FixedProbe(Ok(42.5)), file.path(), MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(asset.kind(), MediaKind::Video);
        assert_eq!(asset.duration_secs(), 42.5);
        assert_eq!(asset.path(), file.path());
    }

    #[tokio::test]
    async fn test_zero_or_negative_duration_is_probe_failure() {
        let file = existing_file();
        for secs in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let err = probe(&FixedProbe(Ok(secs)), file.path(), MediaKind::Audio)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProbeFailed, "duration {secs}");
        }
    }

    #[tokio::test]
    async fn test_tool_error_becomes_probe_failure() {
        let file = existing_file();
        let err = probe(&FixedProbe(Err("Invalid data found")), file.path(), MediaKind::Audio)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProbeFailed);
        assert!(err.to_string().contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_missing_file_is_probe_failure() {
        let err = probe(
            &FixedProbe(Ok(1.0)),
            Path::new("/nonexistent/video.mp4"),
            MediaKind::Video,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProbeFailed);
    }
}
