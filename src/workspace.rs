//! Run-scoped scratch directory for intermediate artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier of one pipeline run: `<process id>-<sequence>`.
///
/// Sequence numbers are handed out in order within a process, so ids never
/// repeat while the process lives and never collide with another process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn next() -> Self {
        let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        RunId(format!("{}-{}", std::process::id(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Temporary directory owned by one run.
///
/// Deleted with everything in it when dropped, unless [`persist`] was called.
/// Files that must outlive the run are moved out with [`claim`] first.
///
/// [`persist`]: RunWorkspace::persist
/// [`claim`]: RunWorkspace::claim
pub struct RunWorkspace {
    run_id: RunId,
    dir: Option<TempDir>,
    path: PathBuf,
}

impl RunWorkspace {
    /// Create the directory under `parent`, or the system temp dir.
    pub fn create(run_id: RunId, parent: Option<&Path>) -> Result<Self> {
        let prefix = format!("redub-{run_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!("Run {} using temp directory {:?}", run_id, path);

        Ok(Self {
            run_id,
            dir: Some(dir),
            path,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a stage's artifact: `<stage>_<runid>.<ext>`.
    pub fn artifact(&self, stage: &str, ext: &str) -> PathBuf {
        self.path.join(format!("{stage}_{}.{ext}", self.run_id))
    }

    /// Path for a stage's final artifact: `<stage>_<runid>_final.<ext>`.
    pub fn final_artifact(&self, stage: &str, ext: &str) -> PathBuf {
        self.path.join(format!("{stage}_{}_final.{ext}", self.run_id))
    }

    /// Move `artifact` to `dest` so it survives the workspace.
    pub fn claim(&self, artifact: &Path, dest: &Path) -> Result<PathBuf> {
        if std::fs::rename(artifact, dest).is_err() {
            // Different filesystem: copy, then drop the original.
            if let Err(e) = std::fs::copy(artifact, dest) {
                let _ = std::fs::remove_file(dest);
                return Err(e.into());
            }
            std::fs::remove_file(artifact)?;
        }
        debug!("Claimed {:?} -> {:?}", artifact, dest);
        Ok(dest.to_path_buf())
    }

    /// Keep the directory on disk and hand its path to the caller.
    pub fn persist(mut self) -> PathBuf {
        match self.dir.take() {
            Some(dir) => dir.keep(),
            None => self.path.clone(),
        }
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!("Cleaning up temp directory: {:?}", self.path);
            if let Err(e) = dir.close() {
                warn!("Failed to remove temp directory {:?}: {}", self.path, e);
            }
        }
    }
}

impl fmt::Debug for RunWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunWorkspace")
            .field("run_id", &self.run_id)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique_and_ordered() {
        let a = RunId::next();
        let b = RunId::next();
        assert_ne!(a, b);

        let pid = std::process::id().to_string();
        assert!(a.as_str().starts_with(&pid));
        let seq = |id: &RunId| id.as_str().rsplit('-').next().unwrap().parse::<u64>().unwrap();
        assert!(seq(&b) > seq(&a));
    }

    #[test]
    fn test_artifact_naming() {
        let parent = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(RunId::next(), Some(parent.path())).unwrap();
        let id = ws.run_id().to_string();

        assert_eq!(ws.artifact("tempo1", "wav"), ws.path().join(format!("tempo1_{id}.wav")));
        assert_eq!(
            ws.final_artifact("normalize", "m4a"),
            ws.path().join(format!("normalize_{id}_final.m4a"))
        );
        assert!(ws.path().starts_with(parent.path()));
    }

    #[test]
    fn test_concurrent_workspaces_do_not_share_paths() {
        let a = RunWorkspace::create(RunId::next(), None).unwrap();
        let b = RunWorkspace::create(RunId::next(), None).unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.artifact("tempo1", "wav"), b.artifact("tempo1", "wav"));
    }

    #[test]
    fn test_drop_removes_directory() {
        let ws = RunWorkspace::create(RunId::next(), None).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.artifact("tempo1", "wav"), b"data").unwrap();
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_claimed_artifact_survives_drop() {
        let out = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(RunId::next(), None).unwrap();
        let artifact = ws.artifact("remux", "mp4");
        std::fs::write(&artifact, b"video").unwrap();

        let dest = ws.claim(&artifact, &out.path().join("final.mp4")).unwrap();
        drop(ws);

        assert_eq!(std::fs::read(dest).unwrap(), b"video");
    }

    #[test]
    fn test_persist_keeps_directory() {
        let ws = RunWorkspace::create(RunId::next(), None).unwrap();
        std::fs::write(ws.artifact("tempo1", "wav"), b"partial").unwrap();
        let kept = ws.persist();
        assert!(kept.is_dir());
        std::fs::remove_dir_all(kept).unwrap();
    }
}
