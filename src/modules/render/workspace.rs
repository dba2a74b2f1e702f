use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("failed to create workspace {path}: {source}")]
pub struct WorkspaceError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Scratch directory owned by a single job.
///
/// The path is fixed at creation and reused for cleanup, so a failed job
/// removes exactly the directory it created.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub async fn create(base: &Path, job_id: &str) -> Result<Self, WorkspaceError> {
        let root = base.join(format!("render-{}-{}", sanitize(job_id), Uuid::new_v4().simple()));
        // Pages are loaded through file:// URLs, which need an absolute path.
        let root = std::path::absolute(&root).map_err(|source| WorkspaceError {
            path: root.clone(),
            source,
        })?;
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| WorkspaceError {
                path: root.clone(),
                source,
            })?;
        debug!(path = %root.display(), "Workspace created");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn html_path(&self) -> PathBuf {
        self.root.join("index.html")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.root.join("chromium-profile")
    }

    pub fn video_path(&self) -> PathBuf {
        self.root.join("output.mp4")
    }

    /// Removes the directory. Failures are logged, never returned.
    pub async fn cleanup(self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(path = %self.root.display(), "Workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove workspace"),
        }
    }
}

fn sanitize(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() { "job".to_string() } else { cleaned }
}
