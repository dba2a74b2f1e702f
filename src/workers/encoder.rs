use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

/// printf-style pattern matching the names written by the capture driver.
pub const FRAME_PATTERN: &str = "frame_%06d.jpg";

pub fn frame_file_name(index: usize) -> String {
    format!("frame_{:06}.jpg", index)
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to spawn encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

#[derive(Debug, Clone)]
pub struct VideoEncoder {
    program: PathBuf,
}

impl VideoEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(frame_dir: &Path, fps: u32, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-framerate".into(),
            fps.to_string(),
            "-i".into(),
            frame_dir.join(FRAME_PATTERN).display().to_string(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "fast".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            // libx264 rejects odd dimensions with yuv420p
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-movflags".into(),
            "+faststart".into(),
            output.display().to_string(),
        ]
    }

    /// Encodes `frame_dir/frame_NNNNNN.jpg` into an H.264 MP4 at `fps`.
    pub async fn encode(&self, frame_dir: &Path, fps: u32, output: &Path) -> Result<(), EncodeError> {
        info!("🎬 Encoding {} at {} fps -> {}", frame_dir.display(), fps, output.display());

        let result = Command::new(&self.program)
            .args(Self::args(frame_dir, fps, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !result.status.success() {
            return Err(EncodeError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
