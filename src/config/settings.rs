use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which WebGL path Chromium takes for map content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    Hardware,
    #[default]
    Software,
}

impl FromStr for RenderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardware" | "gpu" => Ok(RenderBackend::Hardware),
            "software" | "swiftshader" | "cpu" => Ok(RenderBackend::Software),
            other => Err(format!("unknown render backend: {}", other)),
        }
    }
}

impl fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderBackend::Hardware => f.write_str("hardware"),
            RenderBackend::Software => f.write_str("software"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub cdn_base_url: String,
    pub mapbox_api_key: Option<String>,
    pub render_backend: RenderBackend,
    pub chrome_path: Option<PathBuf>,
    pub ffmpeg_path: PathBuf,
    pub work_dir: PathBuf,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            s3_endpoint: env::get(EnvKey::S3Endpoint)?,
            s3_region: env::get_or(EnvKey::S3Region, "us-east-1"),
            s3_bucket: env::get(EnvKey::S3Bucket)?,
            s3_access_key: env::get(EnvKey::S3AccessKey)?,
            s3_secret_key: env::get(EnvKey::S3SecretKey)?,
            cdn_base_url: env::get(EnvKey::CdnBaseUrl)?,
            mapbox_api_key: env::get_opt(EnvKey::MapboxApiKey),
            render_backend: env::get_parsed(EnvKey::RenderBackend, RenderBackend::Software),
            chrome_path: env::get_opt(EnvKey::ChromePath).map(PathBuf::from),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            work_dir: env::get_opt(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_body_bytes: env::get_parsed(EnvKey::MaxBodyBytes, 10 * 1024 * 1024),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_aliases_and_defaults_to_software() {
        assert_eq!("GPU".parse::<RenderBackend>(), Ok(RenderBackend::Hardware));
        assert_eq!(" software ".parse::<RenderBackend>(), Ok(RenderBackend::Software));
        assert!("vulkan".parse::<RenderBackend>().is_err());
        assert_eq!(RenderBackend::default(), RenderBackend::Software);
    }
}
