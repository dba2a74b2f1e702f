use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    S3Endpoint,
    S3Region,
    S3Bucket,
    S3AccessKey,
    S3SecretKey,
    CdnBaseUrl,
    MapboxApiKey,
    RenderBackend,
    ChromePath,
    FfmpegPath,
    WorkDir,
    MaxBodyBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3AccessKey => "S3_ACCESS_KEY",
            EnvKey::S3SecretKey => "S3_SECRET_KEY",
            EnvKey::CdnBaseUrl => "CDN_BASE_URL",
            EnvKey::MapboxApiKey => "MAPBOX_API_KEY",
            EnvKey::RenderBackend => "RENDER_BACKEND",
            EnvKey::ChromePath => "CHROME_PATH",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::WorkDir => "RENDER_WORK_DIR",
            EnvKey::MaxBodyBytes => "MAX_BODY_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values both count as absent.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str())
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
