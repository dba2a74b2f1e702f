#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Json, Router, http::StatusCode, routing::post};
use bytes::Bytes;
use render_worker::config::settings::{AppConfig, RenderBackend};
use render_worker::infrastructure::storage::{ObjectStore, PutOptions, StorageError, VideoUploader};
use render_worker::infrastructure::webhook::WebhookNotifier;
use render_worker::state::AppState;
use render_worker::workers::capture::{
    CaptureSummary, RenderError, RenderResult, RenderSpec, Renderer, StopReason, effective_frame_rate,
};
use render_worker::workers::encoder::{VideoEncoder, frame_file_name};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CDN: &str = "https://cdn.test";
pub const MAPBOX_KEY: &str = "pk.test-key";

/// Markers a test can put in the HTML to steer the fake renderer.
pub const FAIL_ENCODE: &str = "<!-- fail-encode -->";
pub const FAIL_RENDER: &str = "<!-- fail-render -->";

#[derive(Debug, Clone)]
pub struct RenderCall {
    pub spec: RenderSpec,
    pub html: String,
}

/// Stands in for Chromium: writes frames or a video into the job workspace.
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: Mutex<Vec<RenderCall>>,
}

impl FakeRenderer {
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, spec: &RenderSpec) -> RenderResult<CaptureSummary> {
        let html = tokio::fs::read_to_string(&spec.html_path).await?;
        self.calls.lock().unwrap().push(RenderCall {
            spec: spec.clone(),
            html: html.clone(),
        });

        // Keep concurrent jobs overlapping.
        tokio::time::sleep(Duration::from_millis(50)).await;

        if html.contains(FAIL_RENDER) {
            return Err(RenderError::NoFrames);
        }

        tokio::fs::create_dir_all(&spec.frames_dir).await?;
        for index in 0..3 {
            tokio::fs::write(spec.frames_dir.join(frame_file_name(index)), b"jpeg").await?;
        }
        let fps = effective_frame_rate(3, Duration::from_secs(1));

        if html.contains(FAIL_ENCODE) {
            VideoEncoder::new("false")
                .encode(&spec.frames_dir, fps, &spec.output_path)
                .await?;
        } else {
            tokio::fs::write(&spec.output_path, b"fake-mp4").await?;
        }

        Ok(CaptureSummary {
            frames: 3,
            fps,
            elapsed: Duration::from_secs(1),
            reason: StopReason::Signalled,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, Bytes, PutOptions)>>,
    pub fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|(k, _, _)| k.clone()).collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.objects.lock().unwrap().push((key.to_string(), body, *options));
        Ok(())
    }
}

/// Local HTTP endpoint that records every webhook payload it receives.
pub struct WebhookSink {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl WebhookSink {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let router = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{}/hook", addr),
            received,
        }
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

pub fn test_config(work_dir: &Path) -> AppConfig {
    AppConfig {
        server_port: 0,
        s3_endpoint: "http://127.0.0.1:9000".to_string(),
        s3_region: "us-east-1".to_string(),
        s3_bucket: "videos".to_string(),
        s3_access_key: "access".to_string(),
        s3_secret_key: "secret".to_string(),
        cdn_base_url: CDN.to_string(),
        mapbox_api_key: Some(MAPBOX_KEY.to_string()),
        render_backend: RenderBackend::Software,
        chrome_path: None,
        ffmpeg_path: PathBuf::from("ffmpeg"),
        work_dir: work_dir.to_path_buf(),
        max_body_bytes: 1024 * 1024,
    }
}

pub struct Harness {
    pub state: AppState,
    pub renderer: Arc<FakeRenderer>,
    pub store: Arc<MemoryStore>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let store = Arc::new(store);
        let state = AppState::new(
            test_config(work_dir.path()),
            renderer.clone(),
            VideoUploader::new(store.clone(), CDN),
            WebhookNotifier::new().unwrap(),
        );
        Self {
            state,
            renderer,
            store,
            work_dir,
        }
    }

    /// Directories still left under the work root.
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

pub fn job_json(job_id: &str, html: &str, webhook_url: &str) -> Value {
    json!({
        "jobId": job_id,
        "animationCode": { "htmlContent": html },
        "dimensions": { "width": 640, "height": 360 },
        "webhookUrl": webhook_url
    })
}

pub fn five_second_animation() -> String {
    r#"<html><head><script src="gsap.min.js"></script></head><body>
<div class="box"></div>
<script>
gsap.to(".box", { x: 200, duration: 5, onComplete: () => window.onRenderComplete() });
</script>
</body></html>"#
        .to_string()
}
