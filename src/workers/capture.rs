use crate::config::settings::RenderBackend;
use crate::workers::encoder::{EncodeError, VideoEncoder, frame_file_name};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventScreencastFrame, NavigateParams,
    ScreencastFrameAckParams, SetBypassCspParams, StartScreencastFormat, StartScreencastParams,
    StopScreencastParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Binding installed on the page; the `onRenderComplete` wrapper forwards to it.
pub const COMPLETE_BINDING: &str = "__renderComplete";
pub const LIBRARY_GLOBAL: &str = "gsap";
pub const LIBRARY_WAIT: Duration = Duration::from_secs(10);

const FRAME_QUEUE_DEPTH: usize = 8;
const JPEG_QUALITY: i64 = 90;

const COMPLETE_HOOK_SCRIPT: &str = r#"
window.onRenderComplete = function () {
  try { window.__renderComplete('done'); } catch (e) {}
};
"#;

const STYLE_OVERRIDE_SCRIPT: &str = r#"
(() => {
  const style = document.createElement('style');
  style.textContent = `
    html, body { margin: 0; padding: 0; overflow: hidden !important; }
    * { -webkit-backface-visibility: hidden; backface-visibility: hidden;
        -webkit-font-smoothing: antialiased; image-rendering: -webkit-optimize-contrast; }
    canvas, img, svg { image-rendering: crisp-edges; }
  `;
  (document.head || document.documentElement).appendChild(style);
  return true;
})()
"#;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("no frames were captured")]
    NoFrames,
    #[error("invalid frame data: {0}")]
    Frame(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<tokio::task::JoinError> for RenderError {
    fn from(err: tokio::task::JoinError) -> Self {
        RenderError::Unexpected(err.to_string())
    }
}

/// Everything the capture driver needs for one job.
#[derive(Debug, Clone)]
pub struct RenderSpec {
    pub html_path: PathBuf,
    pub frames_dir: PathBuf,
    pub profile_dir: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
    pub uses_mapbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page called `onRenderComplete`.
    Signalled,
    Deadline,
    /// The screencast ended or failed before either of the above.
    StreamEnded,
}

#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub frames: usize,
    pub fps: u32,
    pub elapsed: Duration,
    pub reason: StopReason,
}

/// Turns an HTML document into an encoded video at `spec.output_path`.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, spec: &RenderSpec) -> RenderResult<CaptureSummary>;
}

pub fn effective_frame_rate(frames: usize, elapsed: Duration) -> u32 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        return frames.max(1) as u32;
    }
    (frames as f64 / secs).round().max(1.0) as u32
}

pub fn chromium_args(uses_mapbox: bool, backend: RenderBackend) -> Vec<String> {
    let mut args: Vec<&str> = vec![
        "--no-first-run",
        "--disable-dev-shm-usage",
        "--allow-file-access-from-files",
        "--disable-web-security",
        "--autoplay-policy=no-user-gesture-required",
        "--hide-scrollbars",
        "--force-device-scale-factor=1",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
    ];

    if uses_mapbox {
        args.extend(["--enable-webgl", "--ignore-gpu-blocklist"]);
        match backend {
            RenderBackend::Hardware => {
                args.extend(["--use-gl=egl", "--enable-gpu-rasterization", "--enable-zero-copy"])
            }
            RenderBackend::Software => args.extend([
                "--use-gl=angle",
                "--use-angle=swiftshader",
                "--enable-unsafe-swiftshader",
            ]),
        }
    } else {
        args.extend([
            "--disable-gpu",
            "--use-angle=swiftshader",
            "--enable-unsafe-swiftshader",
        ]);
    }

    args.into_iter().map(String::from).collect()
}

/// A launched browser plus the task driving its CDP connection.
struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> RenderResult<Self> {
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| RenderError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close Chromium cleanly");
        }
        if let Err(err) = self.browser.wait().await {
            warn!(error = %err, "Failed to reap Chromium process");
        }
        self.handler_task.abort();
    }
}

pub struct ChromiumRenderer {
    chrome_path: Option<PathBuf>,
    backend: RenderBackend,
    encoder: VideoEncoder,
}

impl ChromiumRenderer {
    pub fn new(chrome_path: Option<PathBuf>, backend: RenderBackend, encoder: VideoEncoder) -> Self {
        Self {
            chrome_path,
            backend,
            encoder,
        }
    }

    fn browser_config(&self, spec: &RenderSpec) -> RenderResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(spec.width, spec.height)
            .viewport(Viewport {
                width: spec.width,
                height: spec.height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: spec.width >= spec.height,
                has_touch: false,
            })
            .user_data_dir(&spec.profile_dir)
            .args(chromium_args(spec.uses_mapbox, self.backend));

        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(RenderError::Launch)
    }

    async fn capture(&self, session: &BrowserSession, spec: &RenderSpec) -> RenderResult<(usize, Duration, StopReason)> {
        let page = session
            .browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;

        page.execute(SetBypassCspParams::new(true)).await?;
        page.execute(AddBindingParams::new(COMPLETE_BINDING)).await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(COMPLETE_HOOK_SCRIPT))
            .await?;
        let mut bindings = page.event_listener::<EventBindingCalled>().await?;

        let url = Url::from_file_path(&spec.html_path).map_err(|_| {
            RenderError::Unexpected(format!("not an absolute path: {}", spec.html_path.display()))
        })?;
        let params = NavigateParams::builder()
            .url(url.as_str())
            .build()
            .map_err(RenderError::Unexpected)?;
        page.goto(params).await?;
        page.wait_for_navigation().await?;
        page.evaluate(STYLE_OVERRIDE_SCRIPT).await?;

        wait_for_global(&page, LIBRARY_GLOBAL, LIBRARY_WAIT).await?;

        let completed = CancellationToken::new();
        let listener = {
            let completed = completed.clone();
            tokio::spawn(async move {
                while let Some(call) = bindings.next().await {
                    if call.name == COMPLETE_BINDING {
                        debug!("Page signalled render completion");
                        completed.cancel();
                        break;
                    }
                }
            })
        };

        tokio::fs::create_dir_all(&spec.frames_dir).await?;
        let (tx, rx) = async_channel::bounded(FRAME_QUEUE_DEPTH);
        let writer = tokio::spawn(write_frames(rx, spec.frames_dir.clone()));

        let frames = page
            .event_listener::<EventScreencastFrame>()
            .await?
            .map(|event| {
                let data: &str = event.data.as_ref();
                RawFrame {
                    data: data.to_owned(),
                    session_id: event.session_id,
                }
            });
        page.execute(
            StartScreencastParams::builder()
                .format(StartScreencastFormat::Jpeg)
                .quality(JPEG_QUALITY)
                .max_width(i64::from(spec.width))
                .max_height(i64::from(spec.height))
                .every_nth_frame(1)
                .build(),
        )
        .await?;
        let started = Instant::now();
        info!("📸 Screencast started ({}x{})", spec.width, spec.height);

        let stop = CancellationToken::new();
        let ended = CancellationToken::new();
        let ack_page = page.clone();
        let ack = move |session_id: i64| {
            let page = ack_page.clone();
            async move {
                page.execute(ScreencastFrameAckParams::new(session_id)).await?;
                Ok::<(), RenderError>(())
            }
        };
        let pump = tokio::spawn({
            let stop = stop.clone();
            let ended = ended.clone();
            async move {
                let _ended = ended.drop_guard();
                pump_frames(frames, tx, stop, ack).await
            }
        });

        let deadline = spec.duration * 2;
        let reason = tokio::select! {
            _ = completed.cancelled() => StopReason::Signalled,
            _ = ended.cancelled() => StopReason::StreamEnded,
            _ = tokio::time::sleep(deadline) => StopReason::Deadline,
        };
        stop.cancel();
        let elapsed = started.elapsed();
        listener.abort();

        if let Err(err) = page.execute(StopScreencastParams::default()).await {
            warn!(error = %err, "Failed to stop screencast");
        }

        let pumped = pump.await?;
        let written = writer.await??;
        pumped?;

        info!("📸 Captured {} frames in {:.2?} ({:?})", written, elapsed, reason);
        Ok((written, elapsed, reason))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, spec: &RenderSpec) -> RenderResult<CaptureSummary> {
        let config = self.browser_config(spec)?;
        info!(
            width = spec.width,
            height = spec.height,
            uses_mapbox = spec.uses_mapbox,
            backend = %self.backend,
            "Launching Chromium"
        );
        let session = BrowserSession::launch(config).await?;

        let outcome = self.capture(&session, spec).await;
        session.close().await;
        let (frames, elapsed, reason) = outcome?;

        encode_capture(&self.encoder, spec, frames, elapsed, reason).await
    }
}

/// Encodes whatever the capture left in `spec.frames_dir`. An empty capture is
/// an error and the encoder is never started for it.
pub async fn encode_capture(
    encoder: &VideoEncoder,
    spec: &RenderSpec,
    frames: usize,
    elapsed: Duration,
    reason: StopReason,
) -> RenderResult<CaptureSummary> {
    if frames == 0 {
        return Err(RenderError::NoFrames);
    }

    let fps = effective_frame_rate(frames, elapsed);
    encoder.encode(&spec.frames_dir, fps, &spec.output_path).await?;

    Ok(CaptureSummary {
        frames,
        fps,
        elapsed,
        reason,
    })
}

async fn wait_for_global(page: &Page, symbol: &str, limit: Duration) -> RenderResult<()> {
    let check = format!("typeof window.{} !== 'undefined'", symbol);
    let poll = async {
        loop {
            let ready = page
                .evaluate(check.as_str())
                .await?
                .into_value::<bool>()
                .unwrap_or(false);
            if ready {
                return Ok::<(), RenderError>(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };

    tokio::time::timeout(limit, poll)
        .await
        .map_err(|_| RenderError::Timeout(format!("window.{}", symbol)))?
}

pub struct CapturedFrame {
    pub index: usize,
    pub data: Vec<u8>,
}

/// A screencast frame as delivered by CDP: base64 JPEG plus the id to ack.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: String,
    pub session_id: i64,
}

/// Forwards screencast frames to the writer. A frame is acknowledged only
/// after the writer queue has accepted it, so the browser never runs ahead
/// of disk writes by more than the queue depth.
pub async fn pump_frames<S, A, F>(
    mut frames: S,
    tx: async_channel::Sender<CapturedFrame>,
    stop: CancellationToken,
    mut ack: A,
) -> RenderResult<usize>
where
    S: Stream<Item = RawFrame> + Unpin,
    A: FnMut(i64) -> F,
    F: Future<Output = RenderResult<()>>,
{
    let mut index = 0usize;
    loop {
        let frame = tokio::select! {
            _ = stop.cancelled() => break,
            frame = frames.next() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let data = BASE64
            .decode(frame.data.as_bytes())
            .map_err(|e| RenderError::Frame(e.to_string()))?;

        if tx.send(CapturedFrame { index, data }).await.is_err() {
            break;
        }
        index += 1;

        ack(frame.session_id).await?;
    }
    Ok(index)
}

pub async fn write_frames(rx: async_channel::Receiver<CapturedFrame>, dir: PathBuf) -> RenderResult<usize> {
    let mut written = 0usize;
    while let Ok(frame) = rx.recv().await {
        tokio::fs::write(frame_path(&dir, frame.index), &frame.data).await?;
        written += 1;
    }
    Ok(written)
}

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(frame_file_name(index))
}
