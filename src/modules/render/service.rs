use super::dto::{JobRequest, JobResult, ValidatedJob};
use super::duration::estimate_duration;
use super::error::JobError;
use super::page::assemble_page;
use super::workspace::Workspace;
use crate::state::AppState;
use crate::workers::capture::RenderSpec;
use serde_json::Value;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};

/// Floor for the render duration; slow-starting animations get at least this long.
pub const MIN_RENDER_SECONDS: f64 = 15.0;

pub struct RenderService;

impl RenderService {
    /// Accepts a raw JSON body. A body that does not even fit the job shape is
    /// rejected like any other invalid job, webhook included when one is readable.
    pub async fn submit(state: AppState, body: Value) -> Result<JobResult, JobError> {
        let webhook_url = body
            .get("webhookUrl")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_owned);

        match serde_json::from_value::<JobRequest>(body) {
            Ok(req) => Self::run(state, req).await,
            Err(e) => Self::reject(&state, webhook_url, e.to_string()).await,
        }
    }

    /// Runs one job end to end and reports the outcome to its webhook exactly once.
    pub async fn run(state: AppState, req: JobRequest) -> Result<JobResult, JobError> {
        let webhook_url = req.webhook_url.clone().filter(|url| !url.is_empty());

        let job = match req.into_validated() {
            Ok(job) => job,
            Err(message) => return Self::reject(&state, webhook_url, message).await,
        };

        let span = info_span!("render_job", job_id = %job.job_id);
        Self::execute(&state, &job).instrument(span).await
    }

    async fn execute(state: &AppState, job: &ValidatedJob) -> Result<JobResult, JobError> {
        info!("🎞️ Render job started ({}x{})", job.width, job.height);

        let workspace = match Workspace::create(&state.config.work_dir, &job.job_id).await {
            Ok(workspace) => workspace,
            Err(e) => return Self::fail(state, job, e.into()).await,
        };

        let outcome = Self::pipeline(state, job, &workspace).await;
        workspace.cleanup().await;

        match outcome {
            Ok(video_url) => {
                info!("✅ Render job completed: {}", video_url);
                let result = JobResult::completed(video_url);
                Self::report(state, &job.webhook_url, &result).await;
                Ok(result)
            }
            Err(e) => Self::fail(state, job, e).await,
        }
    }

    async fn pipeline(state: &AppState, job: &ValidatedJob, workspace: &Workspace) -> Result<String, JobError> {
        let html = assemble_page(&job.html_content, state.config.mapbox_api_key.as_deref());
        tokio::fs::write(workspace.html_path(), html)
            .await
            .map_err(JobError::Page)?;

        let estimate = estimate_duration(&job.html_content);
        let seconds = estimate.max(MIN_RENDER_SECONDS);
        info!("⏱️ Estimated {:.1}s, rendering for at least {:.1}s", estimate, seconds);

        let spec = RenderSpec {
            html_path: workspace.html_path(),
            frames_dir: workspace.frames_dir(),
            profile_dir: workspace.profile_dir(),
            output_path: workspace.video_path(),
            width: job.width,
            height: job.height,
            duration: Duration::from_secs_f64(seconds),
            uses_mapbox: job.uses_mapbox,
        };

        let summary = state.renderer.render(&spec).await?;
        info!(
            frames = summary.frames,
            fps = summary.fps,
            reason = ?summary.reason,
            "Video encoded in {:.2?}",
            summary.elapsed
        );

        let url = state.uploader.upload(&spec.output_path, &job.job_id).await?;
        Ok(url)
    }

    async fn reject(state: &AppState, webhook_url: Option<String>, message: String) -> Result<JobResult, JobError> {
        warn!("Rejected render job: {}", message);
        if let Some(url) = webhook_url {
            Self::report(state, &url, &JobResult::failed(&message)).await;
        }
        Err(JobError::Validation(message))
    }

    async fn fail(state: &AppState, job: &ValidatedJob, err: JobError) -> Result<JobResult, JobError> {
        error!("❌ Render job failed: {}", err);
        Self::report(state, &job.webhook_url, &JobResult::failed(err.to_string())).await;
        Err(err)
    }

    /// Webhook delivery problems are logged and never replace the job's own outcome.
    async fn report(state: &AppState, url: &str, result: &JobResult) {
        if let Err(e) = state.notifier.notify(url, result).await {
            error!("Failed to deliver webhook: {}", e);
        }
    }
}
