use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AnimationCode {
    #[serde(rename = "htmlContent")]
    #[validate(required(message = "animationCode.htmlContent is required"))]
    pub html_content: Option<String>,
}

/// Signed and optional so that zero, negative and missing sides surface as
/// validation messages rather than deserialization failures.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Validate, ToSchema)]
pub struct Dimensions {
    #[validate(
        required(message = "dimensions.width is required"),
        range(min = 1, message = "dimensions.width must be a positive integer")
    )]
    pub width: Option<i64>,
    #[validate(
        required(message = "dimensions.height is required"),
        range(min = 1, message = "dimensions.height must be a positive integer")
    )]
    pub height: Option<i64>,
}

/// Inbound job. Required fields stay optional here so a missing one can
/// still be reported to the webhook instead of being rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[validate(
        required(message = "jobId is required"),
        length(min = 1, message = "jobId is required")
    )]
    pub job_id: Option<String>,
    #[validate(required(message = "animationCode is required"), nested)]
    pub animation_code: Option<AnimationCode>,
    #[validate(required(message = "dimensions is required"), nested)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub uses_mapbox: bool,
    #[validate(
        required(message = "webhookUrl is required"),
        length(min = 1, message = "webhookUrl is required")
    )]
    pub webhook_url: Option<String>,
}

/// A request that passed validation; fields are no longer optional.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub job_id: String,
    pub html_content: String,
    pub width: u32,
    pub height: u32,
    pub uses_mapbox: bool,
    pub webhook_url: String,
}

impl JobRequest {
    pub fn into_validated(self) -> Result<ValidatedJob, String> {
        if let Err(errors) = self.validate() {
            return Err(describe(&errors));
        }

        match self {
            JobRequest {
                job_id: Some(job_id),
                animation_code:
                    Some(AnimationCode {
                        html_content: Some(html_content),
                    }),
                dimensions:
                    Some(Dimensions {
                        width: Some(width),
                        height: Some(height),
                    }),
                uses_mapbox,
                webhook_url: Some(webhook_url),
            } => Ok(ValidatedJob {
                job_id,
                html_content,
                width: side(width, "width")?,
                height: side(height, "height")?,
                uses_mapbox,
                webhook_url,
            }),
            _ => Err("Missing required fields".to_string()),
        }
    }
}

fn side(value: i64, name: &str) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("dimensions.{} is too large", name))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages(errors, &mut messages);
    messages.sort();
    messages.dedup();
    if messages.is_empty() {
        "Missing required fields".to_string()
    } else {
        messages.join("; ")
    }
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(list) => {
                for e in list {
                    out.push(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} is invalid", field)),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, out),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_messages(nested, out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct JobOutput {
    #[serde(rename = "videoUrl")]
    pub video_url: String,
}

/// Final outcome of a job, posted to the webhook and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobResult {
    Completed { output: JobOutput },
    Failed { error: String },
}

impl JobResult {
    pub fn completed(video_url: impl Into<String>) -> Self {
        JobResult::Completed {
            output: JobOutput {
                video_url: video_url.into(),
            },
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobResult::Failed {
            error: error.into(),
        }
    }
}
