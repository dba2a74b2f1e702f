use utoipa::OpenApi;
use crate::modules::render::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::render::handler::render_job,
    ),
    components(
        schemas(JobRequest, AnimationCode, Dimensions, JobResult, JobOutput)
    ),
    tags(
        (name = "Render", description = "Animation to video rendering")
    )
)]
pub struct ApiDoc;
