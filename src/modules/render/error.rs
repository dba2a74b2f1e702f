use crate::infrastructure::storage::StorageError;
use crate::modules::render::workspace::WorkspaceError;
use crate::workers::capture::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job request: {0}")]
    Validation(String),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("failed to write page: {0}")]
    Page(#[source] std::io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
