use crate::config::settings::AppConfig;
use crate::infrastructure::storage::VideoUploader;
use crate::infrastructure::webhook::WebhookNotifier;
use crate::workers::capture::Renderer;
use std::sync::Arc;

/// Process-wide collaborators, built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub renderer: Arc<dyn Renderer>,
    pub uploader: VideoUploader,
    pub notifier: WebhookNotifier,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        renderer: Arc<dyn Renderer>,
        uploader: VideoUploader,
        notifier: WebhookNotifier,
    ) -> Self {
        Self {
            config,
            renderer,
            uploader,
            notifier,
        }
    }
}
