use std::sync::Arc;

use agora_db::Database;

use crate::cache::ViewCache;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::mail::Mailer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub mailer: Mailer,
    /// `None` when no completion API key is configured; the assistant
    /// endpoints report an error in that case instead of failing at startup.
    pub completion: Option<CompletionClient>,
    pub views: ViewCache,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config) -> AppState {
        let mailer = Mailer::from_config(&config);
        let completion = config.completion_api_key.as_ref().map(|key| {
            CompletionClient::new(
                config.completion_base_url.clone(),
                key.clone(),
                config.completion_model.clone(),
            )
        });

        Arc::new(Self {
            db,
            config,
            mailer,
            completion,
            views: ViewCache::with_defaults(),
        })
    }
}
