pub mod admin;
pub mod assistant;
pub mod auth;
pub mod cache;
pub mod chats;
pub mod completion;
pub mod config;
pub mod dto;
pub mod error;
pub mod files;
pub mod mail;
pub mod permissions;
pub mod posts;
pub mod session;
pub mod state;
pub mod token;
pub mod users;
pub mod validate;

use error::ApiError;
use tracing::error;

/// Run blocking DB work off the async runtime. Join failures are logged
/// and surface to the client as a generic internal error.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}
