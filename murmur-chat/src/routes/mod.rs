use std::sync::Arc;

use validator::Validate;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};

use crate::services::ChatService;
use crate::store::Store;
use crate::AppState;

pub mod chats;
pub mod health;
pub mod messages;

/// Store calls block; run them on the blocking pool.
pub(crate) async fn blocking<S, T, F>(state: &Arc<AppState<S>>, f: F) -> AppResult<T>
where
    S: Store,
    T: Send + 'static,
    F: FnOnce(&ChatService<S>) -> AppResult<T> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.chats))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub(crate) fn validated<T: Validate>(req: &T) -> AppResult<()> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))
}
