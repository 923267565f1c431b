//! Running synchronous store work from async handlers.

use crate::ServiceError;

/// Run `work` on tokio's blocking pool and wait for it.
///
/// Store operations are synchronous and may sleep between compare-and-swap
/// retries, so handlers must not call them on a runtime worker thread.
pub async fn blocking<T, F>(work: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {}", e)))?
}
