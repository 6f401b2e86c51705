use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

use crate::error::{MultiError, Result};

/// Maximum operations in flight for a notification fan-out
pub const DEFAULT_FAN_OUT_LIMIT: usize = 10;

/// Run `op` over every item with at most `limit` in flight, collecting failures
pub async fn fan_out<T, F, Fut>(items: Vec<T>, limit: usize, op: F) -> MultiError
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let semaphore = Semaphore::new(limit.max(1));

    let results = join_all(items.into_iter().map(|item| {
        let fut = op(item);
        let semaphore = &semaphore;
        async move {
            // Only fails once the semaphore is closed, which never happens here
            let _permit = semaphore.acquire().await;
            fut.await
        }
    }))
    .await;

    let mut errors = MultiError::new();
    for err in results.into_iter().filter_map(|r| r.err()) {
        errors.push(err);
    }
    errors
}
