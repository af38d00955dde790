use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{HarnessError, HarnessResult};

/// Await `fut` unless `cancel` fires first.
///
/// Cancellation is polled first, so an already cancelled token never lets the
/// operation start doing work.
pub async fn run_cancellable<F, T>(cancel: &CancellationToken, fut: F) -> HarnessResult<T>
where
    F: Future<Output = HarnessResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarnessError::Cancelled),
        res = fut => res,
    }
}
