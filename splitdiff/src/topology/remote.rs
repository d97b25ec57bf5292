use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ErrorKind, SplitDiffResult};
use crate::splitdiff_error;

/// Awaits a remote call under `timeout`.
///
/// Errors returned by the call are wrapped with `action`; exceeding the timeout yields an
/// [`ErrorKind::RemoteCallTimeout`] error.
pub async fn remote_call<T, F>(
    timeout: Duration,
    action: &'static str,
    target: impl Display,
    call: F,
) -> SplitDiffResult<T>
where
    F: Future<Output = SplitDiffResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.context(action)),
        Err(_) => {
            warn!(%target, ?timeout, "{action} timed out");

            Err(splitdiff_error!(
                ErrorKind::RemoteCallTimeout,
                "Remote call timed out",
                format!("{action} on {target} did not complete within {timeout:?}")
            ))
        }
    }
}
