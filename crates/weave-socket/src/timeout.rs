use std::future::Future;
use std::time::Duration;
use weave_core::{Result, WeaveError};

/// Worker never blocks on a read for longer than this — a peer that goes
/// silent mid-frame looks identical to one that's gone away.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(60);
/// Writes back to the orchestrator get a tighter budget since the payload
/// is already fully formed in memory.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `op` under `RECV_TIMEOUT`, mapping an elapsed deadline to
/// [`WeaveError::OperationTimedOut`]. A duration of [`Duration::ZERO`]
/// disables the timeout entirely.
pub async fn recv_with_timeout<T, F>(op: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    with_timeout(RECV_TIMEOUT, op).await
}

/// Runs `op` under `SEND_TIMEOUT`. See [`recv_with_timeout`].
pub async fn send_with_timeout<T, F>(op: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    with_timeout(SEND_TIMEOUT, op).await
}

/// Runs `op` under a caller-chosen timeout in seconds, for callers driven
/// by a loaded config rather than the built-in defaults.
pub async fn with_timeout_secs<T, F>(secs: u64, op: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    with_timeout(Duration::from_secs(secs), op).await
}

async fn with_timeout<T, F>(duration: Duration, op: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    if duration.is_zero() {
        return op.await.map_err(WeaveError::Io);
    }
    match tokio::time::timeout(duration, op).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(WeaveError::Io(e)),
        Err(_) => Err(WeaveError::OperationTimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn zero_duration_disables_timeout() {
        let result = with_timeout(Duration::ZERO, async {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
            Ok::<_, std::io::Error>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn exceeding_timeout_is_reported() {
        let result = with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(StdDuration::from_secs(60)).await;
            Ok::<_, std::io::Error>(())
        })
        .await;
        assert!(matches!(result, Err(WeaveError::OperationTimedOut)));
    }
}
