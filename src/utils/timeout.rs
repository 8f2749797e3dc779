use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound on closing the write half once a connection is torn down.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run `future` with a deadline, turning expiry into [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(
    future: F,
    duration: Duration,
    context: &'static str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(context)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = with_timeout_error(async { Ok(7) }, Duration::from_secs(1), "quick")
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_expiry_maps_to_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "slow operation",
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout("slow operation"))));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout_error(
            async { Err(ProtocolError::NotConnected) },
            Duration::from_secs(1),
            "unused",
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::NotConnected)));
    }
}
