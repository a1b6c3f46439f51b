//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Keep timeouts distinct from other upstream failures
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the in-flight call is dropped on expiry
//! - Timed-out requests return 504 Gateway Timeout, failures 502

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::http::response::GatewayError;

type ClientError = hyper_util::client::legacy::Error;

#[derive(Debug, Error)]
pub enum UpstreamCallError {
    #[error("upstream call exceeded {0:?}")]
    Timeout(Duration),

    #[error("upstream call failed: {0}")]
    Failed(#[source] ClientError),
}

impl From<&UpstreamCallError> for GatewayError {
    fn from(err: &UpstreamCallError) -> Self {
        match err {
            UpstreamCallError::Timeout(_) => GatewayError::UpstreamTimeout,
            UpstreamCallError::Failed(_) => GatewayError::UpstreamUnavailable,
        }
    }
}

/// Run `call` with `deadline`.
pub async fn call_with_deadline<F, T>(deadline: Duration, call: F) -> Result<T, UpstreamCallError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(UpstreamCallError::Failed(e)),
        Err(_) => Err(UpstreamCallError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ClientError>(())
        };
        let err = call_with_deadline(Duration::from_millis(20), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamCallError::Timeout(_)));
        assert_eq!(GatewayError::from(&err).status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let fast = async { Ok::<_, ClientError>(7) };
        assert_eq!(call_with_deadline(Duration::from_secs(1), fast).await.unwrap(), 7);
    }
}
