//! Bounded retry with exponential backoff for authority calls.
//!
//! Only `TransientNetworkFailure` is retried. Every attempt runs under the
//! configured per-call deadline; a deadline miss counts as transient.

use std::future::Future;

use cfdi_pac::AuthorityError;

use crate::config::LifecycleConfig;

/// Run `call` until it succeeds, fails permanently, or `max_attempts` is
/// reached. `call` receives the 1-based attempt number.
///
/// Delays with the default config: 200ms, then 400ms.
pub(crate) async fn with_retry<T, F, Fut>(
    config: &LifecycleConfig,
    endpoint: &str,
    mut call: F,
) -> Result<T, AuthorityError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AuthorityError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(config.call_timeout, call(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(AuthorityError::timeout(endpoint, config.call_timeout)),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.backoff(attempt);
                tracing::warn!(
                    endpoint,
                    attempt,
                    max_attempts,
                    error_kind = %e.kind,
                    "authority call failed, retrying in {delay:?}: {}",
                    e.message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(endpoint, attempt, error_kind = %e.kind, "authority call failed after {attempt} attempts");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use cfdi_pac::AuthorityErrorKind;

    fn fast() -> LifecycleConfig {
        LifecycleConfig {
            base_delay: Duration::from_millis(1),
            call_timeout: Duration::from_millis(200),
            ..LifecycleConfig::default()
        }
    }

    fn failure(kind: AuthorityErrorKind) -> AuthorityError {
        AuthorityError::new(kind, "POST /cfdi40/stamp", "boom")
    }

    #[tokio::test]
    async fn transient_failures_exhaust_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "POST /cfdi40/stamp", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure(AuthorityErrorKind::TransientNetworkFailure)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        for kind in [
            AuthorityErrorKind::ValidationRejected,
            AuthorityErrorKind::QuotaExhausted,
            AuthorityErrorKind::AuthenticationFailure,
            AuthorityErrorKind::Unknown,
        ] {
            let calls = AtomicU32::new(0);
            let err = with_retry::<(), _, _>(&fast(), "POST /cfdi40/stamp", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(failure(kind)) }
            })
            .await
            .unwrap_err();
            assert_eq!(err.kind, kind);
            assert_eq!(calls.load(Ordering::SeqCst), 1, "{kind} must not be retried");
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let value = with_retry(&fast(), "POST /cfdi40/stamp", |attempt| async move {
            if attempt < 3 {
                Err(failure(AuthorityErrorKind::TransientNetworkFailure))
            } else {
                Ok(attempt)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn deadline_miss_is_transient() {
        let config = LifecycleConfig {
            max_attempts: 2,
            call_timeout: Duration::from_millis(10),
            ..fast()
        };
        let calls = AtomicU32::new(0);
        let err = with_retry::<(), _, _>(&config, "GET /account/credits", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, AuthorityErrorKind::TransientNetworkFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
