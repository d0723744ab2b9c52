use crate::infrastructure::billing_client::{PaymentStatus, SubscriptionVerifier};
use crate::infrastructure::client_state::ClientStateStore;
use crate::infrastructure::error::InfraError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionOutcome {
    /// No checkout was pending.
    NoPendingIntent,
    Activated,
    NotPaid,
}

/// Verifies a pending checkout. The intent is cleared once a verdict arrives;
/// a verifier error leaves it in place for the next attempt.
pub async fn confirm_subscription<V>(
    state: &dyn ClientStateStore,
    verifier: &V,
) -> Result<SubscriptionOutcome, InfraError>
where
    V: SubscriptionVerifier + ?Sized,
{
    let Some(session_token) = state.load()?.subscription_intent else {
        return Ok(SubscriptionOutcome::NoPendingIntent);
    };

    let status = verifier.verify_session(&session_token).await?;
    let outcome = match status {
        PaymentStatus::Paid => {
            state.set_subscription_active(true)?;
            SubscriptionOutcome::Activated
        }
        PaymentStatus::Unpaid => SubscriptionOutcome::NotPaid,
    };
    state.clear_subscription_intent()?;
    log::info!("subscription: checkout verified as {status:?}");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::client_state::InMemoryClientStateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeVerifier {
        result: Result<PaymentStatus, String>,
        calls: AtomicUsize,
    }

    impl FakeVerifier {
        fn returning(result: Result<PaymentStatus, String>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SubscriptionVerifier for FakeVerifier {
        async fn verify_session(&self, _session_token: &str) -> Result<PaymentStatus, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(InfraError::Remote)
        }
    }

    #[tokio::test]
    async fn paid_session_activates_and_clears_intent() {
        let state = InMemoryClientStateStore::default();
        state.set_subscription_intent("cs_test_1").expect("intent");
        let verifier = FakeVerifier::returning(Ok(PaymentStatus::Paid));

        let outcome = confirm_subscription(&state, &verifier).await.expect("confirm");

        assert_eq!(outcome, SubscriptionOutcome::Activated);
        let stored = state.load().expect("load");
        assert!(stored.subscription_active);
        assert!(stored.subscription_intent.is_none());
    }

    #[tokio::test]
    async fn unpaid_session_clears_intent_without_activating() {
        let state = InMemoryClientStateStore::default();
        state.set_subscription_intent("cs_test_2").expect("intent");
        let verifier = FakeVerifier::returning(Ok(PaymentStatus::Unpaid));

        assert_eq!(
            confirm_subscription(&state, &verifier).await.expect("confirm"),
            SubscriptionOutcome::NotPaid
        );
        let stored = state.load().expect("load");
        assert!(!stored.subscription_active);
        assert!(stored.subscription_intent.is_none());
    }

    #[tokio::test]
    async fn missing_intent_skips_verification() {
        let state = InMemoryClientStateStore::default();
        let verifier = FakeVerifier::returning(Ok(PaymentStatus::Paid));

        assert_eq!(
            confirm_subscription(&state, &verifier).await.expect("confirm"),
            SubscriptionOutcome::NoPendingIntent
        );
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn verifier_error_keeps_intent() {
        let state = InMemoryClientStateStore::default();
        state.set_subscription_intent("cs_test_3").expect("intent");
        let verifier = FakeVerifier::returning(Err("network error".to_string()));

        assert!(confirm_subscription(&state, &verifier).await.is_err());
        assert_eq!(
            state.load().expect("load").subscription_intent.as_deref(),
            Some("cs_test_3")
        );
    }
}
