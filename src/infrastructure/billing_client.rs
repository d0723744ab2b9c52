use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

const STRIPE_CHECKOUT_SESSIONS_ENDPOINT: &str = "https://api.stripe.com/v1/checkout/sessions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

#[async_trait]
pub trait SubscriptionVerifier: Send + Sync {
    async fn verify_session(&self, session_token: &str) -> Result<PaymentStatus, InfraError>;
}

#[derive(Debug, Clone)]
pub struct StripeCheckoutVerifier {
    client: Client,
    secret_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct CheckoutSessionResponse {
    payment_status: Option<String>,
}

impl StripeCheckoutVerifier {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
        }
    }

    fn session_endpoint(session_token: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(STRIPE_CHECKOUT_SESSIONS_ENDPOINT)
            .map_err(|error| InfraError::Remote(format!("invalid stripe endpoint: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| InfraError::Remote("stripe endpoint cannot be a base".to_string()))?
            .push(session_token);
        Ok(url)
    }
}

#[async_trait]
impl SubscriptionVerifier for StripeCheckoutVerifier {
    async fn verify_session(&self, session_token: &str) -> Result<PaymentStatus, InfraError> {
        let session_token = session_token.trim();
        if session_token.is_empty() {
            return Err(InfraError::InvalidInput("session token must not be empty".to_string()));
        }
        if self.secret_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig("stripe secret key must not be empty".to_string()));
        }

        let response = self
            .client
            .get(Self::session_endpoint(session_token)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while verifying session: {error}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading session response: {error}")))?;
        if !status.is_success() {
            return Err(InfraError::Remote(format!(
                "stripe api error: http {}; body={body}",
                status.as_u16()
            )));
        }

        let parsed: CheckoutSessionResponse = serde_json::from_str(&body)
            .map_err(|error| InfraError::Remote(format!("invalid checkout session payload: {error}")))?;
        Ok(payment_status_from(parsed.payment_status.as_deref()))
    }
}

fn payment_status_from(value: Option<&str>) -> PaymentStatus {
    match value {
        Some(status) if status.eq_ignore_ascii_case("paid") => PaymentStatus::Paid,
        _ => PaymentStatus::Unpaid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_paid_sessions_count_as_paid() {
        assert_eq!(payment_status_from(Some("paid")), PaymentStatus::Paid);
        assert_eq!(payment_status_from(Some("unpaid")), PaymentStatus::Unpaid);
        assert_eq!(payment_status_from(Some("no_payment_required")), PaymentStatus::Unpaid);
        assert_eq!(payment_status_from(None), PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn empty_session_token_is_rejected() {
        let verifier = StripeCheckoutVerifier::new("sk_test_123");
        let result = verifier.verify_session(" ").await;
        assert!(matches!(result, Err(InfraError::InvalidInput(_))));
    }
}
