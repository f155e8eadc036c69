//! Payment provider client.
//!
//! The API only creates payment intents; the client app confirms them
//! directly with the provider using the returned client secret.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::StripeConfig;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment provider returned {status}: {message}")]
    Provider { status: u16, message: String },
}

/// A created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Creates payment intents with an external provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount_minor` units of `currency`.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// Stripe payment intents over the REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    endpoint: String,
}

impl StripeClient {
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            endpoint: format!(
                "{}/v1/payment_intents",
                config.api_base.trim_end_matches('/')
            ),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&[
                ("amount", amount_minor.to_string()),
                ("currency", currency.to_owned()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .map_or_else(|_| "unknown error".to_owned(), |body| body.error.message);
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntent = response.json().await?;
        info!(intent_id = %intent.id, "Created payment intent");
        Ok(intent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_abc"),
            currency: "inr".to_owned(),
            api_base: "http://localhost:12111/".to_owned(),
        });
        assert_eq!(client.endpoint, "http://localhost:12111/v1/payment_intents");
    }

    #[test]
    fn test_provider_error_body_parses() {
        let body: ProviderErrorBody =
            serde_json::from_str(r#"{"error":{"message":"Invalid API Key","type":"x"}}"#)
                .unwrap();
        assert_eq!(body.error.message, "Invalid API Key");
    }
}
