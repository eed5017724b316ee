use super::{ChargeLink, PaymentGateway, RefundReceipt};
use crate::config::GatewayConfig;
use crate::domain::money::Cents;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Stripe-backed gateway client.
///
/// Identifiers in responses are opaque; they are stored on the payment
/// record exactly as returned. Every network or non-2xx failure surfaces as
/// `GatewayError` with the operation name.
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkResponse {
    id: String,
    product: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

impl StripeGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| BillingError::gateway("client_init", e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::gateway(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::gateway(
                operation,
                format!("HTTP {}: {}", status, body),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BillingError::gateway(operation, e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge_link(
        &self,
        amount: Cents,
        metadata: &HashMap<String, String>,
    ) -> Result<ChargeLink> {
        let mut form = vec![
            ("amount".to_string(), amount.as_i64().to_string()),
            ("currency".to_string(), "usd".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        tracing::debug!(%amount, "requesting charge link from gateway");

        let link: PaymentLinkResponse = self
            .post_form("create_charge_link", "/v1/payment_links", &form)
            .await?;

        Ok(ChargeLink {
            link_id: link.id,
            product_ref: link.product,
        })
    }

    async fn refund(&self, charge_ref: &str, amount: Cents) -> Result<RefundReceipt> {
        let form = vec![
            ("charge".to_string(), charge_ref.to_string()),
            ("amount".to_string(), amount.as_i64().to_string()),
        ];

        tracing::debug!(charge_ref, %amount, "requesting refund from gateway");

        let refund: RefundResponse = self.post_form("refund", "/v1/refunds", &form).await?;

        Ok(RefundReceipt {
            refund_ref: refund.id,
        })
    }
}
