//! Cashfree Payment Gateway (PG) orders API and webhook verification.

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use crate::config::CashfreeConfig;
use crate::domain::value_objects::Money;
use super::verify_hmac_sha256;

pub struct CashfreeClient {
    http: reqwest::Client,
    config: CashfreeConfig,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_name: String,
}

#[derive(Debug, Serialize)]
struct OrderMeta {
    return_url: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    order_id: &'a str,
    order_amount: f64,
    order_currency: &'a str,
    customer_details: CustomerDetails,
    order_meta: OrderMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashfreeOrder {
    pub order_id: String,
    pub order_status: String,
    #[serde(default)]
    pub payment_session_id: Option<String>,
    #[serde(default)]
    pub order_amount: Option<f64>,
}

impl CashfreeOrder {
    pub fn is_paid(&self) -> bool { self.order_status == "PAID" }
    pub fn is_terminal_failure(&self) -> bool { matches!(self.order_status.as_str(), "EXPIRED" | "TERMINATED") }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub order: WebhookOrder,
    pub payment: Option<WebhookPayment>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookOrder {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayment {
    pub cf_payment_id: Option<serde_json::Value>,
    pub payment_status: String,
}

impl CashfreeClient {
    pub fn new(http: reqwest::Client, config: CashfreeConfig) -> Self { Self { http, config } }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.base_url, path))
            .header("x-client-id", &self.config.app_id)
            .header("x-client-secret", &self.config.secret_key)
            .header("x-api-version", &self.config.api_version)
    }

    /// `order_id` is the gateway side id; the store uses its order number.
    pub async fn create_order(&self, order_id: &str, amount: Money, customer: CustomerDetails, return_url: String) -> anyhow::Result<CashfreeOrder> {
        let body = CreateOrderBody {
            order_id,
            order_amount: amount.amount().to_f64().context("order amount out of range")?,
            order_currency: "INR",
            customer_details: customer,
            order_meta: OrderMeta { return_url },
        };
        let resp = self.request(reqwest::Method::POST, "/orders").json(&body).send().await.context("cashfree request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("cashfree returned {status}: {text}");
        }
        Ok(resp.json().await.context("unexpected cashfree order response")?)
    }

    pub async fn get_order(&self, order_id: &str) -> anyhow::Result<CashfreeOrder> {
        let resp = self.request(reqwest::Method::GET, &format!("/orders/{order_id}")).send().await.context("cashfree request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("cashfree returned {status}: {text}");
        }
        Ok(resp.json().await.context("unexpected cashfree order response")?)
    }

    pub fn verify_webhook(&self, timestamp: &str, body: &[u8], signature: &str) -> bool {
        verify_webhook_signature(&self.config.secret_key, timestamp, body, signature)
    }
}

/// Webhook signature: base64 HMAC-SHA256 of `timestamp || raw body` keyed with the secret key.
pub fn verify_webhook_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let Ok(tag) = STANDARD.decode(signature.trim()) else { return false };
    let mut message = timestamp.as_bytes().to_vec();
    message.extend_from_slice(body);
    verify_hmac_sha256(secret.as_bytes(), &message, &tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::hmac_sha256;

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"type":"PAYMENT_SUCCESS_WEBHOOK"}"#;
        let mut signed = b"1700000000".to_vec();
        signed.extend_from_slice(body);
        let sig = STANDARD.encode(hmac_sha256(b"cf_secret", &signed));
        assert!(verify_webhook_signature("cf_secret", "1700000000", body, &sig));
        assert!(!verify_webhook_signature("cf_secret", "1700000001", body, &sig));
        assert!(!verify_webhook_signature("cf_secret", "1700000000", body, "%%%"));
    }

    #[test]
    fn test_webhook_payload_shape() {
        let raw = r#"{"type":"PAYMENT_SUCCESS_WEBHOOK","data":{"order":{"order_id":"TLC20240314-ABC123","order_amount":540},"payment":{"cf_payment_id":5114,"payment_status":"SUCCESS"}}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, "PAYMENT_SUCCESS_WEBHOOK");
        assert_eq!(event.data.order.order_id, "TLC20240314-ABC123");
        assert_eq!(event.data.payment.unwrap().payment_status, "SUCCESS");
    }

    #[test]
    fn test_order_status_helpers() {
        let order = CashfreeOrder { order_id: "x".into(), order_status: "PAID".into(), payment_session_id: None, order_amount: None };
        assert!(order.is_paid());
        assert!(!CashfreeOrder { order_status: "ACTIVE".into(), ..order.clone() }.is_paid());
    }
}
