//! Razorpay orders API and signature checks.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use crate::config::RazorpayConfig;
use super::verify_hmac_sha256;

const API_BASE: &str = "https://api.razorpay.com/v1";

pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: serde_json::Value,
}

/// Subset of a webhook delivery the store reacts to.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntity {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    pub status: String,
}

impl RazorpayClient {
    pub fn new(http: reqwest::Client, config: RazorpayConfig) -> Self {
        Self { http, config, base_url: API_BASE.to_string() }
    }

    pub fn key_id(&self) -> &str { &self.config.key_id }
    pub fn has_webhook_secret(&self) -> bool { self.config.webhook_secret.is_some() }

    pub async fn create_order(&self, amount_paise: i64, receipt: &str, order_id: uuid::Uuid) -> anyhow::Result<RazorpayOrder> {
        let body = CreateOrderBody { amount: amount_paise, currency: "INR", receipt, notes: serde_json::json!({ "order_id": order_id }) };
        let resp = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .context("razorpay request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("razorpay returned {status}: {text}");
        }
        Ok(resp.json().await.context("unexpected razorpay order response")?)
    }

    /// Checkout callback signature: HMAC-SHA256 of `order_id|payment_id` keyed with the key secret.
    pub fn verify_payment_signature(&self, razorpay_order_id: &str, razorpay_payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.config.key_secret, razorpay_order_id, razorpay_payment_id, signature)
    }

    /// Webhook signature: HMAC-SHA256 of the raw body keyed with the webhook secret.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        match &self.config.webhook_secret {
            Some(secret) => verify_hex_tag(secret, body, signature),
            None => false,
        }
    }
}

pub fn verify_payment_signature(key_secret: &str, razorpay_order_id: &str, razorpay_payment_id: &str, signature: &str) -> bool {
    let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
    verify_hex_tag(key_secret, message.as_bytes(), signature)
}

fn verify_hex_tag(secret: &str, message: &[u8], signature: &str) -> bool {
    match hex::decode(signature.trim()) {
        Ok(tag) => verify_hmac_sha256(secret.as_bytes(), message, &tag),
        Err(_) => false,
    }
}
