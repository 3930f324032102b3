//! Clients for third-party services: payment gateways, shipping, media uploads,
//! Google sign-in and OTP delivery.

pub mod cashfree;
pub mod cloudinary;
pub mod google;
pub mod notifier;
pub mod razorpay;
pub mod shiprocket;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(Duration::from_secs(20)).user_agent("lovecraft-commerce").build()?)
}

#[cfg(test)]
pub(crate) fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time check of an HMAC-SHA256 tag.
pub(crate) fn verify_hmac_sha256(secret: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else { return false };
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}
