//! Delivery of verification codes.

use async_trait::async_trait;
use crate::auth::otp::{mask_target, OtpChannel};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, channel: OtpChannel, target: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes codes to the log instead of sending them. Codes appear only at debug level.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, channel: OtpChannel, target: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(%channel, target = %mask_target(target), "verification code issued");
        tracing::debug!(%channel, target, code, "verification code");
        Ok(())
    }
}
