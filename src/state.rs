//! Shared application state handed to every handler.

use sqlx::PgPool;
use std::sync::Arc;
use crate::config::AppConfig;
use crate::integrations::{
    cashfree::CashfreeClient, cloudinary::CloudinarySigner, google::GoogleOAuth, http_client,
    notifier::{LogNotifier, Notifier}, razorpay::RazorpayClient, shiprocket::ShiprocketClient,
};
use crate::publisher::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub events: EventPublisher,
    pub notifier: Arc<dyn Notifier>,
    pub razorpay: Option<Arc<RazorpayClient>>,
    pub cashfree: Option<Arc<CashfreeClient>>,
    pub shiprocket: Option<Arc<ShiprocketClient>>,
    pub google: Option<Arc<GoogleOAuth>>,
    pub cloudinary: Option<CloudinarySigner>,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, nats: Option<async_nats::Client>) -> anyhow::Result<Self> {
        let http = http_client()?;
        Ok(Self {
            db,
            razorpay: config.razorpay.clone().map(|c| Arc::new(RazorpayClient::new(http.clone(), c))),
            cashfree: config.cashfree.clone().map(|c| Arc::new(CashfreeClient::new(http.clone(), c))),
            shiprocket: config.shiprocket.clone().map(|c| Arc::new(ShiprocketClient::new(http.clone(), c))),
            google: config.google.clone().map(|c| Arc::new(GoogleOAuth::new(http.clone(), c))),
            cloudinary: config.cloudinary.clone().map(CloudinarySigner::new),
            config: Arc::new(config),
            events: EventPublisher::new(nats),
            notifier: Arc::new(LogNotifier),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
