//! Environment driven configuration

use anyhow::{Context, Result};
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub client_url: String,
    pub cookie_secure: bool,
    pub nats_url: Option<String>,
    pub razorpay: Option<RazorpayConfig>,
    pub cashfree: Option<CashfreeConfig>,
    pub google: Option<GoogleConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub shiprocket: Option<ShiprocketConfig>,
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CashfreeConfig {
    pub app_id: String,
    pub secret_key: String,
    pub base_url: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

#[derive(Clone, Debug)]
pub struct ShiprocketConfig {
    pub email: String,
    pub password: String,
}

fn var(key: &str) -> Option<String> { env::var(key).ok().filter(|v| !v.trim().is_empty()) }

impl AppConfig {
    /// Reads the process environment. Integrations whose credentials are missing
    /// stay `None` and their endpoints report them as unavailable.
    pub fn from_env() -> Result<Self> {
        let razorpay = match (var("RAZORPAY_KEY_ID"), var("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig { key_id, key_secret, webhook_secret: var("RAZORPAY_WEBHOOK_SECRET") }),
            _ => None,
        };
        let cashfree = match (var("CASHFREE_APP_ID"), var("CASHFREE_SECRET_KEY")) {
            (Some(app_id), Some(secret_key)) => {
                let base_url = match var("CASHFREE_ENV").as_deref() {
                    Some("production") => "https://api.cashfree.com/pg",
                    _ => "https://sandbox.cashfree.com/pg",
                };
                Some(CashfreeConfig {
                    app_id, secret_key, base_url: base_url.to_string(),
                    api_version: var("CASHFREE_API_VERSION").unwrap_or_else(|| "2023-08-01".to_string()),
                })
            }
            _ => None,
        };
        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET"), var("GOOGLE_REDIRECT_URL")) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(GoogleConfig { client_id, client_secret, redirect_url }),
            _ => None,
        };
        let cloudinary = match (var("CLOUDINARY_CLOUD_NAME"), var("CLOUDINARY_API_KEY"), var("CLOUDINARY_API_SECRET")) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name, api_key, api_secret, folder: var("CLOUDINARY_FOLDER").unwrap_or_else(|| "lovecraft".to_string()),
            }),
            _ => None,
        };
        let shiprocket = match (var("SHIPROCKET_EMAIL"), var("SHIPROCKET_PASSWORD")) {
            (Some(email), Some(password)) => Some(ShiprocketConfig { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: var("PORT").map(|p| p.parse()).transpose().context("PORT must be a number")?.unwrap_or(5000),
            jwt_secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_ttl_hours: var("JWT_TTL_HOURS").map(|h| h.parse()).transpose().context("JWT_TTL_HOURS must be a number")?.unwrap_or(168),
            client_url: var("CLIENT_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            cookie_secure: var("COOKIE_SECURE").map(|v| v == "true" || v == "1").unwrap_or(false),
            nats_url: var("NATS_URL"),
            razorpay, cashfree, google, cloudinary, shiprocket,
        })
    }

    /// Minimal configuration with every integration disabled.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(), port: 0, jwt_secret: "test-secret".to_string(), jwt_ttl_hours: 1,
            client_url: "http://localhost:5173".to_string(), cookie_secure: false, nats_url: None,
            razorpay: None, cashfree: None, google: None, cloudinary: None, shiprocket: None,
        }
    }
}
