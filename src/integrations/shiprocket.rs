//! Shiprocket shipment tracking.

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;
use crate::config::ShiprocketConfig;

const API_BASE: &str = "https://apiv2.shiprocket.in/v1/external";
/// Tokens are valid for ten days; refresh a day early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(9 * 24 * 60 * 60);

pub struct ShiprocketClient {
    http: reqwest::Client,
    config: ShiprocketConfig,
    base: String,
    token: RwLock<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Tracking endpoint with the AWB as a single encoded path segment.
fn tracking_url(base: &str, awb_code: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base).context("invalid shiprocket base url")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("shiprocket base url cannot carry a path"))?
        .pop_if_empty()
        .extend(["courier", "track", "awb", awb_code]);
    Ok(url)
}

impl ShiprocketClient {
    pub fn new(http: reqwest::Client, config: ShiprocketConfig) -> Self {
        Self::with_base(http, config, API_BASE)
    }

    fn with_base(http: reqwest::Client, config: ShiprocketConfig, base: &str) -> Self {
        Self { http, config, base: base.trim_end_matches('/').to_string(), token: RwLock::new(None) }
    }

    async fn token(&self) -> anyhow::Result<String> {
        if let Some((token, issued)) = self.token.read().await.as_ref() {
            if issued.elapsed() < TOKEN_LIFETIME { return Ok(token.clone()); }
        }
        let mut slot = self.token.write().await;
        if let Some((token, issued)) = slot.as_ref() {
            if issued.elapsed() < TOKEN_LIFETIME { return Ok(token.clone()); }
        }
        tracing::info!("refreshing shiprocket token");
        let resp = self
            .http
            .post(format!("{}/auth/login", self.base))
            .json(&serde_json::json!({ "email": self.config.email, "password": self.config.password }))
            .send()
            .await
            .context("shiprocket login failed")?;
        if !resp.status().is_success() { bail!("shiprocket login returned {}", resp.status()); }
        let login: LoginResponse = resp.json().await.context("unexpected shiprocket login response")?;
        *slot = Some((login.token.clone(), Instant::now()));
        Ok(login.token)
    }

    /// Raw tracking payload for an air waybill number.
    pub async fn track_awb(&self, awb_code: &str) -> anyhow::Result<serde_json::Value> {
        let awb_code = awb_code.trim();
        if awb_code.is_empty() { bail!("missing AWB code"); }
        let url = tracking_url(&self.base, awb_code)?;
        let token = self.token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("shiprocket tracking request failed")?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            bail!("shiprocket rejected the cached token");
        }
        if !resp.status().is_success() { bail!("shiprocket tracking returned {}", resp.status()); }
        Ok(resp.json().await.context("unexpected shiprocket tracking response")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::{Path, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

    #[derive(Clone, Default)]
    struct Upstream { logins: Arc<AtomicUsize> }

    async fn login(State(u): State<Upstream>) -> Json<serde_json::Value> {
        let n = u.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Json(serde_json::json!({ "token": format!("tok-{n}") }))
    }

    async fn track(headers: HeaderMap, Path(awb): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
        let bearer = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
        if awb == "revoked" && bearer == "Bearer tok-1" { return Err(StatusCode::UNAUTHORIZED); }
        Ok(Json(serde_json::json!({ "awb": awb, "auth": bearer })))
    }

    async fn client() -> (ShiprocketClient, Upstream) {
        let upstream = Upstream::default();
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/courier/track/awb/:awb", get(track))
            .with_state(upstream.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let config = ShiprocketConfig { email: "ops@thelovecraft.in".into(), password: "secret".into() };
        (ShiprocketClient::with_base(reqwest::Client::new(), config, &format!("http://{addr}/")), upstream)
    }

    #[test]
    fn test_awb_is_a_single_path_segment() {
        let url = tracking_url(API_BASE, "12/34?x#y").unwrap();
        assert_eq!(url.as_str(), "https://apiv2.shiprocket.in/v1/external/courier/track/awb/12%2F34%3Fx%23y");
        assert_eq!(url.query(), None);
        assert_eq!(tracking_url(API_BASE, "SR123").unwrap().path(), "/v1/external/courier/track/awb/SR123");
    }

    #[tokio::test]
    async fn test_token_is_cached_between_lookups() {
        let (client, upstream) = client().await;
        let first = client.track_awb("SR1").await.unwrap();
        let second = client.track_awb("SR2").await.unwrap();
        assert_eq!(first["auth"], "Bearer tok-1");
        assert_eq!(second["auth"], "Bearer tok-1");
        assert_eq!(upstream.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_drops_cached_token() {
        let (client, upstream) = client().await;
        assert!(client.track_awb("revoked").await.is_err());
        assert!(client.token.read().await.is_none());
        let retried = client.track_awb("revoked").await.unwrap();
        assert_eq!(retried["auth"], "Bearer tok-2");
        assert_eq!(upstream.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_encoded_awb_reaches_upstream_intact() {
        let (client, _) = client().await;
        let payload = client.track_awb("AB/12").await.unwrap();
        assert_eq!(payload["awb"], "AB/12");
        assert!(client.track_awb("  ").await.is_err());
    }
}
