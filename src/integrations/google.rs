//! Google OAuth 2.0 authorization code flow.

use anyhow::{bail, Context};
use serde::Deserialize;
use url::form_urlencoded;
use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub struct GoogleOAuth {
    http: reqwest::Client,
    config: GoogleConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleOAuth {
    pub fn new(http: reqwest::Client, config: GoogleConfig) -> Self { Self { http, config } }

    pub fn authorize_url(&self, state: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .append_pair("prompt", "select_account")
            .finish();
        format!("{AUTHORIZE_URL}?{query}")
    }

    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleProfile> {
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token exchange failed")?;
        if !resp.status().is_success() { bail!("google token endpoint returned {}", resp.status()); }
        let token: TokenResponse = resp.json().await.context("unexpected google token response")?;

        let resp = self.http.get(USERINFO_URL).bearer_auth(token.access_token).send().await.context("google userinfo request failed")?;
        if !resp.status().is_success() { bail!("google userinfo returned {}", resp.status()); }
        Ok(resp.json().await.context("unexpected google userinfo response")?)
    }
}
