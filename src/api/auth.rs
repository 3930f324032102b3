//! Sign-up, sign-in, Google OAuth and OTP verification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::auth::{self, otp::{self, OtpChannel}, AuthUser, Role};
use crate::db::{self, OtpRow, UserRow};
use crate::domain::events::{DomainEvent, UserEvent};
use crate::domain::value_objects::{Phone, PHONE_RE};
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::state::AppState;
use super::Message;

const OAUTH_STATE_COOKIE: &str = "oauth_state";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 60, message = "Name must be 2-60 characters"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(regex(path = "PHONE_RE", message = "Phone number must be a valid 10 digit mobile number"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse { pub success: bool, pub token: String, pub user: UserRow }

fn role_of(user: &UserRow) -> Role { user.role.parse().unwrap_or(Role::Customer) }

fn signed_in(state: &AppState, jar: CookieJar, user: UserRow) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let token = auth::issue_token(&state.config, user.id, role_of(&user))?;
    let jar = jar.add(auth::session_cookie(&state.config, token.clone()));
    Ok((jar, Json(AuthResponse { success: true, token, user })))
}

async fn register(State(s): State<AppState>, jar: CookieJar, Json(r): Json<RegisterRequest>) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    r.validate()?;
    let email = r.email.trim().to_lowercase();
    let hash = auth::hash_password(&r.password)?;
    let user = sqlx::query_as::<_, UserRow>("INSERT INTO users (id, name, email, password_hash, phone) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(&email).bind(&hash).bind(&r.phone)
        .fetch_one(&s.db).await.map_err(|e| conflict_on_unique(e, "An account with this email already exists"))?;
    tracing::info!(user_id = %user.id, "user registered");
    s.events.publish(vec![DomainEvent::User(UserEvent::Registered { user_id: user.id, email: user.email.clone() })]).await;
    let (jar, body) = signed_in(&s, jar, user)?;
    Ok((StatusCode::CREATED, jar, body))
}

async fn login(State(s): State<AppState>, jar: CookieJar, Json(r): Json<LoginRequest>) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    r.validate()?;
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1").bind(r.email.trim().to_lowercase()).fetch_optional(&s.db).await?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());
    let user = user.ok_or_else(invalid)?;
    match &user.password_hash {
        Some(hash) if auth::verify_password(&r.password, hash) => {}
        Some(_) => return Err(invalid()),
        None => return Err(ApiError::Unauthorized("This account uses Google sign-in".to_string())),
    }
    signed_in(&s, jar, user)
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<Message>) {
    (jar.remove(auth::expired_session_cookie()), Message::ok("Logged out"))
}

async fn me(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<UserRow>> {
    db::find_user(&s.db, user.id).await?.map(Json).ok_or(ApiError::NotFound("User"))
}

async fn google_start(State(s): State<AppState>, jar: CookieJar) -> ApiResult<(CookieJar, Redirect)> {
    let google = s.google.as_ref().ok_or(ApiError::Unavailable("Google sign-in"))?;
    let state: String = rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
    let cookie = Cookie::build((OAUTH_STATE_COOKIE, state.clone())).path("/").http_only(true).same_site(SameSite::Lax).secure(s.config.cookie_secure).build();
    Ok((jar.add(cookie), Redirect::to(&google.authorize_url(&state))))
}

#[derive(Debug, PartialEq, Eq)]
enum GoogleLink { Known(Uuid), ByEmail(Uuid), Create, Refuse }

/// An existing account is only taken over by email when Google vouches for it.
fn google_link(by_google_id: Option<Uuid>, by_email: Option<Uuid>, email_verified: bool) -> GoogleLink {
    match (by_google_id, by_email) {
        (Some(id), _) => GoogleLink::Known(id),
        (None, Some(id)) if email_verified => GoogleLink::ByEmail(id),
        (None, Some(_)) => GoogleLink::Refuse,
        (None, None) => GoogleLink::Create,
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallback { pub code: Option<String>, pub state: Option<String>, pub error: Option<String> }

async fn google_callback(State(s): State<AppState>, jar: CookieJar, Query(q): Query<GoogleCallback>) -> ApiResult<(CookieJar, Redirect)> {
    let google = s.google.as_ref().ok_or(ApiError::Unavailable("Google sign-in"))?;
    let client = s.config.client_url.trim_end_matches('/').to_string();
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path("/").build());
    if let Some(error) = q.error {
        tracing::info!(%error, "google sign-in cancelled");
        return Ok((jar, Redirect::to(&format!("{client}/login?error=google"))));
    }
    let (Some(code), Some(state)) = (q.code, q.state) else { return Err(ApiError::BadRequest("Missing authorization code".to_string())) };
    if expected.as_deref() != Some(state.as_str()) { return Err(ApiError::BadRequest("Sign-in session expired, please try again".to_string())); }

    let profile = google.exchange_code(&code).await.map_err(|e| {
        tracing::warn!(error = %e, "google code exchange failed");
        ApiError::Unauthorized("Google sign-in failed".to_string())
    })?;
    let email = profile.email.trim().to_lowercase();
    let by_google: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE google_id = $1").bind(&profile.sub).fetch_optional(&s.db).await?;
    let by_email: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1").bind(&email).fetch_optional(&s.db).await?;
    let user = match google_link(by_google.map(|(id,)| id), by_email.map(|(id,)| id), profile.email_verified) {
        GoogleLink::Known(id) | GoogleLink::ByEmail(id) => sqlx::query_as::<_, UserRow>("UPDATE users SET google_id = $2, avatar_url = COALESCE(avatar_url, $3), email_verified = email_verified OR $4, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(&profile.sub).bind(&profile.picture).bind(profile.email_verified).fetch_one(&s.db).await?,
        GoogleLink::Refuse => {
            tracing::warn!(email = %otp::mask_target(&email), "google sign-in refused for unverified email");
            return Err(ApiError::Conflict("An account with this email already exists. Sign in with your password instead".to_string()));
        }
        GoogleLink::Create => {
            let name = profile.name.clone().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| email.split('@').next().unwrap_or("Customer").to_string());
            let user = sqlx::query_as::<_, UserRow>("INSERT INTO users (id, name, email, google_id, avatar_url, email_verified) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *")
                .bind(Uuid::now_v7()).bind(name).bind(&email).bind(&profile.sub).bind(&profile.picture).bind(profile.email_verified)
                .fetch_one(&s.db).await.map_err(|e| conflict_on_unique(e, "An account with this email already exists"))?;
            s.events.publish(vec![DomainEvent::User(UserEvent::Registered { user_id: user.id, email: user.email.clone() })]).await;
            user
        }
    };
    tracing::info!(user_id = %user.id, "google sign-in");
    let token = auth::issue_token(&s.config, user.id, role_of(&user))?;
    Ok((jar.add(auth::session_cookie(&s.config, token)), Redirect::to(&format!("{client}/"))))
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest { pub channel: OtpChannel, pub target: Option<String> }

#[derive(Debug, Serialize)]
pub struct SendOtpResponse { pub success: bool, pub message: String, pub expires_in: i64 }

async fn send_otp(State(s): State<AppState>, user: AuthUser, Json(r): Json<SendOtpRequest>) -> ApiResult<Json<SendOtpResponse>> {
    let account = db::find_user(&s.db, user.id).await?.ok_or(ApiError::NotFound("User"))?;
    let target = match r.channel {
        OtpChannel::Email => {
            if account.email_verified { return Err(ApiError::Conflict("Email is already verified".to_string())); }
            account.email.clone()
        }
        OtpChannel::Phone => {
            let raw = r.target.as_deref().or(account.phone.as_deref()).ok_or_else(|| ApiError::BadRequest("Phone number is required".to_string()))?;
            Phone::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?.as_str().to_string()
        }
    };

    let now = Utc::now();
    let last: Option<(chrono::DateTime<Utc>,)> = sqlx::query_as("SELECT created_at FROM otps WHERE user_id = $1 AND channel = $2 ORDER BY created_at DESC LIMIT 1")
        .bind(user.id).bind(r.channel.as_ref()).fetch_optional(&s.db).await?;
    if let Some(wait) = otp::cooldown_remaining(last.map(|(t,)| t), now) {
        return Err(ApiError::BadRequest(format!("Please wait {wait} seconds before requesting a new code")));
    }

    let code = otp::generate_code();
    sqlx::query("INSERT INTO otps (id, user_id, channel, target, code_hash, expires_at) VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(Uuid::now_v7()).bind(user.id).bind(r.channel.as_ref()).bind(&target).bind(otp::hash_code(user.id, &code)?).bind(otp::expires_at(now))
        .execute(&s.db).await?;
    s.notifier.send_otp(r.channel, &target, &code).await?;
    Ok(Json(SendOtpResponse {
        success: true,
        message: format!("Verification code sent to {}", otp::mask_target(&target)),
        expires_in: otp::OTP_TTL_MINUTES * 60,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    pub channel: OtpChannel,
    #[validate(length(equal = 6, message = "Enter the 6 digit code"))]
    pub code: String,
}

async fn verify_otp(State(s): State<AppState>, user: AuthUser, Json(r): Json<VerifyOtpRequest>) -> ApiResult<Json<UserRow>> {
    r.validate()?;
    let pending = sqlx::query_as::<_, OtpRow>("SELECT * FROM otps WHERE user_id = $1 AND channel = $2 AND consumed_at IS NULL ORDER BY created_at DESC LIMIT 1")
        .bind(user.id).bind(r.channel.as_ref()).fetch_optional(&s.db).await?
        .ok_or_else(|| ApiError::BadRequest("No verification code requested".to_string()))?;
    if pending.expires_at <= Utc::now() { return Err(ApiError::BadRequest("Verification code expired, request a new one".to_string())); }
    // spend the attempt before comparing
    let reserved: Option<(i32,)> = sqlx::query_as("UPDATE otps SET attempts = attempts + 1 WHERE id = $1 AND attempts < $2 AND consumed_at IS NULL RETURNING attempts")
        .bind(pending.id).bind(otp::MAX_ATTEMPTS).fetch_optional(&s.db).await?;
    if reserved.is_none() { return Err(ApiError::BadRequest("Too many attempts, request a new code".to_string())); }
    if !otp::code_matches(user.id, &r.code, &pending.code_hash) {
        return Err(ApiError::BadRequest("Incorrect verification code".to_string()));
    }

    let mut tx = s.db.begin().await?;
    let consumed = sqlx::query("UPDATE otps SET consumed_at = NOW() WHERE id = $1 AND consumed_at IS NULL").bind(pending.id).execute(&mut *tx).await?;
    if consumed.rows_affected() == 0 { return Err(ApiError::BadRequest("Verification code already used".to_string())); }
    let updated = match r.channel {
        OtpChannel::Email => sqlx::query_as::<_, UserRow>("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(user.id).fetch_one(&mut *tx).await?,
        OtpChannel::Phone => sqlx::query_as::<_, UserRow>("UPDATE users SET phone = $2, phone_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(user.id).bind(&pending.target).fetch_one(&mut *tx).await?,
    };
    tx.commit().await?;
    tracing::info!(user_id = %user.id, channel = %r.channel, "contact verified");
    if r.channel == OtpChannel::Phone {
        s.events.publish(vec![DomainEvent::User(UserEvent::PhoneVerified { user_id: user.id })]).await;
    }
    Ok(Json(updated))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/otp/send", post(send_otp))
        .route("/auth/otp/verify", post(verify_otp))
}
