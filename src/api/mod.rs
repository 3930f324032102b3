//! REST routes, mounted under `/api/v1`.

pub mod admin;
pub mod auth;
pub mod banners;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod hamper;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod uploads;
pub mod users;
pub mod wishlist;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

impl ListParams {
    /// `(page, per_page, offset)` with page >= 1 and per_page in 1..=100.
    pub fn bounds(&self) -> (u32, u32, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page, i64::from(page - 1) * i64::from(per_page))
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

#[derive(Debug, Serialize)]
pub struct Message { pub success: bool, pub message: String }

impl Message {
    pub fn ok(message: impl Into<String>) -> Json<Message> { Json(Message { success: true, message: message.into() }) }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(banners::router())
        .merge(cart::router())
        .merge(wishlist::router())
        .merge(hamper::router())
        .merge(coupons::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(notifications::router())
        .merge(admin::router())
        .merge(uploads::router());

    let cors = cors_layer(&state.config.client_url);
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "lovecraft-commerce"})) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Credentialed CORS for the storefront origin; falls back to an open, cookie-less policy.
fn cors_layer(client_url: &str) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE];
    match client_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(_) => {
            tracing::warn!(client_url, "CLIENT_URL is not a valid origin, using permissive CORS");
            CorsLayer::new().allow_origin(Any).allow_methods(methods).allow_headers(Any)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_bounds() {
        assert_eq!(ListParams::default().bounds(), (1, 20, 0));
        assert_eq!(ListParams { page: Some(3), per_page: Some(500) }.bounds(), (3, 100, 200));
        assert_eq!(ListParams { page: Some(0), per_page: Some(0) }.bounds(), (1, 1, 0));
    }
}
