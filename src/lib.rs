//! TheLoveCraft storefront backend
//!
//! REST API behind the handmade-gifts storefront.
//!
//! ## Features
//! - Product catalog, categories and homepage banners
//! - Per-user cart, wishlist and custom hamper builder
//! - Coupons and checkout pricing (free prepaid delivery from ₹500)
//! - Orders with cash on delivery or Razorpay / Cashfree payments
//! - Email/password, Google sign-in and OTP verification
//! - Shiprocket tracking, Cloudinary uploads, in-app notifications

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod integrations;
pub mod publisher;
pub mod state;

pub use api::router as build_router;
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
