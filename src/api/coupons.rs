use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use crate::auth::{AdminUser, AuthUser};
use crate::db::CouponRow;
use crate::domain::aggregates::coupon::normalize_code;
use crate::domain::aggregates::{Coupon, CouponTerms};
use crate::domain::value_objects::Money;
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::state::AppState;

impl CouponRow {
    pub fn to_coupon(&self) -> ApiResult<Coupon> {
        let terms = CouponTerms {
            code: self.code.clone(),
            discount_percent: self.discount_percent,
            discount_rupees: self.discount_rupees.map(Money::new),
            min_order_amount: Money::new(self.min_order_amount),
            max_uses: self.max_uses.map(|m| u32::try_from(m).unwrap_or(0)),
            expires_at: self.expires_at,
            is_active: self.is_active,
        };
        Ok(Coupon::restore(terms, self.used_count.max(0) as u32)?)
    }
}

/// Looks a coupon up by code, case-insensitively.
pub async fn load_coupon(db: impl PgExecutor<'_>, code: &str) -> ApiResult<Coupon> {
    let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
        .bind(normalize_code(code)).fetch_optional(db).await?
        .ok_or(ApiError::NotFound("Coupon"))?;
    row.to_coupon()
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
    pub description: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub discount_rupees: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_uses: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponRequest {
    /// `max_uses` as stored in the `INTEGER` column.
    fn max_uses_column(&self) -> ApiResult<Option<i32>> {
        self.max_uses
            .map(i32::try_from)
            .transpose()
            .map_err(|_| ApiError::BadRequest(format!("Usage limit cannot exceed {}", i32::MAX)))
    }

    fn to_coupon(&self) -> ApiResult<Coupon> {
        if self.min_order_amount.is_sign_negative() {
            return Err(ApiError::BadRequest("Minimum order amount cannot be negative".to_string()));
        }
        Ok(Coupon::new(CouponTerms {
            code: self.code.clone(),
            discount_percent: self.discount_percent,
            discount_rupees: self.discount_rupees.map(Money::new),
            min_order_amount: Money::new(self.min_order_amount),
            max_uses: self.max_uses,
            expires_at: self.expires_at,
            is_active: self.is_active.unwrap_or(true),
        })?)
    }
}

async fn list_coupons(State(s): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<CouponRow>>> {
    let coupons = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC").fetch_all(&s.db).await?;
    Ok(Json(coupons))
}

async fn create_coupon(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<CouponRequest>) -> ApiResult<(StatusCode, Json<CouponRow>)> {
    let coupon = r.to_coupon()?;
    let max_uses = r.max_uses_column()?;
    let row = sqlx::query_as::<_, CouponRow>("INSERT INTO coupons (id, code, description, discount_percent, discount_rupees, min_order_amount, max_uses, expires_at, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *")
        .bind(Uuid::now_v7()).bind(coupon.code()).bind(&r.description).bind(r.discount_percent).bind(r.discount_rupees)
        .bind(r.min_order_amount).bind(max_uses).bind(r.expires_at).bind(r.is_active.unwrap_or(true))
        .fetch_one(&s.db).await.map_err(|e| conflict_on_unique(e, "Coupon code already exists"))?;
    tracing::info!(code = %row.code, admin_id = %admin.id, "coupon created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_coupon(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<CouponRequest>) -> ApiResult<Json<CouponRow>> {
    let coupon = r.to_coupon()?;
    let max_uses = r.max_uses_column()?;
    let row = sqlx::query_as::<_, CouponRow>("UPDATE coupons SET code = $2, description = $3, discount_percent = $4, discount_rupees = $5, min_order_amount = $6, max_uses = $7, expires_at = $8, is_active = $9, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(coupon.code()).bind(&r.description).bind(r.discount_percent).bind(r.discount_rupees)
        .bind(r.min_order_amount).bind(max_uses).bind(r.expires_at).bind(r.is_active.unwrap_or(true))
        .fetch_optional(&s.db).await.map_err(|e| conflict_on_unique(e, "Coupon code already exists"))?
        .ok_or(ApiError::NotFound("Coupon"))?;
    tracing::info!(code = %row.code, admin_id = %admin.id, "coupon updated");
    Ok(Json(row))
}

async fn delete_coupon(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let done = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(ApiError::NotFound("Coupon")); }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest { pub code: String, pub subtotal: Decimal }

#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse { pub code: String, pub discount: Money, pub subtotal_after_discount: Money }

async fn validate_coupon(State(s): State<AppState>, _user: AuthUser, Json(r): Json<ValidateCouponRequest>) -> ApiResult<Json<ValidateCouponResponse>> {
    let coupon = load_coupon(&s.db, &r.code).await?;
    let subtotal = Money::new(r.subtotal);
    let discount = coupon.discount_for(subtotal, Utc::now())?;
    Ok(Json(ValidateCouponResponse { code: coupon.code().to_string(), discount, subtotal_after_discount: subtotal.subtract(discount) }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons/validate", post(validate_coupon))
        .route("/admin/coupons", get(list_coupons).post(create_coupon))
        .route("/admin/coupons/:id", put(update_coupon).delete(delete_coupon))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CouponRequest {
        CouponRequest {
            code: " diwali25 ".into(), description: None, discount_percent: Some(Decimal::new(25, 0)), discount_rupees: None,
            min_order_amount: Decimal::new(999, 0), max_uses: Some(100), expires_at: None, is_active: None,
        }
    }

    #[test]
    fn test_request_builds_normalized_coupon() {
        let coupon = request().to_coupon().unwrap();
        assert_eq!(coupon.code(), "DIWALI25");
        assert_eq!(coupon.discount_for(Money::rupees(1000), Utc::now()).unwrap(), Money::rupees(250));
    }

    #[test]
    fn test_negative_minimum_rejected() {
        let err = CouponRequest { min_order_amount: Decimal::new(-1, 0), ..request() }.to_coupon().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_usage_limit_must_fit_column() {
        assert_eq!(request().max_uses_column().unwrap(), Some(100));
        assert_eq!(CouponRequest { max_uses: None, ..request() }.max_uses_column().unwrap(), None);
        let err = CouponRequest { max_uses: Some(u32::MAX), ..request() }.max_uses_column().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
