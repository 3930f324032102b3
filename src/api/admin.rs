//! Admin dashboard: store statistics and user management.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::auth::{AdminUser, Role};
use crate::db::UserRow;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::{ListParams, PaginatedResponse};

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub orders: i64,
    pub orders_by_status: BTreeMap<String, i64>,
    pub revenue: Decimal,
}

/// Products at or below this stock level count as running low.
const LOW_STOCK: i32 = 5;

async fn stats(State(s): State<AppState>, _admin: AdminUser) -> ApiResult<Json<StoreStats>> {
    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&s.db).await?;
    let (active_products, low_stock_products): (i64, i64) = sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE stock <= $1) FROM products WHERE is_active")
        .bind(LOW_STOCK).fetch_one(&s.db).await?;
    let by_status: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status").fetch_all(&s.db).await?;
    let (revenue,): (Option<Decimal>,) = sqlx::query_as("SELECT SUM(total) FROM orders WHERE payment_status = 'paid'").fetch_one(&s.db).await?;

    Ok(Json(StoreStats {
        users,
        active_products,
        low_stock_products,
        orders: by_status.iter().map(|(_, n)| n).sum(),
        orders_by_status: by_status.into_iter().collect(),
        revenue: revenue.unwrap_or(Decimal::ZERO),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name or email.
    pub search: Option<String>,
}

async fn list_users(State(s): State<AppState>, _admin: AdminUser, Query(q): Query<UserQuery>) -> ApiResult<Json<PaginatedResponse<UserRow>>> {
    let (page, per_page, offset) = ListParams { page: q.page, per_page: q.per_page }.bounds();
    let pattern = q.search.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(|t| format!("%{}%", t.replace('%', "\\%").replace('_', "\\_")));
    let users = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(&pattern).bind(i64::from(per_page)).bind(offset).fetch_all(&s.db).await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)")
        .bind(&pattern).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data: users, total, page, per_page }))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest { pub role: Role }

/// The new role applies from the user's next login.
async fn update_role(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<RoleRequest>) -> ApiResult<Json<UserRow>> {
    if id == admin.id && r.role != Role::Admin {
        return Err(ApiError::BadRequest("You cannot remove your own admin role".to_string()));
    }
    let user = sqlx::query_as::<_, UserRow>("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.role.as_ref())
        .fetch_optional(&s.db).await?
        .ok_or(ApiError::NotFound("User"))?;
    tracing::info!(user_id = %id, admin_id = %admin.id, role = %r.role, "user role changed");
    Ok(Json(user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", patch(update_role))
}
