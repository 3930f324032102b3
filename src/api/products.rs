//! Product catalog: public browsing plus admin management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;
use crate::auth::AdminUser;
use crate::db::{self, ProductRow};
use crate::domain::aggregates::product::validate_pricing;
use crate::domain::value_objects::Money;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::{ListParams, PaginatedResponse};

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Category id or slug.
    pub category: Option<String>,
    pub search: Option<String>,
    pub hamper: Option<bool>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ProductQuery) {
    qb.push(" WHERE p.is_active");
    if let Some(category) = q.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match Uuid::parse_str(category) {
            Ok(id) => { qb.push(" AND p.category_id = ").push_bind(id); }
            Err(_) => { qb.push(" AND p.category_id = (SELECT id FROM categories WHERE slug = ").push_bind(category.to_lowercase()).push(")"); }
        }
    }
    if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND p.name ILIKE ").push_bind(format!("%{}%", search.replace('%', "\\%").replace('_', "\\_")));
    }
    if q.hamper == Some(true) {
        qb.push(" AND p.is_hamper_eligible");
    }
}

async fn list_products(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> ApiResult<Json<PaginatedResponse<ProductRow>>> {
    let (page, per_page, offset) = ListParams { page: q.page, per_page: q.per_page }.bounds();

    let mut qb = QueryBuilder::<Postgres>::new("SELECT p.* FROM products p");
    push_filters(&mut qb, &q);
    qb.push(" ORDER BY p.created_at DESC LIMIT ").push_bind(i64::from(per_page)).push(" OFFSET ").push_bind(offset);
    let products = qb.build_query_as::<ProductRow>().fetch_all(&s.db).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
    push_filters(&mut count, &q);
    let total: (i64,) = count.build_query_as().fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data: products, total: total.0, page, per_page }))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProductRow>> {
    db::find_product(&s.db, id).await?.filter(|p| p.is_active).map(Json).ok_or(ApiError::NotFound("Product"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 2, max = 120, message = "Name must be 2-120 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_hamper_eligible: bool,
    pub hamper_price: Option<Decimal>,
}

impl ProductRequest {
    fn check(&self) -> ApiResult<()> {
        self.validate()?;
        validate_pricing(Money::new(self.price), self.compare_at_price.map(Money::new), self.is_hamper_eligible, self.hamper_price.map(Money::new))?;
        if self.images.iter().any(|url| !url.starts_with("https://")) {
            return Err(ApiError::BadRequest("Image URLs must use https".to_string()));
        }
        Ok(())
    }
}

async fn create_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<ProductRequest>) -> ApiResult<(StatusCode, Json<ProductRow>)> {
    r.check()?;
    let p = sqlx::query_as::<_, ProductRow>("INSERT INTO products (id, name, description, price, compare_at_price, category_id, images, stock, is_active, is_hamper_eligible, hamper_price) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(&r.description).bind(r.price).bind(r.compare_at_price).bind(r.category_id)
        .bind(&r.images).bind(r.stock.unwrap_or(0)).bind(r.is_active.unwrap_or(true)).bind(r.is_hamper_eligible).bind(r.hamper_price)
        .fetch_one(&s.db).await?;
    tracing::info!(product_id = %p.id, admin_id = %admin.id, "product created");
    Ok((StatusCode::CREATED, Json(p)))
}

async fn update_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> ApiResult<Json<ProductRow>> {
    r.check()?;
    let p = sqlx::query_as::<_, ProductRow>("UPDATE products SET name = $2, description = $3, price = $4, compare_at_price = $5, category_id = $6, images = $7, stock = $8, is_active = $9, is_hamper_eligible = $10, hamper_price = $11, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.name.trim()).bind(&r.description).bind(r.price).bind(r.compare_at_price).bind(r.category_id)
        .bind(&r.images).bind(r.stock.unwrap_or(0)).bind(r.is_active.unwrap_or(true)).bind(r.is_hamper_eligible).bind(r.hamper_price)
        .fetch_optional(&s.db).await?.ok_or(ApiError::NotFound("Product"))?;
    tracing::info!(product_id = %p.id, admin_id = %admin.id, "product updated");
    Ok(Json(p))
}

/// Products are deactivated rather than removed so past orders keep their references.
async fn delete_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let done = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(ApiError::NotFound("Product")); }
    tracing::info!(product_id = %id, admin_id = %admin.id, "product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product).delete(delete_product))
}
