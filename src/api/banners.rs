use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use crate::auth::AdminUser;
use crate::db::BannerRow;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

async fn list_active(State(s): State<AppState>) -> ApiResult<Json<Vec<BannerRow>>> {
    let banners = sqlx::query_as::<_, BannerRow>("SELECT * FROM banners WHERE is_active ORDER BY position, created_at").fetch_all(&s.db).await?;
    Ok(Json(banners))
}

async fn list_all(State(s): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<BannerRow>>> {
    let banners = sqlx::query_as::<_, BannerRow>("SELECT * FROM banners ORDER BY position, created_at").fetch_all(&s.db).await?;
    Ok(Json(banners))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BannerRequest {
    #[validate(length(min = 1, max = 120, message = "Title is required"))]
    pub title: String,
    pub subtitle: Option<String>,
    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    pub is_active: Option<bool>,
}

async fn create_banner(State(s): State<AppState>, _admin: AdminUser, Json(r): Json<BannerRequest>) -> ApiResult<(StatusCode, Json<BannerRow>)> {
    r.validate()?;
    let b = sqlx::query_as::<_, BannerRow>("INSERT INTO banners (id, title, subtitle, image_url, link_url, position, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *")
        .bind(Uuid::now_v7()).bind(&r.title).bind(&r.subtitle).bind(&r.image_url).bind(&r.link_url).bind(r.position).bind(r.is_active.unwrap_or(true))
        .fetch_one(&s.db).await?;
    Ok((StatusCode::CREATED, Json(b)))
}

async fn update_banner(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>, Json(r): Json<BannerRequest>) -> ApiResult<Json<BannerRow>> {
    r.validate()?;
    let b = sqlx::query_as::<_, BannerRow>("UPDATE banners SET title = $2, subtitle = $3, image_url = $4, link_url = $5, position = $6, is_active = $7, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&r.title).bind(&r.subtitle).bind(&r.image_url).bind(&r.link_url).bind(r.position).bind(r.is_active.unwrap_or(true))
        .fetch_optional(&s.db).await?.ok_or(ApiError::NotFound("Banner"))?;
    Ok(Json(b))
}

async fn delete_banner(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let done = sqlx::query("DELETE FROM banners WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(ApiError::NotFound("Banner")); }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/banners", get(list_active))
        .route("/admin/banners", get(list_all).post(create_banner))
        .route("/admin/banners/:id", put(update_banner).delete(delete_banner))
}
