use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;
use crate::auth::AdminUser;
use crate::db::CategoryRow;
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::state::AppState;

/// `"Gift Hampers & Boxes"` becomes `"gift-hampers-boxes"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<CategoryRow>>> {
    let cats = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name").fetch_all(&s.db).await?;
    Ok(Json(cats))
}

/// Accepts either the id or the slug.
async fn get_category(State(s): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<CategoryRow>> {
    let query = match Uuid::parse_str(&key) {
        Ok(id) => sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1").bind(id),
        Err(_) => sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE slug = $1").bind(key.to_lowercase()),
    };
    query.fetch_optional(&s.db).await?.map(Json).ok_or(ApiError::NotFound("Category"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 2, max = 60, message = "Name must be 2-60 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryRequest {
    fn slug(&self) -> ApiResult<String> {
        self.validate()?;
        let slug = slugify(&self.name);
        if slug.is_empty() { return Err(ApiError::BadRequest("Name must contain letters or digits".to_string())); }
        Ok(slug)
    }
}

async fn create_category(State(s): State<AppState>, _admin: AdminUser, Json(r): Json<CategoryRequest>) -> ApiResult<(StatusCode, Json<CategoryRow>)> {
    let slug = r.slug()?;
    let c = sqlx::query_as::<_, CategoryRow>("INSERT INTO categories (id, name, slug, description, image_url) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(Uuid::now_v7()).bind(r.name.trim()).bind(&slug).bind(&r.description).bind(&r.image_url)
        .fetch_one(&s.db).await.map_err(|e| conflict_on_unique(e, "A category with this name already exists"))?;
    Ok((StatusCode::CREATED, Json(c)))
}

async fn update_category(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>, Json(r): Json<CategoryRequest>) -> ApiResult<Json<CategoryRow>> {
    let slug = r.slug()?;
    let c = sqlx::query_as::<_, CategoryRow>("UPDATE categories SET name = $2, slug = $3, description = $4, image_url = $5, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(r.name.trim()).bind(&slug).bind(&r.description).bind(&r.image_url)
        .fetch_optional(&s.db).await.map_err(|e| conflict_on_unique(e, "A category with this name already exists"))?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(Json(c))
}

/// Products in the category stay in the catalog, uncategorised.
async fn delete_category(State(s): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let done = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&s.db).await?;
    if done.rows_affected() == 0 { return Err(ApiError::NotFound("Category")); }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:key", get(get_category).put(update_category).delete(delete_category))
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Gift Hampers & Boxes"), "gift-hampers-boxes");
        assert_eq!(slugify("  Candles!! "), "candles");
        assert_eq!(slugify("--Résin Art--"), "r-sin-art");
        assert_eq!(slugify("!!!"), "");
    }
}
