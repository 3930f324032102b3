use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::auth::AuthUser;
use crate::db::{self, ProductRow};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::cart::{load_product, CartView};

#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub products: Vec<ProductRow>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest { pub product_id: Uuid }

#[derive(Debug, Serialize)]
pub struct ToggleResponse { pub product_id: Uuid, pub saved: bool }

async fn view(s: &AppState, user_id: Uuid) -> ApiResult<WishlistView> {
    let products = sqlx::query_as::<_, ProductRow>("SELECT p.* FROM wishlist_items w JOIN products p ON p.id = w.product_id WHERE w.user_id = $1 ORDER BY w.created_at DESC")
        .bind(user_id).fetch_all(&s.db).await?;
    Ok(WishlistView { count: products.len(), products })
}

async fn insert(s: &AppState, user_id: Uuid, product_id: Uuid) -> ApiResult<()> {
    sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING").bind(user_id).bind(product_id).execute(&s.db).await?;
    Ok(())
}

async fn remove(s: &AppState, user_id: Uuid, product_id: Uuid) -> ApiResult<()> {
    sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2").bind(user_id).bind(product_id).execute(&s.db).await?;
    Ok(())
}

async fn get_wishlist(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<WishlistView>> {
    Ok(Json(view(&s, user.id).await?))
}

async fn add(State(s): State<AppState>, user: AuthUser, Json(r): Json<WishlistRequest>) -> ApiResult<Json<WishlistView>> {
    db::find_product(&s.db, r.product_id).await?.ok_or(ApiError::NotFound("Product"))?;
    let mut wishlist = db::load_wishlist(&s.db, user.id).await?;
    if wishlist.add(r.product_id) {
        insert(&s, user.id, r.product_id).await?;
    }
    Ok(Json(view(&s, user.id).await?))
}

async fn remove_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<WishlistView>> {
    let mut wishlist = db::load_wishlist(&s.db, user.id).await?;
    if !wishlist.remove(product_id) { return Err(ApiError::NotFound("Wishlist item")); }
    remove(&s, user.id, product_id).await?;
    Ok(Json(view(&s, user.id).await?))
}

async fn toggle(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<ToggleResponse>> {
    let mut wishlist = db::load_wishlist(&s.db, user.id).await?;
    if !wishlist.contains(product_id) {
        db::find_product(&s.db, product_id).await?.ok_or(ApiError::NotFound("Product"))?;
    }
    let saved = wishlist.toggle(product_id);
    if saved { insert(&s, user.id, product_id).await?; } else { remove(&s, user.id, product_id).await?; }
    Ok(Json(ToggleResponse { product_id, saved }))
}

async fn clear(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<WishlistView>> {
    sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1").bind(user.id).execute(&s.db).await?;
    Ok(Json(WishlistView { products: vec![], count: 0 }))
}

/// Puts one unit in the cart and drops the product from the wishlist.
async fn move_to_cart(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<CartView>> {
    let wishlist = db::load_wishlist(&s.db, user.id).await?;
    if !wishlist.contains(product_id) { return Err(ApiError::NotFound("Wishlist item")); }
    let product = load_product(&s, product_id).await?;

    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut cart = db::load_cart(&mut *tx, user.id).await?;
    let quantity = cart.add_item(product, 1)?;
    db::upsert_cart_line(&mut *tx, user.id, product_id, quantity).await?;
    sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2").bind(user.id).bind(product_id).execute(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, %product_id, "wishlist item moved to cart");
    Ok(Json(CartView::from(&cart)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", post(add).get(get_wishlist).delete(clear))
        .route("/wishlist/:product_id", delete(remove_item))
        .route("/wishlist/:product_id/toggle", post(toggle))
        .route("/wishlist/:product_id/move-to-cart", post(move_to_cart))
}
