//! Shopping cart endpoints. Every mutation goes through the `Cart` aggregate
//! and writes back only the line it touched, holding the user's basket lock.

use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::auth::AuthUser;
use crate::db;
use crate::domain::aggregates::{Cart, OrderSource, Product};
use crate::domain::value_objects::{Money, Quantity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_items: u32,
    pub subtotal: Money,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().iter().map(|l| CartItemView { product: l.product.clone(), quantity: l.quantity, line_total: l.line_total() }).collect(),
            total_items: cart.total_items(),
            subtotal: cart.subtotal(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: Quantity,
}

fn one() -> Quantity { Quantity::ONE }

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest { pub quantity: u32 }

#[derive(Debug, Deserialize)]
pub struct MergeRequest { pub items: Vec<AddItemRequest> }

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub cart: CartView,
    /// Products that were dropped because they are inactive or out of stock.
    pub skipped: Vec<Uuid>,
}

pub(crate) async fn load_product(s: &AppState, id: Uuid) -> ApiResult<Product> {
    db::find_product(&s.db, id).await?.map(|p| p.to_product()).ok_or(ApiError::NotFound("Product"))
}

async fn get_cart(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<CartView>> {
    let cart = db::load_cart(&s.db, user.id).await?;
    Ok(Json(CartView::from(&cart)))
}

async fn add_item(State(s): State<AppState>, user: AuthUser, Json(r): Json<AddItemRequest>) -> ApiResult<Json<CartView>> {
    let product = load_product(&s, r.product_id).await?;
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut cart = db::load_cart(&mut *tx, user.id).await?;
    let quantity = cart.add_item(product, r.quantity.value())?;
    db::upsert_cart_line(&mut *tx, user.id, r.product_id, quantity).await?;
    tx.commit().await?;
    tracing::info!(user_id = %user.id, product_id = %r.product_id, quantity, "cart line saved");
    Ok(Json(CartView::from(&cart)))
}

async fn update_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>, Json(r): Json<UpdateQuantityRequest>) -> ApiResult<Json<CartView>> {
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut cart = db::load_cart(&mut *tx, user.id).await?;
    cart.update_quantity(product_id, r.quantity)?;
    match cart.quantity_of(product_id) {
        Some(quantity) => db::upsert_cart_line(&mut *tx, user.id, product_id, quantity).await?,
        None => { sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2").bind(user.id).bind(product_id).execute(&mut *tx).await?; }
    }
    tx.commit().await?;
    Ok(Json(CartView::from(&cart)))
}

async fn remove_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<CartView>> {
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut cart = db::load_cart(&mut *tx, user.id).await?;
    cart.remove_item(product_id)?;
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2").bind(user.id).bind(product_id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(CartView::from(&cart)))
}

async fn clear_cart(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<CartView>> {
    db::clear_source(&s.db, user.id, OrderSource::Cart).await?;
    Ok(Json(CartView::from(&Cart::new(user.id))))
}

/// Folds the cart a visitor built before logging in into their account cart.
async fn merge_cart(State(s): State<AppState>, user: AuthUser, Json(r): Json<MergeRequest>) -> ApiResult<Json<MergeResponse>> {
    let ids: Vec<Uuid> = r.items.iter().map(|i| i.product_id).collect();
    let rows = sqlx::query_as::<_, db::ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(&ids).fetch_all(&s.db).await?;

    let mut skipped = vec![];
    let mut incoming = Vec::with_capacity(r.items.len());
    for item in &r.items {
        match rows.iter().find(|p| p.id == item.product_id) {
            Some(row) => incoming.push((row.to_product(), item.quantity.value())),
            None => skipped.push(item.product_id),
        }
    }

    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut cart = db::load_cart(&mut *tx, user.id).await?;
    let before: Vec<(Uuid, u32)> = cart.lines().iter().map(|l| (l.product.id, l.quantity)).collect();
    skipped.extend(cart.merge(incoming));
    for line in cart.lines() {
        if !before.contains(&(line.product.id, line.quantity)) {
            db::upsert_cart_line(&mut *tx, user.id, line.product.id, line.quantity).await?;
        }
    }
    tx.commit().await?;

    tracing::info!(user_id = %user.id, merged = r.items.len().saturating_sub(skipped.len()), skipped = skipped.len(), "guest cart merged");
    Ok(Json(MergeResponse { cart: CartView::from(&cart), skipped }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", post(add_item).get(get_cart).delete(clear_cart))
        .route("/cart/merge", post(merge_cart))
        .route("/cart/:product_id", patch(update_item).delete(remove_item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;

    #[test]
    fn test_view_totals() {
        let mut cart = Cart::new(Uuid::new_v4());
        cart.add_item(product(250, 10), 2).unwrap();
        cart.add_item(product(99, 10), 1).unwrap();
        let view = CartView::from(&cart);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].line_total, Money::rupees(500));
        assert_eq!(view.total_items, 3);
        assert_eq!(view.subtotal, Money::rupees(599));
    }

    #[test]
    fn test_add_request_defaults_to_one() {
        let r: AddItemRequest = serde_json::from_str(&format!(r#"{{"product_id":"{}"}}"#, Uuid::nil())).unwrap();
        assert_eq!(r.quantity, Quantity::ONE);
    }

    #[test]
    fn test_add_request_rejects_absurd_quantity() {
        let raw = format!(r#"{{"product_id":"{}","quantity":4294967295}}"#, Uuid::nil());
        assert!(serde_json::from_str::<AddItemRequest>(&raw).is_err());
    }
}
