//! Custom hamper builder: eligible products priced at their hamper price.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::auth::AuthUser;
use crate::db;
use crate::domain::aggregates::hamper::MAX_HAMPER_ITEMS;
use crate::domain::aggregates::{Hamper, OrderSource, Product};
use crate::domain::value_objects::{Money, Quantity};
use crate::error::ApiResult;
use crate::state::AppState;
use super::cart::load_product;

#[derive(Debug, Serialize)]
pub struct HamperItemView {
    pub product: Product,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Serialize)]
pub struct HamperView {
    pub items: Vec<HamperItemView>,
    pub total_items: u32,
    pub total_price: Money,
    pub capacity: u32,
}

impl From<&Hamper> for HamperView {
    fn from(h: &Hamper) -> Self {
        Self {
            items: h.items().iter().map(|i| HamperItemView { product: i.product.clone(), quantity: i.quantity, unit_price: i.unit_price(), line_total: i.line_total() }).collect(),
            total_items: h.total_items(),
            total_price: h.total_price(),
            capacity: MAX_HAMPER_ITEMS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToHamperRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: Quantity,
}

fn one() -> Quantity { Quantity::ONE }

#[derive(Debug, Deserialize)]
pub struct UpdateHamperRequest { pub quantity: u32 }

async fn get_hamper(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<HamperView>> {
    let hamper = db::load_hamper(&s.db, user.id).await?;
    Ok(Json(HamperView::from(&hamper)))
}

async fn add_item(State(s): State<AppState>, user: AuthUser, Json(r): Json<AddToHamperRequest>) -> ApiResult<Json<HamperView>> {
    let product = load_product(&s, r.product_id).await?;
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut hamper = db::load_hamper(&mut *tx, user.id).await?;
    let quantity = hamper.add_item(product, r.quantity.value())?;
    db::upsert_hamper_line(&mut *tx, user.id, r.product_id, quantity).await?;
    tx.commit().await?;
    tracing::info!(user_id = %user.id, product_id = %r.product_id, quantity, "hamper item saved");
    Ok(Json(HamperView::from(&hamper)))
}

async fn update_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>, Json(r): Json<UpdateHamperRequest>) -> ApiResult<Json<HamperView>> {
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut hamper = db::load_hamper(&mut *tx, user.id).await?;
    hamper.update_quantity(product_id, r.quantity)?;
    match hamper.quantity_of(product_id) {
        Some(quantity) => db::upsert_hamper_line(&mut *tx, user.id, product_id, quantity).await?,
        None => { sqlx::query("DELETE FROM hamper_items WHERE user_id = $1 AND product_id = $2").bind(user.id).bind(product_id).execute(&mut *tx).await?; }
    }
    tx.commit().await?;
    Ok(Json(HamperView::from(&hamper)))
}

async fn remove_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> ApiResult<Json<HamperView>> {
    let mut tx = s.db.begin().await?;
    db::lock_user(&mut tx, user.id).await?;
    let mut hamper = db::load_hamper(&mut *tx, user.id).await?;
    hamper.remove_item(product_id)?;
    sqlx::query("DELETE FROM hamper_items WHERE user_id = $1 AND product_id = $2").bind(user.id).bind(product_id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(Json(HamperView::from(&hamper)))
}

async fn clear_hamper(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<HamperView>> {
    db::clear_source(&s.db, user.id, OrderSource::Hamper).await?;
    Ok(Json(HamperView::from(&Hamper::new(user.id))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hamper", get(get_hamper).delete(clear_hamper))
        .route("/hamper/add", post(add_item))
        .route("/hamper/:product_id", patch(update_item).delete(remove_item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;

    #[test]
    fn test_view_uses_hamper_prices() {
        let mut hamper = Hamper::new(Uuid::new_v4());
        let p = Product { is_hamper_eligible: true, hamper_price: Some(Money::rupees(180)), ..product(200, 10) };
        hamper.add_item(p, 2).unwrap();
        let view = HamperView::from(&hamper);
        assert_eq!(view.items[0].unit_price, Money::rupees(180));
        assert_eq!(view.total_price, Money::rupees(360));
        assert_eq!(view.capacity, MAX_HAMPER_ITEMS);
    }
}
