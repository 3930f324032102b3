//! Checkout, order history and admin fulfilment.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;
use validator::Validate;
use crate::auth::{AdminUser, AuthUser, Role};
use crate::db::{self, OrderRow};
use crate::domain::aggregates::{Order, OrderLine, OrderSource, OrderStatus, PaymentMethod, PlaceOrder, ShippingAddress};
use crate::domain::pricing::{self, CheckoutQuote};
use crate::domain::value_objects::Money;
use crate::error::{conflict_on_unique, ApiError, ApiResult};
use crate::state::AppState;
use super::coupons::load_coupon;
use super::{ListParams, PaginatedResponse};

fn default_source() -> OrderSource { OrderSource::Cart }

fn unavailable(name: &str, e: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("{name}: {e}"))
}

/// Snapshots the cart or hamper into order lines, refusing anything that can
/// no longer be bought in the requested quantity.
pub(crate) async fn gather_lines(db: impl PgExecutor<'_>, user_id: Uuid, source: OrderSource) -> ApiResult<Vec<OrderLine>> {
    let mut lines = vec![];
    match source {
        OrderSource::Cart => {
            let cart = db::load_cart(db, user_id).await?;
            for l in cart.lines() {
                l.product.ensure_purchasable(l.quantity).map_err(|e| unavailable(&l.product.name, e))?;
                lines.push(OrderLine::new(l.product.id, l.product.name.clone(), l.product.image.clone(), l.product.price, l.quantity));
            }
        }
        OrderSource::Hamper => {
            let hamper = db::load_hamper(db, user_id).await?;
            for i in hamper.items() {
                i.product.ensure_hamper_eligible().map_err(|e| unavailable(&i.product.name, e))?;
                i.product.ensure_purchasable(i.quantity).map_err(|e| unavailable(&i.product.name, e))?;
                lines.push(OrderLine::new(i.product.id, i.product.name.clone(), i.product.image.clone(), i.unit_price(), i.quantity));
            }
        }
    }
    if lines.is_empty() {
        return Err(ApiError::BadRequest(format!("Your {source} is empty")));
    }
    Ok(lines)
}

struct Priced {
    lines: Vec<OrderLine>,
    quote: CheckoutQuote,
    coupon_code: Option<String>,
}

async fn price(s: &AppState, user_id: Uuid, source: OrderSource, method: PaymentMethod, coupon_code: Option<&str>) -> ApiResult<Priced> {
    let lines = gather_lines(&s.db, user_id, source).await?;
    let subtotal = lines.iter().fold(Money::ZERO, |acc, l| acc.add(l.total));
    let (discount, coupon_code) = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let coupon = load_coupon(&s.db, code).await?;
            (coupon.discount_for(subtotal, Utc::now())?, Some(coupon.code().to_string()))
        }
        None => (Money::ZERO, None),
    };
    Ok(Priced { lines, quote: pricing::quote(subtotal, method, discount), coupon_code })
}

fn orders_from(rows: Vec<OrderRow>) -> ApiResult<Vec<Order>> {
    Ok(rows.into_iter().map(Order::try_from).collect::<anyhow::Result<Vec<_>>>()?)
}

/// Reserves stock for an order confirmed before any payment. A shortfall fails
/// the request and the surrounding transaction is rolled back.
pub(crate) async fn reserve_or_refuse(conn: &mut PgConnection, order: &Order) -> ApiResult<()> {
    let short = db::reserve_stock(conn, order).await?;
    if let Some(line) = order.items.iter().find(|l| short.contains(&l.product_id)) {
        return Err(ApiError::Conflict(format!("{} is out of stock", line.name)));
    }
    Ok(())
}

/// Customers only ever see their own orders; admins see all of them.
pub(crate) async fn load_visible_order(db: impl PgExecutor<'_>, user: &AuthUser, id: Uuid) -> ApiResult<Order> {
    let row = db::find_order(db, id).await?.ok_or(ApiError::NotFound("Order"))?;
    if row.user_id != user.id && user.role != Role::Admin {
        return Err(ApiError::NotFound("Order"));
    }
    Ok(Order::try_from(row)?)
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default = "default_source")]
    pub source: OrderSource,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub items: Vec<OrderLine>,
    #[serde(flatten)]
    pub quote: CheckoutQuote,
    pub coupon_code: Option<String>,
}

async fn quote_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<QuoteRequest>) -> ApiResult<Json<QuoteResponse>> {
    let priced = price(&s, user.id, r.source, r.payment_method, r.coupon_code.as_deref()).await?;
    Ok(Json(QuoteResponse { items: priced.lines, quote: priced.quote, coupon_code: priced.coupon_code }))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default = "default_source")]
    pub source: OrderSource,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub coupon_code: Option<String>,
}

async fn checkout(State(s): State<AppState>, user: AuthUser, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    let account = db::find_user(&s.db, user.id).await?.ok_or(ApiError::NotFound("User"))?;
    if !account.phone_verified {
        return Err(ApiError::BadRequest("Please verify your phone number before placing an order".to_string()));
    }

    let priced = price(&s, user.id, r.source, r.payment_method, r.coupon_code.as_deref()).await?;
    let mut order = Order::place(PlaceOrder {
        user_id: user.id, source: r.source, items: priced.lines, quote: priced.quote,
        coupon_code: priced.coupon_code, shipping_address: r.shipping_address, payment_method: r.payment_method,
    })?;

    let mut tx = s.db.begin().await?;
    db::insert_order(&mut *tx, &order).await.map_err(|e| conflict_on_unique(e, "Please retry, order number already taken"))?;
    if !order.is_online() {
        reserve_or_refuse(&mut tx, &order).await?;
        db::apply_confirmation(&mut tx, &order).await?;
    }
    tx.commit().await?;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, user_id = %user.id, total = %order.total, method = %order.payment_method, "order placed");
    s.events.publish(order.take_events()).await;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(State(s): State<AppState>, user: AuthUser, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let (page, per_page, offset) = p.bounds();
    let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(user.id).bind(i64::from(per_page)).bind(offset).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(user.id).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data: orders_from(rows)?, total: total.0, page, per_page }))
}

async fn get_order(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(load_visible_order(&s.db, &user, id).await?))
}

async fn cancel_order(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    let mut tx = s.db.begin().await?;
    let row = db::lock_order(&mut tx, id).await?.filter(|o| o.user_id == user.id).ok_or(ApiError::NotFound("Order"))?;
    let mut order = Order::try_from(row)?;
    let previous = order.status;
    order.cancel_by_customer()?;
    db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
    if previous == OrderStatus::Processing {
        db::restock(&mut tx, &order).await?;
    }
    db::notify(&mut *tx, None, "Order cancelled", &format!("Order {} was cancelled by the customer", order.order_number), "order").await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %user.id, "order cancelled by customer");
    s.events.publish(order.take_events()).await;
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub awb_code: String,
    pub courier_name: Option<String>,
    pub tracking: serde_json::Value,
}

async fn track_order(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<TrackingResponse>> {
    let order = load_visible_order(&s.db, &user, id).await?;
    let awb_code = order.awb_code.ok_or_else(|| ApiError::BadRequest("Order has not been shipped yet".to_string()))?;
    let shiprocket = s.shiprocket.as_ref().ok_or(ApiError::Unavailable("Shipment tracking"))?;
    let tracking = shiprocket.track_awb(&awb_code).await.map_err(|e| ApiError::Gateway(e.to_string()))?;
    Ok(Json(TrackingResponse { awb_code, courier_name: order.courier_name, tracking }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
}

async fn all_orders(State(s): State<AppState>, _admin: AdminUser, Query(q): Query<AdminOrderQuery>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let (page, per_page, offset) = ListParams { page: q.page, per_page: q.per_page }.bounds();
    let status = q.status.map(|st| st.to_string());
    let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(&status).bind(i64::from(per_page)).bind(offset).fetch_all(&s.db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)").bind(&status).fetch_one(&s.db).await?;
    Ok(Json(PaginatedResponse { data: orders_from(rows)?, total: total.0, page, per_page }))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest { pub status: OrderStatus }

async fn update_status(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<StatusRequest>) -> ApiResult<Json<Order>> {
    let mut tx = s.db.begin().await?;
    let row = db::lock_order(&mut tx, id).await?.ok_or(ApiError::NotFound("Order"))?;
    let mut order = Order::try_from(row)?;
    let previous = order.status;
    order.transition(r.status)?;
    db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
    match (previous, r.status) {
        (OrderStatus::Pending, OrderStatus::Processing) => {
            reserve_or_refuse(&mut tx, &order).await?;
            db::apply_confirmation(&mut tx, &order).await?;
        }
        (OrderStatus::Processing, OrderStatus::Cancelled) => db::restock(&mut tx, &order).await?,
        _ => {}
    }
    db::notify(&mut *tx, Some(order.user_id), "Order update", &format!("Your order {} is now {}", order.order_number, order.status), "order").await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, admin_id = %admin.id, from = %previous, to = %order.status, "order status changed");
    s.events.publish(order.take_events()).await;
    Ok(Json(order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShipmentRequest {
    #[validate(length(min = 1, max = 40, message = "AWB code is required"))]
    pub awb_code: String,
    pub courier_name: Option<String>,
}

/// Records the airway bill; a processing order is marked shipped at the same time.
async fn assign_shipment(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ShipmentRequest>) -> ApiResult<Json<Order>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let row = db::lock_order(&mut tx, id).await?.ok_or(ApiError::NotFound("Order"))?;
    let mut order = Order::try_from(row)?;
    let previous = order.status;
    order.assign_shipment(r.awb_code.trim(), r.courier_name.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()))?;
    if order.status == OrderStatus::Processing {
        order.transition(OrderStatus::Shipped)?;
    }
    db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
    db::notify(&mut *tx, Some(order.user_id), "Order shipped", &format!("Your order {} is on its way (AWB {})", order.order_number, r.awb_code.trim()), "shipping").await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, admin_id = %admin.id, awb = %r.awb_code, "shipment assigned");
    s.events.publish(order.take_events()).await;
    Ok(Json(order))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(my_orders))
        .route("/orders/quote", post(quote_order))
        .route("/orders/checkout", post(checkout))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/tracking", get(track_order))
        .route("/admin/orders", get(all_orders))
        .route("/admin/orders/:id/status", patch(update_status))
        .route("/admin/orders/:id/shipment", patch(assign_shipment))
}
