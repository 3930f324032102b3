//! Online payments through Razorpay and Cashfree.
//!
//! Both gateways funnel into [`confirm_payment`] / [`fail_payment`], which lock
//! the order row and are safe to call any number of times for the same order.
//! A failed attempt never closes the order, so a later capture on the same
//! gateway order still confirms it.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::auth::AuthUser;
use crate::db;
use crate::domain::aggregates::{Capture, Order, PaymentGateway};
use crate::error::{ApiError, ApiResult};
use crate::integrations::{cashfree, razorpay};
use crate::state::AppState;

/// Records a verified capture in one transaction. A fresh confirmation reserves
/// stock and applies the confirmation side effects; lines the shelf can no
/// longer cover are backordered for an admin to resolve. A capture that lands on
/// a cancelled order is kept and flagged for refund. Replays change nothing.
pub async fn confirm_payment(s: &AppState, order_id: Uuid, gateway_payment_id: Option<String>) -> ApiResult<Order> {
    let mut tx = s.db.begin().await?;
    let row = db::lock_order(&mut tx, order_id).await?.ok_or(ApiError::NotFound("Order"))?;
    let mut order = Order::try_from(row)?;
    let previous = order.status;
    let capture = order.record_capture(gateway_payment_id);
    match capture {
        Capture::Duplicate => {
            tx.rollback().await?;
            tracing::debug!(order_id = %order.id, "payment already recorded");
            return Ok(order);
        }
        Capture::Confirmed => {
            let short = db::reserve_stock(&mut tx, &order).await?;
            if !short.is_empty() {
                order.mark_backordered(&short);
                let names = order.items.iter().filter(|l| l.backordered).map(|l| l.name.as_str()).collect::<Vec<_>>().join(", ");
                db::notify(&mut *tx, None, "Stock shortfall", &format!("Order {} was paid but is short on: {names}", order.order_number), "stock").await?;
                tracing::warn!(order_id = %order.id, products = ?short, "paid order backordered");
            }
            db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
            db::apply_confirmation(&mut tx, &order).await?;
        }
        Capture::Recorded => {
            db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
        }
        Capture::RefundDue => {
            db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
            let payment = order.gateway_payment_id.as_deref().unwrap_or("unknown payment");
            db::notify(&mut *tx, None, "Refund required", &format!("Order {} was cancelled before its payment ({payment}) arrived", order.order_number), "payment").await?;
            tracing::warn!(order_id = %order.id, payment, "payment captured on cancelled order");
        }
    }
    tx.commit().await?;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, gateway = ?order.payment_gateway, ?capture, "payment recorded");
    s.events.publish(order.take_events()).await;
    Ok(order)
}

/// Records a failed attempt; the order stays open for a retry.
pub async fn fail_payment(s: &AppState, order_id: Uuid) -> ApiResult<Order> {
    let mut tx = s.db.begin().await?;
    let row = db::lock_order(&mut tx, order_id).await?.ok_or(ApiError::NotFound("Order"))?;
    let mut order = Order::try_from(row)?;
    let previous = order.status;
    if !order.record_failed_attempt() {
        tx.rollback().await?;
        return Ok(order);
    }
    db::save_order_state(&mut *tx, &order, previous.as_ref()).await?;
    db::notify(&mut *tx, Some(order.user_id), "Payment failed", &format!("Payment for order {} did not go through. You can try again from your orders.", order.order_number), "payment").await?;
    tx.commit().await?;

    tracing::warn!(order_id = %order.id, order_number = %order.order_number, "payment attempt failed");
    s.events.publish(order.take_events()).await;
    Ok(order)
}

/// Gateways retry on non-2xx, so only server-side failures are surfaced to them.
fn acknowledge(gateway: &'static str, outcome: ApiResult<()>) -> ApiResult<StatusCode> {
    match outcome {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) if !e.status().is_server_error() => {
            tracing::warn!(gateway, error = %e, "webhook acknowledged without changes");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {name} header")))
}

async fn own_order(s: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Order> {
    let row = db::find_order(&s.db, id).await?.filter(|o| o.user_id == user.id).ok_or(ApiError::NotFound("Order"))?;
    let order = Order::try_from(row)?;
    order.ensure_awaiting_payment()?;
    Ok(order)
}

async fn attach(s: &AppState, order: &mut Order, gateway: PaymentGateway, gateway_order_id: String) -> ApiResult<()> {
    let previous = order.status;
    order.attach_gateway(gateway, gateway_order_id);
    if !db::save_order_state(&s.db, order, previous.as_ref()).await? {
        return Err(ApiError::Conflict("Order changed while starting the payment, please retry".to_string()));
    }
    Ok(())
}

/// Gateway order id of a payment already started on `gateway`, reused on retries.
fn started_with(order: &Order, gateway: PaymentGateway) -> Option<String> {
    if order.payment_gateway == Some(gateway) { order.gateway_order_id.clone() } else { None }
}

#[derive(Debug, Deserialize)]
pub struct GatewayOrderRequest { pub order_id: Uuid }

#[derive(Debug, Serialize)]
pub struct RazorpayCheckout {
    pub key_id: String,
    pub razorpay_order_id: String,
    /// In paise.
    pub amount: i64,
    pub currency: &'static str,
    pub order_id: Uuid,
    pub order_number: String,
}

async fn razorpay_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<GatewayOrderRequest>) -> ApiResult<Json<RazorpayCheckout>> {
    let client = s.razorpay.clone().ok_or(ApiError::Unavailable("Razorpay"))?;
    let mut order = own_order(&s, &user, r.order_id).await?;

    let razorpay_order_id = match started_with(&order, PaymentGateway::Razorpay) {
        Some(existing) => existing,
        None => {
            let created = client
                .create_order(order.total.to_paise(), &order.order_number, order.id)
                .await
                .map_err(|e| ApiError::Gateway(e.to_string()))?;
            attach(&s, &mut order, PaymentGateway::Razorpay, created.id.clone()).await?;
            tracing::info!(order_id = %order.id, razorpay_order_id = %created.id, "razorpay order created");
            created.id
        }
    };

    Ok(Json(RazorpayCheckout {
        key_id: client.key_id().to_string(), razorpay_order_id, amount: order.total.to_paise(),
        currency: "INR", order_id: order.id, order_number: order.order_number,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RazorpayVerifyRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

async fn razorpay_verify(State(s): State<AppState>, user: AuthUser, Json(r): Json<RazorpayVerifyRequest>) -> ApiResult<Json<Order>> {
    let client = s.razorpay.clone().ok_or(ApiError::Unavailable("Razorpay"))?;
    if !client.verify_payment_signature(&r.razorpay_order_id, &r.razorpay_payment_id, &r.razorpay_signature) {
        tracing::warn!(user_id = %user.id, razorpay_order_id = %r.razorpay_order_id, "razorpay signature mismatch");
        return Err(ApiError::BadRequest("Payment verification failed".to_string()));
    }
    let row = db::find_order_by_gateway_id(&s.db, &r.razorpay_order_id).await?
        .filter(|o| o.user_id == user.id)
        .ok_or(ApiError::NotFound("Order"))?;
    Ok(Json(confirm_payment(&s, row.id, Some(r.razorpay_payment_id)).await?))
}

async fn razorpay_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<StatusCode> {
    let client = s.razorpay.clone().filter(|c| c.has_webhook_secret()).ok_or(ApiError::Unavailable("Razorpay webhook"))?;
    let signature = header(&headers, "x-razorpay-signature")?;
    if !client.verify_webhook(&body, signature) {
        tracing::warn!("razorpay webhook signature mismatch");
        return Err(ApiError::BadRequest("Invalid webhook signature".to_string()));
    }
    let event: razorpay::WebhookEvent = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Malformed webhook payload".to_string()))?;
    let Some(payment) = event.payload.payment.map(|p| p.entity) else { return Ok(StatusCode::OK) };
    let Some(gateway_order_id) = payment.order_id.as_deref() else { return Ok(StatusCode::OK) };
    let Some(row) = db::find_order_by_gateway_id(&s.db, gateway_order_id).await? else {
        tracing::warn!(gateway_order_id, "razorpay webhook for unknown order");
        return Ok(StatusCode::OK);
    };

    tracing::info!(event = %event.event, order_id = %row.id, "razorpay webhook received");
    let outcome = match event.event.as_str() {
        "payment.captured" | "order.paid" => confirm_payment(&s, row.id, Some(payment.id)).await.map(|_| ()),
        "payment.failed" => fail_payment(&s, row.id).await.map(|_| ()),
        _ => Ok(()),
    };
    acknowledge("razorpay", outcome)
}

#[derive(Debug, Serialize)]
pub struct CashfreeCheckout {
    pub payment_session_id: String,
    pub cf_order_id: String,
    pub order_id: Uuid,
    pub order_number: String,
}

async fn cashfree_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<GatewayOrderRequest>) -> ApiResult<Json<CashfreeCheckout>> {
    let client = s.cashfree.clone().ok_or(ApiError::Unavailable("Cashfree"))?;
    let mut order = own_order(&s, &user, r.order_id).await?;

    let cf_order = match started_with(&order, PaymentGateway::Cashfree) {
        Some(existing) => client.get_order(&existing).await,
        None => {
            let account = db::find_user(&s.db, user.id).await?.ok_or(ApiError::NotFound("User"))?;
            let customer = cashfree::CustomerDetails {
                customer_id: user.id.simple().to_string(),
                customer_email: account.email,
                customer_phone: account.phone.unwrap_or_else(|| order.shipping_address.phone.clone()),
                customer_name: account.name,
            };
            let return_url = format!("{}/payment/status?order_id={{order_id}}", s.config.client_url.trim_end_matches('/'));
            client.create_order(&order.order_number, order.total, customer, return_url).await
        }
    }
    .map_err(|e| ApiError::Gateway(e.to_string()))?;

    if order.gateway_order_id.as_deref() != Some(cf_order.order_id.as_str()) {
        attach(&s, &mut order, PaymentGateway::Cashfree, cf_order.order_id.clone()).await?;
        tracing::info!(order_id = %order.id, cf_order_id = %cf_order.order_id, "cashfree order created");
    }
    let payment_session_id = cf_order.payment_session_id.ok_or_else(|| ApiError::Gateway("Cashfree did not return a payment session".to_string()))?;
    Ok(Json(CashfreeCheckout { payment_session_id, cf_order_id: cf_order.order_id, order_id: order.id, order_number: order.order_number }))
}

/// Polls Cashfree after the customer returns from checkout. Accepts the store
/// order id or the order number Cashfree knows the order by.
async fn cashfree_verify(State(s): State<AppState>, user: AuthUser, Path(key): Path<String>) -> ApiResult<Json<Order>> {
    let client = s.cashfree.clone().ok_or(ApiError::Unavailable("Cashfree"))?;
    let row = match Uuid::parse_str(&key) {
        Ok(id) => db::find_order(&s.db, id).await?,
        Err(_) => db::find_order_by_gateway_id(&s.db, &key).await?,
    }
    .filter(|o| o.user_id == user.id)
    .ok_or(ApiError::NotFound("Order"))?;
    let gateway_order_id = row.gateway_order_id.clone().ok_or_else(|| ApiError::BadRequest("No Cashfree payment was started for this order".to_string()))?;

    let cf_order = client.get_order(&gateway_order_id).await.map_err(|e| ApiError::Gateway(e.to_string()))?;
    let order = if cf_order.is_paid() {
        confirm_payment(&s, row.id, None).await?
    } else if cf_order.is_terminal_failure() {
        fail_payment(&s, row.id).await?
    } else {
        Order::try_from(row)?
    };
    Ok(Json(order))
}

async fn cashfree_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<StatusCode> {
    let client = s.cashfree.clone().ok_or(ApiError::Unavailable("Cashfree"))?;
    let timestamp = header(&headers, "x-webhook-timestamp")?;
    let signature = header(&headers, "x-webhook-signature")?;
    if !client.verify_webhook(timestamp, &body, signature) {
        tracing::warn!("cashfree webhook signature mismatch");
        return Err(ApiError::BadRequest("Invalid webhook signature".to_string()));
    }
    let event: cashfree::WebhookEvent = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Malformed webhook payload".to_string()))?;
    let Some(row) = db::find_order_by_gateway_id(&s.db, &event.data.order.order_id).await? else {
        tracing::warn!(cf_order_id = %event.data.order.order_id, "cashfree webhook for unknown order");
        return Ok(StatusCode::OK);
    };

    tracing::info!(kind = %event.kind, order_id = %row.id, "cashfree webhook received");
    let Some(payment) = event.data.payment else { return Ok(StatusCode::OK) };
    let payment_id = payment.cf_payment_id.map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });
    let outcome = match payment.payment_status.as_str() {
        "SUCCESS" => confirm_payment(&s, row.id, payment_id).await.map(|_| ()),
        "FAILED" | "USER_DROPPED" | "CANCELLED" => fail_payment(&s, row.id).await.map(|_| ()),
        _ => Ok(()),
    };
    acknowledge("cashfree", outcome)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/razorpay/order", post(razorpay_order))
        .route("/payments/razorpay/verify", post(razorpay_verify))
        .route("/payments/razorpay/webhook", post(razorpay_webhook))
        .route("/payments/cashfree/order", post(cashfree_order))
        .route("/payments/cashfree/verify/:order_id", get(cashfree_verify))
        .route("/payments/cashfree/webhook", post(cashfree_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledge_swallows_domain_conflicts() {
        assert_eq!(acknowledge("razorpay", Ok(())).unwrap(), StatusCode::OK);
        assert_eq!(acknowledge("razorpay", Err(ApiError::Conflict("already cancelled".into()))).unwrap(), StatusCode::OK);
        let err = acknowledge("razorpay", Err(ApiError::Internal(anyhow::anyhow!("db down")))).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_header_is_bad_request() {
        let headers = HeaderMap::new();
        let err = header(&headers, "x-razorpay-signature").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
