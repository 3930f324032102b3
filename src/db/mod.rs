//! Row types and the queries shared between route modules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;
use crate::domain::aggregates::{
    Cart, CartLine, Hamper, HamperItem, Order, OrderLine, OrderSource, Product, ShippingAddress, StoredOrder, Wishlist,
};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub role: String,
    pub default_address: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRow { pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>, pub image_url: Option<String>, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub name: String, pub description: Option<String>,
    pub price: Decimal, pub compare_at_price: Option<Decimal>, pub category_id: Option<Uuid>,
    pub images: Vec<String>, pub stock: i32, pub is_active: bool,
    pub is_hamper_eligible: bool, pub hamper_price: Option<Decimal>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn to_product(&self) -> Product {
        Product {
            id: self.id, name: self.name.clone(), price: Money::new(self.price), hamper_price: self.hamper_price.map(Money::new),
            is_hamper_eligible: self.is_hamper_eligible, is_active: self.is_active, stock: self.stock, image: self.images.first().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BannerRow { pub id: Uuid, pub title: String, pub subtitle: Option<String>, pub image_url: String, pub link_url: Option<String>, pub position: i32, pub is_active: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CouponRow {
    pub id: Uuid, pub code: String, pub description: Option<String>,
    pub discount_percent: Option<Decimal>, pub discount_rupees: Option<Decimal>, pub min_order_amount: Decimal,
    pub max_uses: Option<i32>, pub used_count: i32, pub expires_at: Option<DateTime<Utc>>, pub is_active: bool,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRow { pub id: Uuid, pub user_id: Option<Uuid>, pub title: String, pub message: String, pub kind: String, pub is_read: bool, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRow { pub id: Uuid, pub user_id: Uuid, pub channel: String, pub target: String, pub code_hash: String, pub attempts: i32, pub expires_at: DateTime<Utc>, pub consumed_at: Option<DateTime<Utc>>, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid, pub order_number: String, pub user_id: Uuid, pub source: String,
    pub items: sqlx::types::Json<Vec<OrderLine>>,
    pub subtotal: Decimal, pub discount: Decimal, pub delivery_charge: Decimal, pub total: Decimal,
    pub coupon_code: Option<String>, pub shipping_address: sqlx::types::Json<ShippingAddress>,
    pub payment_method: String, pub payment_gateway: Option<String>,
    pub gateway_order_id: Option<String>, pub gateway_payment_id: Option<String>,
    pub payment_status: String, pub status: String,
    pub awb_code: Option<String>, pub courier_name: Option<String>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(r: OrderRow) -> anyhow::Result<Self> {
        Ok(Order::from(StoredOrder {
            id: r.id, order_number: r.order_number, user_id: r.user_id, source: r.source.parse()?,
            items: r.items.0, subtotal: Money::new(r.subtotal), discount: Money::new(r.discount),
            delivery_charge: Money::new(r.delivery_charge), total: Money::new(r.total), coupon_code: r.coupon_code,
            shipping_address: r.shipping_address.0, payment_method: r.payment_method.parse()?,
            payment_gateway: r.payment_gateway.map(|g| g.parse()).transpose()?,
            gateway_order_id: r.gateway_order_id, gateway_payment_id: r.gateway_payment_id,
            payment_status: r.payment_status.parse()?, status: r.status.parse()?,
            awb_code: r.awb_code, courier_name: r.courier_name, created_at: r.created_at, updated_at: r.updated_at,
        }))
    }
}

/// A cart or hamper line joined with its product.
#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid, name: String, price: Decimal, hamper_price: Option<Decimal>, is_hamper_eligible: bool,
    is_active: bool, stock: i32, image: Option<String>, quantity: i32,
}

impl LineRow {
    fn split(self) -> (Product, u32) {
        let product = Product {
            id: self.id, name: self.name, price: Money::new(self.price), hamper_price: self.hamper_price.map(Money::new),
            is_hamper_eligible: self.is_hamper_eligible, is_active: self.is_active, stock: self.stock, image: self.image,
        };
        (product, self.quantity.max(0) as u32)
    }
}

const LINE_COLUMNS: &str = "p.id, p.name, p.price, p.hamper_price, p.is_hamper_eligible, p.is_active, p.stock, p.images[1] AS image, i.quantity";

pub async fn find_product(db: impl PgExecutor<'_>, id: Uuid) -> sqlx::Result<Option<ProductRow>> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn find_user(db: impl PgExecutor<'_>, id: Uuid) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn load_cart(db: impl PgExecutor<'_>, user_id: Uuid) -> sqlx::Result<Cart> {
    let rows = sqlx::query_as::<_, LineRow>(&format!("SELECT {LINE_COLUMNS} FROM cart_items i JOIN products p ON p.id = i.product_id WHERE i.user_id = $1 ORDER BY i.created_at"))
        .bind(user_id).fetch_all(db).await?;
    let lines = rows.into_iter().map(|r| { let (product, quantity) = r.split(); CartLine { product, quantity } }).collect();
    Ok(Cart::from_lines(user_id, lines))
}

pub async fn load_hamper(db: impl PgExecutor<'_>, user_id: Uuid) -> sqlx::Result<Hamper> {
    let rows = sqlx::query_as::<_, LineRow>(&format!("SELECT {LINE_COLUMNS} FROM hamper_items i JOIN products p ON p.id = i.product_id WHERE i.user_id = $1 ORDER BY i.created_at"))
        .bind(user_id).fetch_all(db).await?;
    let items = rows.into_iter().map(|r| { let (product, quantity) = r.split(); HamperItem { product, quantity } }).collect();
    Ok(Hamper::from_items(user_id, items))
}

pub async fn load_wishlist(db: impl PgExecutor<'_>, user_id: Uuid) -> sqlx::Result<Wishlist> {
    let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY created_at").bind(user_id).fetch_all(db).await?;
    Ok(Wishlist::from_ids(ids.into_iter().map(|(id,)| id).collect()))
}

pub async fn upsert_cart_line(db: impl PgExecutor<'_>, user_id: Uuid, product_id: Uuid, quantity: u32) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity")
        .bind(user_id).bind(product_id).bind(quantity as i32).execute(db).await?;
    Ok(())
}

pub async fn upsert_hamper_line(db: impl PgExecutor<'_>, user_id: Uuid, product_id: Uuid, quantity: u32) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO hamper_items (user_id, product_id, quantity) VALUES ($1, $2, $3) ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity")
        .bind(user_id).bind(product_id).bind(quantity as i32).execute(db).await?;
    Ok(())
}

pub async fn clear_source(db: impl PgExecutor<'_>, user_id: Uuid, source: OrderSource) -> sqlx::Result<()> {
    let sql = match source {
        OrderSource::Cart => "DELETE FROM cart_items WHERE user_id = $1",
        OrderSource::Hamper => "DELETE FROM hamper_items WHERE user_id = $1",
    };
    sqlx::query(sql).bind(user_id).execute(db).await?;
    Ok(())
}

pub async fn find_order(db: impl PgExecutor<'_>, id: Uuid) -> sqlx::Result<Option<OrderRow>> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(db).await
}

/// Loads an order and holds its row lock until the transaction ends.
pub async fn lock_order(conn: &mut PgConnection, id: Uuid) -> sqlx::Result<Option<OrderRow>> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(conn).await
}

pub async fn find_order_by_gateway_id(db: impl PgExecutor<'_>, gateway_order_id: &str) -> sqlx::Result<Option<OrderRow>> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE gateway_order_id = $1").bind(gateway_order_id).fetch_optional(db).await
}

pub async fn insert_order(db: impl PgExecutor<'_>, o: &Order) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO orders (id, order_number, user_id, source, items, subtotal, discount, delivery_charge, total, coupon_code, shipping_address, payment_method, payment_status, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)")
        .bind(o.id).bind(&o.order_number).bind(o.user_id).bind(o.source.as_ref())
        .bind(sqlx::types::Json(&o.items)).bind(o.subtotal.amount()).bind(o.discount.amount())
        .bind(o.delivery_charge.amount()).bind(o.total.amount()).bind(&o.coupon_code)
        .bind(sqlx::types::Json(&o.shipping_address)).bind(o.payment_method.as_ref())
        .bind(o.payment_status.as_ref()).bind(o.status.as_ref()).bind(o.created_at)
        .execute(db).await?;
    Ok(())
}

/// Writes the mutable parts of an order, guarded by the status it was loaded with.
/// Returns `false` when someone else changed the order in between.
pub async fn save_order_state(db: impl PgExecutor<'_>, o: &Order, expected_status: &str) -> sqlx::Result<bool> {
    let done = sqlx::query("UPDATE orders SET status = $2, payment_status = $3, payment_gateway = $4, gateway_order_id = $5, gateway_payment_id = $6, awb_code = $7, courier_name = $8, updated_at = $9, items = $11 WHERE id = $1 AND status = $10")
        .bind(o.id).bind(o.status.as_ref()).bind(o.payment_status.as_ref())
        .bind(o.payment_gateway.map(|g| g.to_string())).bind(&o.gateway_order_id).bind(&o.gateway_payment_id)
        .bind(&o.awb_code).bind(&o.courier_name).bind(o.updated_at).bind(expected_status)
        .bind(sqlx::types::Json(&o.items))
        .execute(db).await?;
    Ok(done.rows_affected() == 1)
}

/// Takes every line's quantity out of stock. Lines the shelf cannot cover are
/// left untouched and their product ids returned.
pub async fn reserve_stock(conn: &mut PgConnection, o: &Order) -> sqlx::Result<Vec<Uuid>> {
    let mut short = vec![];
    for line in o.items.iter().filter(|l| !l.backordered) {
        let done = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
            .bind(line.product_id).bind(line.quantity as i32).execute(&mut *conn).await?;
        if done.rows_affected() == 0 { short.push(line.product_id); }
    }
    Ok(short)
}

/// Side effects of an order becoming confirmed (COD placed or online paid), once
/// stock is reserved: the ordered products leave the basket and the coupon use
/// is counted.
pub async fn apply_confirmation(conn: &mut PgConnection, o: &Order) -> sqlx::Result<()> {
    let table = match o.source {
        OrderSource::Cart => "cart_items",
        OrderSource::Hamper => "hamper_items",
    };
    let ordered: Vec<Uuid> = o.items.iter().map(|l| l.product_id).collect();
    sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1 AND product_id = ANY($2)"))
        .bind(o.user_id).bind(&ordered).execute(&mut *conn).await?;
    if let Some(code) = &o.coupon_code {
        sqlx::query("UPDATE coupons SET used_count = used_count + 1, updated_at = NOW() WHERE code = $1").bind(code).execute(&mut *conn).await?;
    }
    notify(&mut *conn, None, "New order", &format!("Order {} placed for {}", o.order_number, o.total), "order").await?;
    notify(&mut *conn, Some(o.user_id), "Order confirmed", &format!("Your order {} is confirmed", o.order_number), "order").await?;
    Ok(())
}

/// Returns reserved stock when a confirmed order is cancelled. Backordered lines
/// never took anything.
pub async fn restock(conn: &mut PgConnection, o: &Order) -> sqlx::Result<()> {
    for line in o.items.iter().filter(|l| !l.backordered) {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(line.product_id).bind(line.quantity as i32).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Serializes basket writes of one user until the transaction ends.
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))").bind(user_id).execute(conn).await?;
    Ok(())
}

/// `user_id = None` targets the admin feed.
pub async fn notify(db: impl PgExecutor<'_>, user_id: Option<Uuid>, title: &str, message: &str, kind: &str) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO notifications (id, user_id, title, message, kind) VALUES ($1, $2, $3, $4, $5)")
        .bind(Uuid::now_v7()).bind(user_id).bind(title).bind(message).bind(kind).execute(db).await?;
    Ok(())
}
