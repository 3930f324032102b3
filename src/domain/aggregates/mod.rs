//! Aggregates module
pub mod product;
pub mod cart;
pub mod hamper;
pub mod wishlist;
pub mod coupon;
pub mod order;

pub use product::{Product, ProductError};
pub use cart::{Cart, CartError, CartLine};
pub use hamper::{Hamper, HamperError, HamperItem};
pub use wishlist::Wishlist;
pub use coupon::{Coupon, CouponError, CouponTerms};
pub use order::{Capture, Order, OrderError, OrderLine, OrderSource, OrderStatus, PaymentGateway, PaymentMethod, PaymentStatus, PlaceOrder, ShippingAddress, StoredOrder};
