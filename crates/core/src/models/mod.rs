//! Persisted entity records.
//!
//! Each entity comes with a `New*` input type used when creating it. IDs and
//! timestamps are assigned by the store, never by callers.

pub mod coupon;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use coupon::{Coupon, NewCoupon};
pub use order::{NewOrder, Order, OrderItem, ShippingInfo};
pub use product::{NewProduct, Photo, Product, ProductUpdate, normalize_category};
pub use review::{NewReview, Rating, RatingError, Review};
pub use user::{NewUser, User};
