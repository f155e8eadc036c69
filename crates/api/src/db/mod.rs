//! Persistence for the storefront API.
//!
//! The API talks to storage only through the [`Store`] trait so handlers
//! can run against `PostgreSQL` in production and an in-memory store in
//! tests or local demos.
//!
//! ## Tables
//!
//! - `users` - Customers and admins, keyed by the identity provider uid
//! - `products` - Catalog entries with hosted photo references
//! - `orders` - Orders with item and shipping snapshots
//! - `coupons` - Discount codes
//! - `reviews` - One review per (user, product)
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p ecom24-cli -- migrate
//! ```

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use ecom24_core::{
    Coupon, CouponId, NewCoupon, NewOrder, NewProduct, NewReview, NewUser, Order, OrderId,
    OrderStatus, Product, ProductId, ProductUpdate, Review, Role, User, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate coupon code).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// An order line references a product that does not exist.
    #[error("product {0} does not exist")]
    ProductMissing(ProductId),

    /// An order line asks for more units than are in stock.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),
}

/// Price ordering for product search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    Ascending,
    Descending,
}

/// Ordering for a product's review list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    /// Newest first.
    #[default]
    Latest,
    /// Highest rating first, newest first within a rating.
    Top,
}

/// Filters for the public product search.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    /// Inclusive upper price bound.
    pub max_price: Option<Decimal>,
    /// Exact (normalized) category.
    pub category: Option<String>,
    pub sort: Option<PriceSort>,
}

impl ProductFilter {
    /// Whether a product passes every filter that is set.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(search) = &self.search
            && !product
                .name
                .to_lowercase()
                .contains(&search.to_lowercase())
        {
            return false;
        }
        if let Some(max) = self.max_price
            && product.price > max
        {
            return false;
        }
        if let Some(category) = &self.category
            && &product.category != category
        {
            return false;
        }
        true
    }
}

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Build a page, clamping the number and size to at least 1.
    #[must_use]
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

/// One page of search results plus the total match count.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub products: Vec<Product>,
    pub total_matches: u64,
}

/// Storage backend for the storefront.
///
/// Every method is a single logical operation; `place_order` in particular
/// must check and decrement stock atomically with inserting the order.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // Products

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn search_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<SearchPage, RepositoryError>;
    /// The `limit` most recently created products, newest first.
    async fn latest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError>;
    /// Distinct categories, sorted.
    async fn categories(&self) -> Result<Vec<String>, RepositoryError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError>;
    /// Returns `NotFound` if the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError>;
    /// Returns whether a product was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    // Orders

    /// Decrement stock for every line and insert the order, or do nothing.
    ///
    /// Fails with `ProductMissing` or `InsufficientStock` without writing.
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;
    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    /// Returns `NotFound` if the order does not exist.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError>;

    // Users

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    /// Returns `Conflict` if the id or email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError>;
    /// Returns `NotFound` if the user does not exist.
    async fn set_user_role(&self, id: &UserId, role: Role) -> Result<User, RepositoryError>;

    // Coupons

    /// Returns `Conflict` if the code is taken.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError>;
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;
    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError>;
    /// Returns the deleted coupon, if any.
    async fn delete_coupon(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError>;

    // Reviews

    /// Returns `Conflict` if the user already reviewed the product.
    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError>;
    async fn find_review(
        &self,
        user: &UserId,
        product: ProductId,
    ) -> Result<Option<Review>, RepositoryError>;
    async fn reviews_for_product(
        &self,
        product: ProductId,
        sort: ReviewSort,
    ) -> Result<Vec<Review>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
