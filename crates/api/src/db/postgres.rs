//! `PostgreSQL` implementation of [`Store`].
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! internal row types, so the crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use ecom24_core::{
    Coupon, CouponId, Email, NewCoupon, NewOrder, NewProduct, NewReview, NewUser, Order,
    OrderId, OrderItem, OrderStatus, Photo, Product, ProductId, ProductUpdate, Rating, Review,
    ReviewId, Role, ShippingInfo, User, UserId, normalize_category,
};

use super::{
    Page, PriceSort, ProductFilter, RepositoryError, ReviewSort, SearchPage, Store,
};

const PRODUCT_COLUMNS: &str =
    "id, name, photos, price, stock, category, description, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, shipping_info, order_items, subtotal, tax, \
     shipping_charges, discount, total, status, created_at, updated_at";
const UPDATE_PRODUCT: &str = "UPDATE products \
     SET name = COALESCE($2, name), photos = COALESCE($3, photos), \
         price = COALESCE($4, price), stock = COALESCE($5, stock), \
         category = COALESCE($6, category), description = COALESCE($7, description), \
         updated_at = now() \
     WHERE id = $1";
const USER_COLUMNS: &str = "id, name, email, photo, role, gender, dob, created_at, updated_at";
const COUPON_COLUMNS: &str = "id, code, amount, created_at, updated_at";
const REVIEW_COLUMNS: &str = "id, user_id, product_id, rating, comment, created_at, updated_at";

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    photos: Json<Vec<Photo>>,
    price: Decimal,
    stock: i32,
    category: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            photos: row.photos.0,
            price: row.price,
            stock: row.stock,
            category: row.category,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    shipping_info: Json<ShippingInfo>,
    order_items: Json<Vec<OrderItem>>,
    subtotal: Decimal,
    tax: Decimal,
    shipping_charges: Decimal,
    discount: Decimal,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(RepositoryError::DataCorruption)?;
        let user = UserId::parse(&row.user_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order user in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::from_uuid(row.id),
            shipping_info: row.shipping_info.0,
            user,
            order_items: row.order_items.0,
            subtotal: row.subtotal,
            tax: row.tax,
            shipping_charges: row.shipping_charges,
            discount: row.discount,
            total: row.total,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    photo: String,
    role: String,
    gender: String,
    dob: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = UserId::parse(&row.id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid user id in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id,
            name: row.name,
            email,
            photo: row.photo,
            role: row.role.parse().map_err(RepositoryError::DataCorruption)?,
            gender: row.gender.parse().map_err(RepositoryError::DataCorruption)?,
            dob: row.dob,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Internal row type for coupon queries.
#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::from_uuid(row.id),
            code: row.code,
            amount: row.amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for review queries.
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: String,
    product_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::try_from(i64::from(row.rating))
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let user = UserId::parse(&row.user_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid review user in database: {e}"))
        })?;

        Ok(Self {
            id: ReviewId::from_uuid(row.id),
            user,
            product: ProductId::from_uuid(row.product_id),
            rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepositoryError>
where
    T: TryFrom<R, Error = RepositoryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Map a unique-constraint violation to `Conflict`.
fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Escape `LIKE` wildcards so user search text matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_product_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a ProductFilter) {
    builder.push(" WHERE TRUE");
    if let Some(search) = &filter.search {
        builder
            .push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(category) = &filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
}

/// [`Store`] backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    #[instrument(skip(self))]
    async fn search_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<SearchPage, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products"
        ));
        push_product_filters(&mut select, filter);
        select.push(match filter.sort {
            Some(PriceSort::Ascending) => " ORDER BY price ASC, created_at",
            Some(PriceSort::Descending) => " ORDER BY price DESC, created_at",
            None => " ORDER BY created_at",
        });
        select
            .push(" LIMIT ")
            .push_bind(i64::from(page.size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;
        debug!(count = rows.len(), total, "Searched products");

        Ok(SearchPage {
            products: rows.into_iter().map(Product::from).collect(),
            total_matches: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn latest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM products ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO products (id, name, photos, price, stock, category, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(ProductId::generate())
        .bind(&product.name)
        .bind(Json(&product.photos))
        .bind(product.price)
        .bind(product.stock)
        .bind(normalize_category(&product.category))
        .bind(&product.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        // Columns the caller left out keep their current value, so a rename
        // racing an order never restores sold stock.
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "{UPDATE_PRODUCT} RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.photos.as_ref().map(Json))
        .bind(update.price)
        .bind(update.stock)
        .bind(update.category.as_deref().map(normalize_category))
        .bind(update.description.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, order), fields(user = %order.user, items = order.order_items.len()))]
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in &order.order_items {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| RepositoryError::InsufficientStock(item.product_id))?;
            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let exists: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM products WHERE id = $1")
                        .bind(item.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                // Dropping `tx` rolls back the decrements already applied.
                return Err(if exists.is_some() {
                    RepositoryError::InsufficientStock(item.product_id)
                } else {
                    RepositoryError::ProductMissing(item.product_id)
                });
            }
        }

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (id, user_id, shipping_info, order_items, subtotal, tax, \
                 shipping_charges, discount, total, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderId::generate())
        .bind(&order.user)
        .bind(Json(&order.shipping_info))
        .bind(Json(&order.order_items))
        .bind(order.subtotal)
        .bind(order.tax)
        .bind(order.shipping_charges)
        .bind(order.discount)
        .bind(order.total)
        .bind(order.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let ids: Vec<&str> = ids.iter().map(UserId::as_str).collect();
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, photo, role, gender, dob) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.photo)
        .bind(Role::User.to_string())
        .bind(user.gender.to_string())
        .bind(user.dob)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("user or email already exists"))?;
        row.try_into()
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_role(&self, id: &UserId, role: Role) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        let row: CouponRow = sqlx::query_as(&format!(
            "INSERT INTO coupons (id, code, amount) VALUES ($1, $2, $3) \
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(CouponId::generate())
        .bind(&coupon.code)
        .bind(coupon.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?;
        Ok(row.into())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows: Vec<CouponRow> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row: Option<CouponRow> = sqlx::query_as(&format!(
            "DELETE FROM coupons WHERE id = $1 RETURNING {COUPON_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        let row: ReviewRow = sqlx::query_as(&format!(
            "INSERT INTO reviews (id, user_id, product_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(ReviewId::generate())
        .bind(&review.user)
        .bind(review.product)
        .bind(i16::from(review.rating.get()))
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("product already reviewed"))?;
        row.try_into()
    }

    async fn find_review(
        &self,
        user: &UserId,
        product: ProductId,
    ) -> Result<Option<Review>, RepositoryError> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 AND product_id = $2"
        ))
        .bind(user)
        .bind(product)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Review::try_from).transpose()
    }

    async fn reviews_for_product(
        &self,
        product: ProductId,
        sort: ReviewSort,
    ) -> Result<Vec<Review>, RepositoryError> {
        let order_by = match sort {
            ReviewSort::Latest => "created_at DESC",
            ReviewSort::Top => "rating DESC, created_at DESC",
        };
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY {order_by}"
        ))
        .bind(product)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }
}
