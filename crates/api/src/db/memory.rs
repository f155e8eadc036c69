//! In-memory [`Store`] used by tests and `STORE_BACKEND=memory` demos.
//!
//! All tables sit behind one `RwLock`, so multi-step writes such as
//! [`Store::place_order`] are atomic with respect to each other.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use ecom24_core::{
    Coupon, CouponId, NewCoupon, NewOrder, NewProduct, NewReview, NewUser, Order, OrderId,
    OrderStatus, Product, ProductId, ProductUpdate, Review, ReviewId, Role, User, UserId,
    normalize_category,
};

use super::{
    Page, PriceSort, ProductFilter, RepositoryError, ReviewSort, SearchPage, Store,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    orders: Vec<Order>,
    coupons: Vec<Coupon>,
    reviews: Vec<Review>,
}

/// A [`Store`] that keeps every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed product, bypassing validation.
    ///
    /// Lets tests seed rows with chosen ids and timestamps.
    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.push(product);
    }

    /// Insert a fully-formed order without touching stock.
    pub async fn insert_order(&self, order: Order) {
        self.tables.write().await.orders.push(order);
    }

    /// Insert a fully-formed user.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.push(user);
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>) {
    rows.reverse();
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.tables.read().await.products.clone())
    }

    async fn search_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<SearchPage, RepositoryError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Product> = tables
            .products
            .iter()
            .filter(|product| filter.matches(product))
            .cloned()
            .collect();
        drop(tables);

        match filter.sort {
            Some(PriceSort::Ascending) => matches.sort_by(|a, b| a.price.cmp(&b.price)),
            Some(PriceSort::Descending) => matches.sort_by(|a, b| b.price.cmp(&a.price)),
            None => {}
        }

        let total_matches = matches.len() as u64;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let products = matches
            .into_iter()
            .skip(skip)
            .take(page.size as usize)
            .collect();

        Ok(SearchPage {
            products,
            total_matches,
        })
    }

    async fn latest_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let mut products = self.tables.read().await.products.clone();
        newest_first(&mut products, |p| p.created_at);
        products.truncate(limit as usize);
        Ok(products)
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read().await;
        let distinct: BTreeSet<&str> = tables
            .products
            .iter()
            .map(|p| p.category.as_str())
            .collect();
        Ok(distinct.into_iter().map(str::to_owned).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::generate(),
            name: product.name,
            photos: product.photos,
            price: product.price,
            stock: product.stock,
            category: normalize_category(&product.category),
            description: product.description,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        Ok(tables.products.len() != before)
    }

    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;

        // Validate every line before touching stock so a failure writes nothing.
        let mut wanted: Vec<(ProductId, i64)> = Vec::new();
        for item in &order.order_items {
            match wanted.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += i64::from(item.quantity),
                None => wanted.push((item.product_id, i64::from(item.quantity))),
            }
        }
        for (id, qty) in &wanted {
            let product = tables
                .products
                .iter()
                .find(|p| p.id == *id)
                .ok_or(RepositoryError::ProductMissing(*id))?;
            if i64::from(product.stock) < *qty {
                return Err(RepositoryError::InsufficientStock(*id));
            }
        }

        let now = Utc::now();
        for (id, qty) in &wanted {
            if let Some(product) = tables.products.iter_mut().find(|p| p.id == *id) {
                // Bounded by the stock check above.
                product.stock -= i32::try_from(*qty).unwrap_or(product.stock);
                product.updated_at = now;
            }
        }

        let order = Order {
            id: OrderId::generate(),
            shipping_info: order.shipping_info,
            user: order.user,
            order_items: order.order_items,
            subtotal: order.subtotal,
            tax: order.tax,
            shipping_charges: order.shipping_charges,
            discount: order.discount,
            total: order.total,
            status: order.status,
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.tables.read().await.orders.clone())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| &o.user == user)
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        Ok(tables.orders.len() != before)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.id == user.id) {
            return Err(RepositoryError::Conflict("user already exists".to_owned()));
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: Role::User,
            gender: user.gender,
            dob: user.dob,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| &u.id != id);
        Ok(tables.users.len() != before)
    }

    async fn set_user_role(&self, id: &UserId, role: Role) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.coupons.iter().any(|c| c.code == coupon.code) {
            return Err(RepositoryError::Conflict(
                "coupon code already exists".to_owned(),
            ));
        }
        let now = Utc::now();
        let coupon = Coupon {
            id: CouponId::generate(),
            code: coupon.code,
            amount: coupon.amount,
            created_at: now,
            updated_at: now,
        };
        tables.coupons.push(coupon.clone());
        Ok(coupon)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError> {
        Ok(self.tables.read().await.coupons.clone())
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let mut tables = self.tables.write().await;
        let position = tables.coupons.iter().position(|c| c.id == id);
        Ok(position.map(|index| tables.coupons.remove(index)))
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables
            .reviews
            .iter()
            .any(|r| r.user == review.user && r.product == review.product)
        {
            return Err(RepositoryError::Conflict(
                "product already reviewed".to_owned(),
            ));
        }
        let now = Utc::now();
        let review = Review {
            id: ReviewId::generate(),
            user: review.user,
            product: review.product,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn find_review(
        &self,
        user: &UserId,
        product: ProductId,
    ) -> Result<Option<Review>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .find(|r| &r.user == user && r.product == product)
            .cloned())
    }

    async fn reviews_for_product(
        &self,
        product: ProductId,
        sort: ReviewSort,
    ) -> Result<Vec<Review>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.product == product)
            .cloned()
            .collect();
        drop(tables);

        newest_first(&mut reviews, |r| r.created_at);
        if sort == ReviewSort::Top {
            reviews.sort_by_key(|r| std::cmp::Reverse(r.rating.get()));
        }
        Ok(reviews)
    }
}
