//! Cache keys and invalidation sets.

use std::fmt;

use ecom24_core::{OrderId, ProductId, UserId};

/// A cacheable read.
///
/// `Display` renders the wire-compatible key names that were used before
/// keys became typed, so log lines and any external tooling stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    LatestProducts,
    Categories,
    AdminProducts,
    Product(ProductId),
    AllOrders,
    MyOrders(UserId),
    Order(OrderId),
    AdminStats,
    AdminPieChart,
    AdminBarChart,
    AdminLineChart,
}

/// Which group of writes makes a key stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDomain {
    Product,
    Order,
    Admin,
}

impl CacheKey {
    #[must_use]
    pub const fn domain(&self) -> CacheDomain {
        match self {
            Self::LatestProducts | Self::Categories | Self::AdminProducts | Self::Product(_) => {
                CacheDomain::Product
            }
            Self::AllOrders | Self::MyOrders(_) | Self::Order(_) => CacheDomain::Order,
            Self::AdminStats | Self::AdminPieChart | Self::AdminBarChart | Self::AdminLineChart => {
                CacheDomain::Admin
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatestProducts => f.write_str("latestProducts"),
            Self::Categories => f.write_str("categories"),
            Self::AdminProducts => f.write_str("adminProducts"),
            Self::Product(id) => write!(f, "product-{id}"),
            Self::AllOrders => f.write_str("allOrders"),
            Self::MyOrders(user) => write!(f, "my-orders-{user}"),
            Self::Order(id) => write!(f, "order-{id}"),
            Self::AdminStats => f.write_str("admin-stats"),
            Self::AdminPieChart => f.write_str("AdminPieChart"),
            Self::AdminBarChart => f.write_str("AdminBarChart"),
            Self::AdminLineChart => f.write_str("AdminLineChart"),
        }
    }
}

impl CacheDomain {
    /// Keys in this domain that do not depend on an entity id.
    #[must_use]
    pub fn collection_keys(self) -> Vec<CacheKey> {
        match self {
            Self::Product => vec![
                CacheKey::LatestProducts,
                CacheKey::Categories,
                CacheKey::AdminProducts,
            ],
            Self::Order => vec![CacheKey::AllOrders],
            Self::Admin => vec![
                CacheKey::AdminStats,
                CacheKey::AdminPieChart,
                CacheKey::AdminBarChart,
                CacheKey::AdminLineChart,
            ],
        }
    }
}

/// The set of cached reads a write makes stale.
///
/// ```
/// use ecom24_api::cache::{CacheKey, Invalidation};
/// use ecom24_core::ProductId;
///
/// let id = ProductId::generate();
/// let keys = Invalidation::new().product().for_product(id).keys();
/// assert!(keys.contains(&CacheKey::LatestProducts));
/// assert!(keys.contains(&CacheKey::Product(id)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub product: bool,
    pub order: bool,
    pub admin: bool,
    pub user_id: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub product_ids: Vec<ProductId>,
}

impl Invalidation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn product(mut self) -> Self {
        self.product = true;
        self
    }

    #[must_use]
    pub const fn order(mut self) -> Self {
        self.order = true;
        self
    }

    #[must_use]
    pub const fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    #[must_use]
    pub fn for_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }

    #[must_use]
    pub const fn for_order(mut self, order: OrderId) -> Self {
        self.order_id = Some(order);
        self
    }

    #[must_use]
    pub fn for_product(mut self, product: ProductId) -> Self {
        self.product_ids.push(product);
        self
    }

    #[must_use]
    pub fn for_products(mut self, products: impl IntoIterator<Item = ProductId>) -> Self {
        self.product_ids.extend(products);
        self
    }

    /// Every key this invalidation evicts.
    ///
    /// Per-entity keys are only produced when their domain flag is set:
    /// product ids need `product`, user and order ids need `order`.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = Vec::new();

        if self.product {
            keys.extend(CacheDomain::Product.collection_keys());
            keys.extend(self.product_ids.iter().copied().map(CacheKey::Product));
        }
        if self.order {
            keys.extend(CacheDomain::Order.collection_keys());
            if let Some(user) = &self.user_id {
                keys.push(CacheKey::MyOrders(user.clone()));
            }
            if let Some(order) = self.order_id {
                keys.push(CacheKey::Order(order));
            }
        }
        if self.admin {
            keys.extend(CacheDomain::Admin.collection_keys());
        }

        keys
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_are_stable() {
        let user = UserId::parse("uid42").unwrap();
        assert_eq!(CacheKey::LatestProducts.to_string(), "latestProducts");
        assert_eq!(CacheKey::MyOrders(user).to_string(), "my-orders-uid42");
        assert_eq!(CacheKey::AdminStats.to_string(), "admin-stats");
        assert_eq!(CacheKey::AdminPieChart.to_string(), "AdminPieChart");
    }

    #[test]
    fn test_order_invalidation_is_scoped_to_user() {
        let buyer = UserId::parse("buyer").unwrap();
        let other = UserId::parse("other").unwrap();
        let order = OrderId::generate();

        let keys = Invalidation::new()
            .order()
            .for_user(buyer.clone())
            .for_order(order)
            .keys();

        assert!(keys.contains(&CacheKey::AllOrders));
        assert!(keys.contains(&CacheKey::MyOrders(buyer)));
        assert!(keys.contains(&CacheKey::Order(order)));
        assert!(!keys.contains(&CacheKey::MyOrders(other)));
        assert!(keys.iter().all(|k| k.domain() == CacheDomain::Order));
    }

    #[test]
    fn test_entity_ids_need_their_domain_flag() {
        let keys = Invalidation::new()
            .admin()
            .for_user(UserId::parse("u").unwrap())
            .for_product(ProductId::generate())
            .keys();

        assert_eq!(keys, CacheDomain::Admin.collection_keys());
    }

    #[test]
    fn test_product_write_evicts_each_product_key() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let keys = Invalidation::new().product().for_products([a, b]).keys();

        assert!(keys.contains(&CacheKey::Categories));
        assert!(keys.contains(&CacheKey::AdminProducts));
        assert!(keys.contains(&CacheKey::Product(a)));
        assert!(keys.contains(&CacheKey::Product(b)));
    }

    #[test]
    fn test_empty_invalidation_has_no_keys() {
        assert!(Invalidation::new().keys().is_empty());
    }
}
