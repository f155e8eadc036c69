//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::db::Store;
use crate::services::media::ImageHost;
use crate::services::payments::PaymentGateway;

/// Number of products returned by the latest-products endpoint.
pub const LATEST_PRODUCTS_LIMIT: u32 = 5;

/// Tunables that handlers read at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// Page size for product search.
    pub products_per_page: u32,
    /// ISO currency code sent with payment intents.
    pub payment_currency: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            products_per_page: 8,
            payment_currency: "inr".to_owned(),
        }
    }
}

/// The collaborators the API runs against.
///
/// Production wires `PgStore`, `MokaCache`, `StripeClient` and
/// `CloudinaryClient`; tests swap in the memory store and fakes.
pub struct Backends {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn CacheStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub media: Arc<dyn ImageHost>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: AppSettings,
    backends: Backends,
}

impl AppState {
    #[must_use]
    pub fn new(backends: Backends, settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(AppStateInner { settings, backends }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.backends.store.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &dyn CacheStore {
        self.inner.backends.cache.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.backends.payments.as_ref()
    }

    #[must_use]
    pub fn media(&self) -> &dyn ImageHost {
        self.inner.backends.media.as_ref()
    }
}
