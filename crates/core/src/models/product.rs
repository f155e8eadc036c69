//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// A photo stored with the external image host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    /// Host-side identifier, needed to delete the image later.
    pub public_id: String,
    /// Public HTTPS URL.
    pub url: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub photos: Vec<Photo>,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Minimum number of photos a product must have.
    pub const MIN_PHOTOS: usize = 1;
    /// Maximum number of photos a product may have.
    pub const MAX_PHOTOS: usize = 5;

    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub photos: Vec<Photo>,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub description: String,
}

/// Partial product update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub photos: Option<Vec<Photo>>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl ProductUpdate {
    /// Apply the update to a product in place.
    pub fn apply_to(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(photos) = self.photos {
            product.photos = photos;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = self.category {
            product.category = normalize_category(&category);
        }
        if let Some(description) = self.description {
            product.description = description;
        }
    }
}

/// Categories are stored trimmed and lower-cased so filters match
/// regardless of how an admin typed them.
#[must_use]
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}
