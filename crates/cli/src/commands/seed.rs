//! Seed the catalog with demo products.

use ecom24_api::db::{PgStore, Store};
use ecom24_core::{NewProduct, Photo};
use rust_decimal::Decimal;

use super::{CliError, connect};

/// Sample photo served by the image host's public demo account.
const DEMO_PHOTO_URL: &str = "https://res.cloudinary.com/demo/image/upload/sample.jpg";

const CATALOG: &[(&str, &str, i64)] = &[
    ("Wireless Mouse", "electronics", 799),
    ("Mechanical Keyboard", "electronics", 4_499),
    ("Noise Cancelling Headphones", "electronics", 12_999),
    ("Cotton T-Shirt", "clothing", 599),
    ("Denim Jacket", "clothing", 2_499),
    ("Running Shoes", "footwear", 3_999),
    ("Steel Water Bottle", "kitchen", 449),
    ("Ceramic Mug", "kitchen", 299),
    ("Desk Lamp", "home", 1_299),
    ("Paperback Novel", "books", 399),
];

/// Build `count` demo products, cycling through a fixed catalog.
///
/// Repeated entries get a numeric suffix so names stay distinct.
pub fn demo_products(count: u32) -> Vec<NewProduct> {
    (0..count)
        .zip(CATALOG.iter().cycle())
        .map(|(i, (name, category, price))| {
            let round = i / u32::try_from(CATALOG.len()).unwrap_or(u32::MAX);
            let name = if round == 0 {
                (*name).to_owned()
            } else {
                format!("{name} {}", round + 1)
            };
            NewProduct {
                description: format!("Demo listing for {name}."),
                name,
                photos: vec![Photo {
                    public_id: format!("ecom24/demo-{i}"),
                    url: DEMO_PHOTO_URL.to_owned(),
                }],
                price: Decimal::from(*price),
                stock: i32::try_from(5 + (i % 20)).unwrap_or(5),
                category: (*category).to_owned(),
            }
        })
        .collect()
}

/// Insert demo products.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn products(count: u32) -> Result<(), CliError> {
    if count == 0 {
        return Err(CliError::InvalidArgument(
            "count must be at least 1".to_owned(),
        ));
    }
    let store = PgStore::new(connect().await?);

    for product in demo_products(count) {
        let created = store.create_product(product).await?;
        tracing::debug!(product_id = %created.id, name = %created.name, "Seeded product");
    }

    tracing::info!(count, "Seeding complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_products_cycle_with_distinct_names() {
        let products = demo_products(12);
        assert_eq!(products.len(), 12);
        assert_eq!(products.first().map(|p| p.name.as_str()), Some("Wireless Mouse"));
        assert_eq!(
            products.get(10).map(|p| p.name.as_str()),
            Some("Wireless Mouse 2")
        );
    }

    #[test]
    fn test_demo_products_are_valid_listings() {
        for product in demo_products(25) {
            assert_eq!(product.photos.len(), 1);
            assert!(product.stock >= 5);
            assert!(product.price > Decimal::ZERO);
        }
    }
}
