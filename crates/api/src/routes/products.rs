//! Catalog route handlers.

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use ecom24_core::{NewProduct, Photo, Product, ProductId, ProductUpdate};

use super::{ApiQuery, Envelope, NoData, created, non_empty, ok, parse_id};
use crate::cache::{CacheKey, Invalidation, invalidate, read_through};
use crate::db::{Page, PriceSort, ProductFilter};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::media::Upload;
use crate::state::{AppState, LATEST_PRODUCTS_LIMIT};

/// Multipart limit for product forms: five photos plus text fields.
const PRODUCT_FORM_LIMIT: usize = 25 * 1024 * 1024;

/// Create the product routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/all", get(search))
        .route("/latest", get(latest))
        .route("/categories", get(categories))
        .route("/admin-products", get(admin_products))
        .route("/new", post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .layer(DefaultBodyLimit::max(PRODUCT_FORM_LIMIT))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub total_page: u64,
    pub current_page: u32,
    pub total_items: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ProductsBody {
    pub count: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesBody {
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

impl SearchQuery {
    fn filter(self) -> Result<(ProductFilter, u32)> {
        let max_price = non_empty(self.price)
            .map(|raw| {
                Decimal::from_str(&raw)
                    .map_err(|_| AppError::BadRequest(format!("Invalid price: {raw}")))
            })
            .transpose()?;
        let sort = match non_empty(self.sort).as_deref() {
            Some("asc") => Some(PriceSort::Ascending),
            Some("desc") => Some(PriceSort::Descending),
            _ => None,
        };
        // Unparseable pages fall back to the first page.
        let page = non_empty(self.page)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(1);

        let filter = ProductFilter {
            search: non_empty(self.search),
            max_price,
            category: non_empty(self.category),
            sort,
        };
        Ok((filter, page))
    }
}

fn page_count(total_matches: u64, page_size: u32) -> u64 {
    total_matches.div_ceil(u64::from(page_size.max(1)))
}

/// Search products by name, max price and category, one page at a time.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Envelope<SearchBody>>> {
    let (filter, page_number) = query.filter()?;
    let page = Page::new(page_number, state.settings().products_per_page);
    let result = state.store().search_products(&filter, page).await?;

    Ok(ok(
        "Search Products Data Fetch Successfully",
        SearchBody {
            total_page: page_count(result.total_matches, page.size),
            current_page: page.number,
            total_items: result.products.len(),
            products: result.products,
        },
    ))
}

pub async fn latest(State(state): State<AppState>) -> Result<Json<Envelope<ProductsBody>>> {
    let products = read_through(state.cache(), CacheKey::LatestProducts, || {
        state.store().latest_products(LATEST_PRODUCTS_LIMIT)
    })
    .await?;

    Ok(ok(
        "Latest product fetched successfully",
        ProductsBody {
            count: products.len(),
            products,
        },
    ))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Envelope<CategoriesBody>>> {
    let categories = read_through(state.cache(), CacheKey::Categories, || {
        state.store().categories()
    })
    .await?;

    Ok(ok(
        "Categories Fetched Successfully",
        CategoriesBody { categories },
    ))
}

pub async fn admin_products(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ProductsBody>>> {
    let products = read_through(state.cache(), CacheKey::AdminProducts, || {
        state.store().list_products()
    })
    .await?;

    Ok(ok(
        "Products Fetched Successfully",
        ProductsBody {
            count: products.len(),
            products,
        },
    ))
}

async fn find_product(state: &AppState, id: ProductId) -> Result<Product> {
    state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product with id:{id} not found!")))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ProductBody>>> {
    let id: ProductId = parse_id(&id)?;
    let product = read_through(state.cache(), CacheKey::Product(id), || {
        find_product(&state, id)
    })
    .await?;

    Ok(ok(
        "Product Details Fetch Successfully",
        ProductBody { product },
    ))
}

/// Text fields and photo files from a product form.
#[derive(Debug, Default)]
struct ProductForm {
    name: Option<String>,
    price: Option<String>,
    stock: Option<String>,
    category: Option<String>,
    description: Option<String>,
    photos: Vec<Upload>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "photos" {
                let file_name = field.file_name().unwrap_or("photo").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if !bytes.is_empty() {
                    form.photos.push(Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let slot = match name.as_str() {
                "name" => &mut form.name,
                "price" => &mut form.price,
                "stock" => &mut form.stock,
                "category" => &mut form.category,
                "description" => &mut form.description,
                _ => continue,
            };
            *slot = non_empty(Some(value));
        }
        Ok(form)
    }

    fn check_photo_count(&self, required: bool) -> Result<()> {
        if required && self.photos.len() < Product::MIN_PHOTOS {
            return Err(AppError::BadRequest(
                "Please add at least one product photo".to_owned(),
            ));
        }
        if self.photos.len() > Product::MAX_PHOTOS {
            return Err(AppError::BadRequest(format!(
                "You can upload only {} Photos",
                Product::MAX_PHOTOS
            )));
        }
        Ok(())
    }
}

fn parse_price(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .ok()
        .filter(|price| *price >= Decimal::ZERO)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid price: {raw}")))
}

fn parse_stock(raw: &str) -> Result<i32> {
    raw.parse::<i32>()
        .ok()
        .filter(|stock| *stock >= 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid stock: {raw}")))
}

/// Delete hosted photos, logging instead of failing.
async fn discard_photos(state: &AppState, photos: &[Photo]) {
    if photos.is_empty() {
        return;
    }
    let ids: Vec<String> = photos.iter().map(|p| p.public_id.clone()).collect();
    if let Err(e) = state.media().delete(&ids).await {
        warn!(error = %e, count = ids.len(), "Failed to delete hosted photos");
    }
}

pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<NoData>>)> {
    let form = ProductForm::read(multipart).await?;
    form.check_photo_count(true)?;

    let (Some(name), Some(price), Some(stock), Some(category), Some(description)) = (
        form.name,
        form.price,
        form.stock,
        form.category,
        form.description,
    ) else {
        return Err(AppError::BadRequest("Please enter all fields".to_owned()));
    };
    let price = parse_price(&price)?;
    let stock = parse_stock(&stock)?;

    let photos = state.media().upload(&form.photos).await?;
    let product = match state
        .store()
        .create_product(NewProduct {
            name,
            photos: photos.clone(),
            price,
            stock,
            category,
            description,
        })
        .await
    {
        Ok(product) => product,
        Err(e) => {
            discard_photos(&state, &photos).await;
            return Err(e.into());
        }
    };

    invalidate(state.cache(), &Invalidation::new().product().admin()).await;
    info!(product_id = %product.id, "Product created");

    Ok(created("Product created successfully", NoData {}))
}

pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Envelope<ProductBody>>> {
    let id: ProductId = parse_id(&id)?;
    let form = ProductForm::read(multipart).await?;
    form.check_photo_count(false)?;
    let existing = find_product(&state, id).await?;

    let mut update = ProductUpdate {
        name: form.name,
        price: form.price.as_deref().map(parse_price).transpose()?,
        stock: form.stock.as_deref().map(parse_stock).transpose()?,
        category: form.category,
        description: form.description,
        photos: None,
    };

    let uploaded = if form.photos.is_empty() {
        Vec::new()
    } else {
        state.media().upload(&form.photos).await?
    };
    if !uploaded.is_empty() {
        update.photos = Some(uploaded.clone());
    }

    // Old photos go only once the row points at the new ones.
    let product = match state.store().update_product(id, update).await {
        Ok(product) => product,
        Err(e) => {
            discard_photos(&state, &uploaded).await;
            return Err(e.into());
        }
    };
    if !uploaded.is_empty() {
        discard_photos(&state, &existing.photos).await;
    }

    invalidate(
        state.cache(),
        &Invalidation::new().product().admin().for_product(id),
    )
    .await;
    info!(product_id = %id, "Product updated");

    Ok(ok("Product updated successfully", ProductBody { product }))
}

pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<NoData>>> {
    let id: ProductId = parse_id(&id)?;
    let product = find_product(&state, id).await?;

    if !state.store().delete_product(id).await? {
        return Err(AppError::NotFound(format!("Product with id:{id} not found!")));
    }
    discard_photos(&state, &product.photos).await;

    invalidate(
        state.cache(),
        &Invalidation::new().product().admin().for_product(id),
    )
    .await;
    info!(product_id = %id, "Product deleted");

    Ok(ok(format!("Product with id:{id} deleted successfully"), NoData {}))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> SearchQuery {
        let mut q = SearchQuery {
            search: None,
            price: None,
            category: None,
            sort: None,
            page: None,
        };
        for (key, value) in pairs {
            let value = Some((*value).to_owned());
            match *key {
                "search" => q.search = value,
                "price" => q.price = value,
                "category" => q.category = value,
                "sort" => q.sort = value,
                "page" => q.page = value,
                _ => {}
            }
        }
        q
    }

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(page_count(0, 8), 0);
        assert_eq!(page_count(8, 8), 1);
        assert_eq!(page_count(9, 8), 2);
    }

    #[test]
    fn test_search_query_defaults() {
        let (filter, page) = query(&[]).filter().unwrap();
        assert_eq!(page, 1);
        assert!(filter.search.is_none());
        assert!(filter.sort.is_none());
    }

    #[test]
    fn test_search_query_parses_fields() {
        let (filter, page) = query(&[
            ("search", "lamp"),
            ("price", "499.50"),
            ("category", "decor"),
            ("sort", "desc"),
            ("page", "3"),
        ])
        .filter()
        .unwrap();
        assert_eq!(page, 3);
        assert_eq!(filter.search.as_deref(), Some("lamp"));
        assert_eq!(filter.max_price, Some(Decimal::new(49_950, 2)));
        assert_eq!(filter.category.as_deref(), Some("decor"));
        assert_eq!(filter.sort, Some(PriceSort::Descending));
    }

    #[test]
    fn test_search_query_rejects_bad_price() {
        assert!(query(&[("price", "cheap")]).filter().is_err());
    }

    #[test]
    fn test_stock_and_price_must_be_non_negative() {
        assert!(parse_stock("-1").is_err());
        assert_eq!(parse_stock("0").unwrap(), 0);
        assert!(parse_price("-5").is_err());
        assert_eq!(parse_price("10.5").unwrap(), Decimal::new(105, 1));
    }

    #[test]
    fn test_photo_count_limits() {
        let photo = Upload {
            file_name: "a.png".to_owned(),
            content_type: "image/png".to_owned(),
            bytes: vec![1],
        };
        let mut form = ProductForm::default();
        assert!(form.check_photo_count(true).is_err());
        assert!(form.check_photo_count(false).is_ok());

        form.photos = vec![photo; 6];
        assert!(form.check_photo_count(false).is_err());
    }
}
