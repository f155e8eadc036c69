//! Integration test harness for Ecom24.
//!
//! Builds the real router over [`MemoryStore`], a fresh [`MokaCache`] and
//! recording fakes for the payment and image providers, then drives it
//! with `tower::ServiceExt::oneshot`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ecom24-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, NaiveDate, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use ecom24_api::cache::MokaCache;
use ecom24_api::db::{MemoryStore, Store};
use ecom24_api::services::media::{ImageHost, MediaError, Upload};
use ecom24_api::services::payments::{PaymentError, PaymentGateway, PaymentIntent};
use ecom24_api::state::{AppSettings, AppState, Backends};
use ecom24_core::{Email, Gender, Photo, Product, ProductId, Role, User, UserId};

/// Uid of the admin seeded by [`TestApp::new`].
pub const ADMIN_ID: &str = "admin-uid";

/// Payment gateway that records every intent it is asked for.
#[derive(Debug, Default)]
pub struct FakePayments {
    pub intents: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut intents = self.intents.lock().unwrap();
        intents.push((amount_minor, currency.to_owned()));
        let id = format!("pi_test_{}", intents.len());
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }
}

/// Image host that hands back predictable photos and records deletions.
#[derive(Debug, Default)]
pub struct FakeMedia {
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    /// Product removed from the store while the next upload is in flight.
    pub remove_during_upload: Mutex<Option<(Arc<MemoryStore>, ProductId)>>,
}

#[async_trait]
impl ImageHost for FakeMedia {
    async fn upload(&self, files: &[Upload]) -> Result<Vec<Photo>, MediaError> {
        let pending = self.remove_during_upload.lock().unwrap().take();
        if let Some((store, id)) = pending {
            store.delete_product(id).await.unwrap();
        }
        let photos: Vec<Photo> = files
            .iter()
            .map(|file| Photo {
                public_id: format!("ecom24/{}", file.file_name),
                url: format!("https://img.test/ecom24/{}", file.file_name),
            })
            .collect();
        self.uploaded
            .lock()
            .unwrap()
            .extend(photos.iter().map(|p| p.public_id.clone()));
        Ok(photos)
    }

    async fn delete(&self, public_ids: &[String]) -> Result<(), MediaError> {
        self.deleted
            .lock()
            .unwrap()
            .extend(public_ids.iter().cloned());
        Ok(())
    }
}

/// A status code and parsed JSON body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

/// The router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakePayments>,
    pub media: Arc<FakeMedia>,
}

impl TestApp {
    /// App with default settings and one admin user.
    pub async fn new() -> Self {
        Self::with_settings(AppSettings::default()).await
    }

    pub async fn with_settings(settings: AppSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(FakePayments::default());
        let media = Arc::new(FakeMedia::default());

        let state = AppState::new(
            Backends {
                store: store.clone(),
                cache: Arc::new(MokaCache::new(1_000, None)),
                payments: payments.clone(),
                media: media.clone(),
            },
            settings,
        );

        let app = Self {
            router: ecom24_api::app(state),
            store,
            payments,
            media,
        };
        app.seed_user(ADMIN_ID, "Admin", Role::Admin).await;
        app
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn put(&self, uri: &str) -> TestResponse {
        self.send(Request::put(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send_form(&self, method: Method, uri: &str, form: MultipartForm) -> TestResponse {
        let (content_type, body) = form.finish();
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn seed_user(&self, id: &str, name: &str, role: Role) -> User {
        let user = user(id, name, role);
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn seed_product(&self, name: &str, price: i64, stock: i32, category: &str) -> Product {
        let product = product(name, price, stock, category, Utc::now());
        self.store.insert_product(product.clone()).await;
        product
    }
}

/// Append the admin login id to a path.
#[must_use]
pub fn as_admin(path: &str) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}id={ADMIN_ID}")
}

#[must_use]
pub fn user(id: &str, name: &str, role: Role) -> User {
    User {
        id: UserId::parse(id).unwrap(),
        name: name.to_owned(),
        email: Email::parse(&format!("{id}@example.com")).unwrap(),
        photo: format!("https://img.test/{id}.png"),
        role,
        gender: Gender::Female,
        dob: NaiveDate::from_ymd_opt(1994, 6, 1).unwrap(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[must_use]
pub fn product(
    name: &str,
    price: i64,
    stock: i32,
    category: &str,
    created_at: DateTime<Utc>,
) -> Product {
    let id = ProductId::generate();
    Product {
        id,
        name: name.to_owned(),
        photos: vec![Photo {
            public_id: format!("ecom24/{id}"),
            url: format!("https://img.test/ecom24/{id}"),
        }],
        price: Decimal::from(price),
        stock,
        category: category.to_owned(),
        description: format!("{name} description"),
        created_at,
        updated_at: created_at,
    }
}

/// JSON body for `POST /api/v1/order/new`.
#[must_use]
pub fn order_body(user: &str, lines: &[(&Product, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product, quantity)| {
            serde_json::json!({
                "productId": product.id,
                "name": product.name,
                "photo": product.photos.first().map(|p| p.url.clone()).unwrap_or_default(),
                "price": product.price,
                "quantity": quantity,
            })
        })
        .collect();
    let subtotal: Decimal = lines
        .iter()
        .map(|(product, quantity)| product.price * Decimal::from(*quantity))
        .sum();

    serde_json::json!({
        "shippingInfo": {
            "name": "Asha",
            "address": "12 MG Road",
            "city": "Pune",
            "state": "MH",
            "country": "India",
            "pinCode": 411_001
        },
        "orderItems": items,
        "user": user,
        "subtotal": subtotal,
        "tax": "0",
        "shippingCharges": "0",
        "discount": "0",
        "total": subtotal,
    })
}

/// Minimal `multipart/form-data` encoder.
#[derive(Debug, Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

const BOUNDARY: &str = "ecom24-test-boundary";

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    #[must_use]
    pub fn photo(mut self, file_name: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photos\"; \
                 filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(b"\x89PNG fake image bytes");
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// A complete product form with one photo per name in `photos`.
    #[must_use]
    pub fn product(name: &str, price: &str, stock: &str, category: &str, photos: &[&str]) -> Self {
        let mut form = Self::new()
            .text("name", name)
            .text("price", price)
            .text("stock", stock)
            .text("category", category)
            .text("description", "A fine product");
        for photo in photos {
            form = form.photo(photo);
        }
        form
    }

    /// Content type header value and encoded body.
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.body,
        )
    }
}
