//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Users
//! POST   /api/v1/user/new                - Register, or welcome back
//! GET    /api/v1/user/all                - All users (admin)
//! GET    /api/v1/user/{id}               - User detail
//! DELETE /api/v1/user/{id}               - Delete user (admin)
//!
//! # Products
//! GET    /api/v1/product/all             - Search with filters and paging
//! GET    /api/v1/product/latest          - Five newest products
//! GET    /api/v1/product/categories      - Distinct categories
//! GET    /api/v1/product/admin-products  - All products (admin)
//! POST   /api/v1/product/new             - Create, multipart (admin)
//! GET    /api/v1/product/{id}            - Product detail
//! PUT    /api/v1/product/{id}            - Update, multipart (admin)
//! DELETE /api/v1/product/{id}            - Delete (admin)
//!
//! # Orders
//! POST   /api/v1/order/new               - Place order
//! GET    /api/v1/order/my?id=            - Caller's orders
//! GET    /api/v1/order/all               - All orders (admin)
//! GET    /api/v1/order/{id}              - Order detail
//! PUT    /api/v1/order/{id}              - Advance status (admin)
//! DELETE /api/v1/order/{id}              - Delete (admin)
//!
//! # Payments
//! POST   /api/v1/payment/create          - Create payment intent
//! GET    /api/v1/payment/discount?code=  - Look up a coupon
//! POST   /api/v1/payment/coupon/new      - Create coupon (admin)
//! GET    /api/v1/payment/coupon/all      - All coupons (admin)
//! DELETE /api/v1/payment/coupon/{id}     - Delete coupon (admin)
//!
//! # Dashboard (admin)
//! GET    /api/v1/dashboard/stats|pie|bar|line
//!
//! # Reviews
//! POST   /api/v1/review/new?id=          - Review a product
//! GET    /api/v1/review/average/{id}     - Rating summary
//! GET    /api/v1/review/{id}?sort=       - Reviews, latest or top first
//! ```
//!
//! Admin routes take the caller's uid as the `id` query parameter.

pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Success envelope: `{"success": true, "message": ..., ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Payload for responses that carry only a message.
#[derive(Debug, Serialize)]
pub struct NoData {}

/// 200 with a message and payload.
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data,
    })
}

/// 201 with a message and payload.
pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Parse an id taken from the URL path.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))
}

/// Treat blank form and query values as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Create the `/api/v1` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/user", users::router())
        .nest("/product", products::router())
        .nest("/order", orders::router())
        .nest("/payment", payments::router())
        .nest("/dashboard", dashboard::router())
        .nest("/review", reviews::router())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecom24_core::ProductId;

    use super::*;

    #[test]
    fn test_envelope_flattens_payload() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            total_orders: usize,
        }

        let Json(envelope) = ok("Orders fetched", Body { total_orders: 2 });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "message": "Orders fetched", "totalOrders": 2})
        );
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(parse_id::<ProductId>("not-a-uuid").is_err());
        let id = ProductId::generate();
        assert_eq!(parse_id::<ProductId>(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  lamp ".to_owned())), Some("lamp".to_owned()));
        assert_eq!(non_empty(Some("   ".to_owned())), None);
        assert_eq!(non_empty(None), None);
    }
}
