//! Payment intent and coupon route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use ecom24_core::{Coupon, CouponId, MoneyError, NewCoupon, to_minor_units};

use super::{ApiJson, ApiQuery, Envelope, created, non_empty, ok, parse_id};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Create the payment routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_intent))
        .route("/discount", get(apply_discount))
        .route("/coupon/new", post(create_coupon))
        .route("/coupon/all", get(all_coupons))
        .route("/coupon/{id}", delete(delete_coupon))
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentBody {
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscountQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiscountBody {
    pub discount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CouponBody {
    pub coupon: Coupon,
}

#[derive(Debug, Serialize)]
pub struct CouponsBody {
    pub count: usize,
    pub coupons: Vec<Coupon>,
}

/// Create a payment intent for `amount` in the configured currency.
pub async fn create_intent(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<IntentRequest>,
) -> Result<(StatusCode, Json<Envelope<IntentBody>>)> {
    let amount = body
        .amount
        .ok_or_else(|| AppError::BadRequest("Please enter an amount".to_owned()))?;
    let minor = to_minor_units(amount).map_err(|e| match e {
        MoneyError::NotPositive => {
            AppError::BadRequest("Amount must be greater than zero".to_owned())
        }
        MoneyError::Overflow => AppError::BadRequest("Amount is too large".to_owned()),
    })?;

    let intent = state
        .payments()
        .create_intent(minor, &state.settings().payment_currency)
        .await?;

    Ok(created(
        "Payment Intent Created Successfully",
        IntentBody {
            client_secret: intent.client_secret,
        },
    ))
}

pub async fn apply_discount(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DiscountQuery>,
) -> Result<Json<Envelope<DiscountBody>>> {
    let code = non_empty(query.code)
        .ok_or_else(|| AppError::BadRequest("Please Enter A Coupon Code".to_owned()))?;
    let coupon = state
        .store()
        .find_coupon(&code)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid Coupon Code".to_owned()))?;

    Ok(ok(
        format!("{code} is valid, you received {}Rs discount", coupon.amount),
        DiscountBody {
            discount: coupon.amount,
        },
    ))
}

pub async fn create_coupon(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CouponRequest>,
) -> Result<(StatusCode, Json<Envelope<CouponBody>>)> {
    let (Some(code), Some(amount)) = (non_empty(body.code), body.amount) else {
        return Err(AppError::BadRequest(
            "Please Enter Both Coupon & Amount".to_owned(),
        ));
    };
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Coupon amount must be greater than zero".to_owned(),
        ));
    }

    let coupon = state
        .store()
        .create_coupon(NewCoupon { code, amount })
        .await?;
    info!(coupon_id = %coupon.id, "Coupon created");

    Ok(created(
        format!("Coupon With Code: {} Created Successfully", coupon.code),
        CouponBody { coupon },
    ))
}

pub async fn all_coupons(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CouponsBody>>> {
    let coupons = state.store().list_coupons().await?;
    Ok(ok(
        "All Coupons fetched successfully!",
        CouponsBody {
            count: coupons.len(),
            coupons,
        },
    ))
}

pub async fn delete_coupon(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<CouponBody>>> {
    let id: CouponId = parse_id(&id)?;
    let coupon = state
        .store()
        .delete_coupon(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid ID".to_owned()))?;
    info!(coupon_id = %id, "Coupon deleted");

    Ok(ok(
        format!("Coupon with id: {id} deleted successfully"),
        CouponBody { coupon },
    ))
}
