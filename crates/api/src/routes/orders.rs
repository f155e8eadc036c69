//! Order route handlers.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use ecom24_core::{NewOrder, Order, OrderId, OrderItem, OrderStatus, ShippingInfo, UserId};

use super::{ApiJson, Envelope, NoData, created, non_empty, ok, parse_id};
use crate::cache::{CacheKey, Invalidation, invalidate, read_through};
use crate::error::{AppError, Result};
use crate::middleware::{LoginId, RequireAdmin};
use crate::state::AppState;

/// Create the order routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(create))
        .route("/my", get(my_orders))
        .route("/all", get(all_orders))
        .route("/{id}", get(show).put(process).delete(delete))
}

/// Order placement body. Every field except `status` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub shipping_info: Option<ShippingInfo>,
    pub order_items: Option<Vec<OrderItem>>,
    pub user: Option<String>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub shipping_charges: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total: Option<Decimal>,
    pub status: Option<OrderStatus>,
}

impl TryFrom<NewOrderRequest> for NewOrder {
    type Error = AppError;

    fn try_from(body: NewOrderRequest) -> Result<Self> {
        let missing = || AppError::BadRequest("Please enter all fields".to_owned());

        let order_items = body.order_items.filter(|items| !items.is_empty());
        let user = non_empty(body.user);
        let (
            Some(shipping_info),
            Some(order_items),
            Some(user),
            Some(subtotal),
            Some(tax),
            Some(shipping_charges),
            Some(discount),
            Some(total),
        ) = (
            body.shipping_info,
            order_items,
            user,
            body.subtotal,
            body.tax,
            body.shipping_charges,
            body.discount,
            body.total,
        )
        else {
            return Err(missing());
        };

        if order_items.iter().any(|item| item.quantity == 0) {
            return Err(AppError::BadRequest(
                "Order item quantity must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            shipping_info,
            user: parse_id(&user)?,
            order_items,
            subtotal,
            tax,
            shipping_charges,
            discount,
            total,
            status: body.status.unwrap_or_default(),
        })
    }
}

/// An order with the owning user's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderBody<T> {
    pub order: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyOrdersBody {
    pub total_orders: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct OrdersBody {
    pub orders: Vec<OrderView>,
}

/// Attach user names, looking each distinct user up once.
async fn with_user_names(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderView>> {
    let mut ids: Vec<UserId> = orders.iter().map(|o| o.user.clone()).collect();
    ids.sort();
    ids.dedup();

    let names: HashMap<UserId, String> = state
        .store()
        .users_by_ids(&ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user.name))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| OrderView {
            user_name: names.get(&order.user).cloned(),
            order,
        })
        .collect())
}

async fn find_order(state: &AppState, id: OrderId) -> Result<Order> {
    state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderBody<Order>>>)> {
    let new_order = NewOrder::try_from(body)?;
    let order = state.store().place_order(new_order).await?;

    invalidate(
        state.cache(),
        &Invalidation::new()
            .product()
            .order()
            .admin()
            .for_user(order.user.clone())
            .for_products(order.product_ids()),
    )
    .await;
    info!(order_id = %order.id, user = %order.user, "Order placed");

    Ok(created("Order Placed Successfully!", OrderBody { order }))
}

pub async fn my_orders(
    State(state): State<AppState>,
    LoginId(user): LoginId,
) -> Result<Json<Envelope<MyOrdersBody>>> {
    let user = user.ok_or_else(|| AppError::Unauthorized("Login id required".to_owned()))?;
    let orders = read_through(state.cache(), CacheKey::MyOrders(user.clone()), || {
        state.store().orders_for_user(&user)
    })
    .await?;

    Ok(ok(
        "Orders fetched successfully!",
        MyOrdersBody {
            total_orders: orders.len(),
            orders,
        },
    ))
}

pub async fn all_orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<OrdersBody>>> {
    let orders = read_through(state.cache(), CacheKey::AllOrders, || async {
        let orders = state.store().list_orders().await?;
        with_user_names(&state, orders).await
    })
    .await?;

    Ok(ok("All Orders fetched successfully!", OrdersBody { orders }))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OrderBody<OrderView>>>> {
    let id: OrderId = parse_id(&id)?;
    let order = read_through(state.cache(), CacheKey::Order(id), || async {
        let order = state
            .store()
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order with id:{id} not found!")))?;
        let mut views = with_user_names(&state, vec![order]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("order view missing".to_owned()))
    })
    .await?;

    Ok(ok("Order Details Fetch Successfully!", OrderBody { order }))
}

/// Advance an order one step: Processing, Shipped, Delivered.
pub async fn process(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OrderBody<Order>>>> {
    let id: OrderId = parse_id(&id)?;
    let current = find_order(&state, id).await?;
    let order = state
        .store()
        .set_order_status(id, current.status.advance())
        .await?;

    invalidate(
        state.cache(),
        &Invalidation::new()
            .order()
            .admin()
            .for_user(order.user.clone())
            .for_order(id),
    )
    .await;
    info!(order_id = %id, status = %order.status, "Order processed");

    Ok(ok("Order Processed Successfully!", OrderBody { order }))
}

pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<NoData>>> {
    let id: OrderId = parse_id(&id)?;
    let order = find_order(&state, id).await?;
    if !state.store().delete_order(id).await? {
        return Err(AppError::NotFound("Order not found".to_owned()));
    }

    invalidate(
        state.cache(),
        &Invalidation::new()
            .order()
            .admin()
            .for_user(order.user)
            .for_order(id),
    )
    .await;
    info!(order_id = %id, "Order deleted");

    Ok(ok("Order Deleted Successfully!", NoData {}))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use ecom24_core::ProductId;

    use super::*;

    fn body() -> serde_json::Value {
        json!({
            "shippingInfo": {
                "name": "Asha",
                "address": "12 MG Road",
                "city": "Pune",
                "state": "MH",
                "country": "India",
                "pinCode": 411001
            },
            "orderItems": [{
                "productId": ProductId::generate(),
                "name": "Lamp",
                "photo": "https://img/lamp.png",
                "price": "499",
                "quantity": 2
            }],
            "user": "uid-1",
            "subtotal": "998",
            "tax": "180",
            "shippingCharges": "0",
            "discount": "0",
            "total": "1178"
        })
    }

    fn parse(value: serde_json::Value) -> Result<NewOrder> {
        let request: NewOrderRequest = serde_json::from_value(value).unwrap();
        NewOrder::try_from(request)
    }

    #[test]
    fn test_status_defaults_to_processing() {
        let order = parse(body()).unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.user.as_str(), "uid-1");
    }

    #[test]
    fn test_zero_charges_are_present_not_missing() {
        let order = parse(body()).unwrap();
        assert_eq!(order.shipping_charges, Decimal::ZERO);
        assert_eq!(order.discount, Decimal::ZERO);
    }

    #[test]
    fn test_missing_fields_rejected() {
        for field in ["shippingInfo", "user", "tax", "discount", "total"] {
            let mut value = body();
            value.as_object_mut().unwrap().remove(field);
            let err = parse(value).unwrap_err();
            assert!(
                matches!(err, AppError::BadRequest(ref m) if m == "Please enter all fields"),
                "{field}"
            );
        }
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut value = body();
        value["orderItems"] = json!([]);
        assert!(parse(value).is_err());
    }

    #[test]
    fn test_order_view_round_trips_through_cache_format() {
        let order = parse(body()).unwrap();
        let view = OrderView {
            order: Order {
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
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            user_name: Some("Asha".to_owned()),
        };

        let raw = serde_json::to_string(&view).unwrap();
        let back: OrderView = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.order, view.order);
        assert_eq!(back.user_name.as_deref(), Some("Asha"));
    }
}
