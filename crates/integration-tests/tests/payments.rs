//! Payment intents and coupons.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use ecom24_integration_tests::{TestApp, as_admin};

#[tokio::test]
async fn test_unknown_coupon_is_rejected() {
    let app = TestApp::new().await;

    let res = app.get("/api/v1/payment/discount?code=NOPE").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["message"], "Invalid Coupon Code");

    let res = app.get("/api/v1/payment/discount").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Please Enter A Coupon Code");
}

#[tokio::test]
async fn test_coupon_lifecycle() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            &as_admin("/api/v1/payment/coupon/new"),
            &json!({"code": "SAVE100", "amount": 100}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
    let id = res.body["coupon"]["_id"].as_str().unwrap().to_owned();

    let res = app.get("/api/v1/payment/discount?code=SAVE100").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["discount"], "100");

    let dup = app
        .post_json(
            &as_admin("/api/v1/payment/coupon/new"),
            &json!({"code": "SAVE100", "amount": 50}),
        )
        .await;
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);

    let res = app.get(&as_admin("/api/v1/payment/coupon/all")).await;
    assert_eq!(res.body["count"], 1);

    let uri = as_admin(&format!("/api/v1/payment/coupon/{id}"));
    assert_eq!(app.delete(&uri).await.status, StatusCode::OK);
    assert_eq!(app.delete(&uri).await.status, StatusCode::NOT_FOUND);

    let res = app.get("/api/v1/payment/discount?code=SAVE100").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_coupon_requires_code_and_amount() {
    let app = TestApp::new().await;
    let res = app
        .post_json(
            &as_admin("/api/v1/payment/coupon/new"),
            &json!({"code": "HALF"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Please Enter Both Coupon & Amount");
}

#[tokio::test]
async fn test_payment_intent_uses_minor_units() {
    let app = TestApp::new().await;

    let res = app
        .post_json("/api/v1/payment/create", &json!({"amount": "199.99"}))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
    assert_eq!(res.body["clientSecret"], "pi_test_1_secret");

    let intents = app.payments.intents.lock().unwrap().clone();
    assert_eq!(intents, vec![(19_999, "inr".to_owned())]);
}

#[tokio::test]
async fn test_payment_intent_rejects_bad_amounts() {
    let app = TestApp::new().await;

    let res = app.post_json("/api/v1/payment/create", &json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post_json("/api/v1/payment/create", &json!({"amount": 0}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post_json("/api/v1/payment/create", &json!({"amount": "0.004"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    assert!(app.payments.intents.lock().unwrap().is_empty());
}
