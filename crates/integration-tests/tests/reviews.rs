//! Review creation, listing and rating summaries.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use ecom24_core::Role;
use ecom24_integration_tests::TestApp;

#[tokio::test]
async fn test_single_five_star_review_averages_five() {
    let app = TestApp::new().await;
    app.seed_user("u1", "Asha", Role::User).await;
    let lamp = app.seed_product("Lamp", 999, 3, "home").await;

    let res = app
        .post_json(
            "/api/v1/review/new?id=u1",
            &json!({"productId": lamp.id, "rating": 5, "comment": "Lovely"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
    assert_eq!(res.body["review"]["user"]["name"], "Asha");

    let res = app
        .get(&format!("/api/v1/review/average/{}", lamp.id))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["averageRating"], 5.0);
    assert_eq!(res.body["totalReviews"], 1);
    assert_eq!(res.body["ratingDistribution"], json!([0, 0, 0, 0, 1]));
}

#[tokio::test]
async fn test_average_without_reviews_is_zero() {
    let app = TestApp::new().await;
    let lamp = app.seed_product("Lamp", 999, 3, "home").await;

    let res = app
        .get(&format!("/api/v1/review/average/{}", lamp.id))
        .await;
    assert_eq!(res.body["averageRating"], 0.0);
    assert_eq!(res.body["totalReviews"], 0);
}

#[tokio::test]
async fn test_second_review_by_same_user_rejected() {
    let app = TestApp::new().await;
    app.seed_user("u1", "Asha", Role::User).await;
    let lamp = app.seed_product("Lamp", 999, 3, "home").await;
    let body = json!({"productId": lamp.id, "rating": 4, "comment": "Nice"});

    let first = app.post_json("/api/v1/review/new?id=u1", &body).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.post_json("/api/v1/review/new?id=u1", &body).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["message"], "You have already reviewed this product");
}

#[tokio::test]
async fn test_review_validation() {
    let app = TestApp::new().await;
    app.seed_user("u1", "Asha", Role::User).await;
    let lamp = app.seed_product("Lamp", 999, 3, "home").await;

    let res = app
        .post_json(
            "/api/v1/review/new",
            &json!({"productId": lamp.id, "rating": 5, "comment": "x"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .post_json(
            "/api/v1/review/new?id=u1",
            &json!({"productId": "nope", "rating": 5, "comment": "x"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Product ID is required");

    let res = app
        .post_json(
            "/api/v1/review/new?id=u1",
            &json!({"productId": lamp.id, "rating": 5}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "All fields are required");

    let res = app
        .post_json(
            "/api/v1/review/new?id=u1",
            &json!({"productId": lamp.id, "rating": 6, "comment": "x"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Rating must be between 1 and 5");

    let ghost = ecom24_core::ProductId::generate();
    let res = app
        .post_json(
            "/api/v1/review/new?id=u1",
            &json!({"productId": ghost, "rating": 5, "comment": "x"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post_json(
            "/api/v1/review/new?id=stranger",
            &json!({"productId": lamp.id, "rating": 5, "comment": "x"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "User not found");
}

#[tokio::test]
async fn test_reviews_sorted_top_first() {
    let app = TestApp::new().await;
    app.seed_user("u1", "Asha", Role::User).await;
    app.seed_user("u2", "Ravi", Role::User).await;
    let lamp = app.seed_product("Lamp", 999, 3, "home").await;

    for (uid, rating) in [("u1", 5), ("u2", 2)] {
        let res = app
            .post_json(
                &format!("/api/v1/review/new?id={uid}"),
                &json!({"productId": lamp.id, "rating": rating, "comment": "ok"}),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let res = app
        .get(&format!("/api/v1/review/{}?sort=top", lamp.id))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["totalReviews"], 2);
    assert_eq!(res.body["reviews"][0]["rating"], 5);
    assert_eq!(res.body["reviews"][0]["user"]["name"], "Asha");

    let res = app.get(&format!("/api/v1/review/{}", lamp.id)).await;
    assert_eq!(res.body["reviews"][0]["rating"], 2);

    let ghost = ecom24_core::ProductId::generate();
    let res = app.get(&format!("/api/v1/review/{ghost}")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
