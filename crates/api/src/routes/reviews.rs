//! Product review route handlers.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use ecom24_core::{NewReview, ProductId, Rating, Review, ReviewId, User, UserId};

use super::{ApiJson, ApiQuery, Envelope, created, non_empty, ok, parse_id};
use crate::cache::{Invalidation, invalidate};
use crate::db::ReviewSort;
use crate::error::{AppError, Result};
use crate::middleware::LoginId;
use crate::state::AppState;

/// Create the review routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(create))
        .route("/average/{product_id}", get(average))
        .route("/{product_id}", get(list))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub sort: Option<String>,
}

/// Public profile shown next to a review.
#[derive(Debug, Clone, Serialize)]
pub struct Reviewer {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub photo: String,
}

impl From<&User> for Reviewer {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            photo: user.photo.clone(),
        }
    }
}

/// A review with its author's profile in place of the bare user id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(rename = "_id")]
    pub id: ReviewId,
    pub user: Option<Reviewer>,
    pub product: ProductId,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewView {
    fn new(review: Review, user: Option<Reviewer>) -> Self {
        Self {
            id: review.id,
            user,
            product: review.product,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewBody {
    pub review: ReviewView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsBody {
    pub reviews: Vec<ReviewView>,
    pub total_reviews: usize,
}

/// Aggregate rating for a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal place, 0 without reviews.
    pub average_rating: f64,
    pub total_reviews: u32,
    /// Count per star, index 0 is one star.
    pub rating_distribution: [u32; 5],
}

impl RatingSummary {
    #[must_use]
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let mut distribution = [0_u32; 5];
        let mut sum = 0_u32;
        let mut count = 0_u32;
        for rating in ratings {
            if let Some(slot) = distribution.get_mut(usize::from(rating.get() - Rating::MIN)) {
                *slot += 1;
            }
            sum += u32::from(rating.get());
            count += 1;
        }

        let average_rating = if count == 0 {
            0.0
        } else {
            (f64::from(sum) / f64::from(count) * 10.0).round() / 10.0
        };

        Self {
            average_rating,
            total_reviews: count,
            rating_distribution: distribution,
        }
    }
}

fn parse_sort(raw: Option<&str>) -> ReviewSort {
    match raw {
        Some("top") => ReviewSort::Top,
        _ => ReviewSort::Latest,
    }
}

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_owned())
}

pub async fn create(
    State(state): State<AppState>,
    LoginId(user_id): LoginId,
    ApiJson(body): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Envelope<ReviewBody>>)> {
    let user_id =
        user_id.ok_or_else(|| AppError::Unauthorized("Please login to review".to_owned()))?;
    let product_id: ProductId = non_empty(body.product_id)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| AppError::BadRequest("Product ID is required".to_owned()))?;
    let (Some(rating), Some(comment)) = (body.rating, non_empty(body.comment)) else {
        return Err(AppError::BadRequest("All fields are required".to_owned()));
    };
    let rating = Rating::try_from(rating)
        .map_err(|_| AppError::BadRequest("Rating must be between 1 and 5".to_owned()))?;

    if state.store().get_product(product_id).await?.is_none() {
        return Err(product_not_found());
    }
    let user = state
        .store()
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_owned()))?;
    if state
        .store()
        .find_review(&user_id, product_id)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "You have already reviewed this product".to_owned(),
        ));
    }

    let review = state
        .store()
        .create_review(NewReview {
            user: user_id,
            product: product_id,
            rating,
            comment,
        })
        .await?;

    invalidate(state.cache(), &Invalidation::new().product()).await;
    info!(review_id = %review.id, product_id = %product_id, "Review created");

    Ok(created(
        "Review submitted successfully",
        ReviewBody {
            review: ReviewView::new(review, Some(Reviewer::from(&user))),
        },
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    ApiQuery(query): ApiQuery<ReviewsQuery>,
) -> Result<Json<Envelope<ReviewsBody>>> {
    let product_id: ProductId = parse_id(&product_id)?;
    if state.store().get_product(product_id).await?.is_none() {
        return Err(product_not_found());
    }

    let reviews = state
        .store()
        .reviews_for_product(product_id, parse_sort(query.sort.as_deref()))
        .await?;

    let mut author_ids: Vec<UserId> = reviews.iter().map(|r| r.user.clone()).collect();
    author_ids.sort();
    author_ids.dedup();
    let authors: HashMap<UserId, Reviewer> = state
        .store()
        .users_by_ids(&author_ids)
        .await?
        .iter()
        .map(|user| (user.id.clone(), Reviewer::from(user)))
        .collect();

    let reviews: Vec<ReviewView> = reviews
        .into_iter()
        .map(|review| {
            let author = authors.get(&review.user).cloned();
            ReviewView::new(review, author)
        })
        .collect();

    Ok(ok(
        "Reviews fetched successfully",
        ReviewsBody {
            total_reviews: reviews.len(),
            reviews,
        },
    ))
}

pub async fn average(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Envelope<RatingSummary>>> {
    let product_id: ProductId = parse_id(&product_id)?;
    let reviews = state
        .store()
        .reviews_for_product(product_id, ReviewSort::Latest)
        .await?;

    Ok(Json(Envelope {
        success: true,
        message: None,
        data: RatingSummary::from_ratings(reviews.iter().map(|r| r.rating)),
    }))
}
