//! Caller identity extractors.
//!
//! Sign-in happens on the client against the identity provider, which
//! hands the app a uid. The app passes that uid back as the `id` query
//! parameter and the API trusts it; these extractors resolve it.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use ecom24_core::{User, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct LoginQuery {
    id: Option<String>,
}

/// Read the caller's uid from the `id` query parameter.
fn login_id(parts: &Parts) -> Option<UserId> {
    let Query(query) = Query::<LoginQuery>::try_from_uri(&parts.uri).ok()?;
    query.id.and_then(|id| UserId::parse(&id).ok())
}

/// Extractor for the caller's uid, if one was supplied.
///
/// Does not check that the user exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(LoginId(id): LoginId) -> impl IntoResponse {
///     match id {
///         Some(uid) => format!("Hello, {uid}!"),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct LoginId(pub Option<UserId>);

impl<S> FromRequestParts<S> for LoginId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(login_id(parts)))
    }
}

/// Extractor that requires the caller to be an admin.
///
/// Rejects with 401 when the uid is missing or unknown, and 403 when the
/// user exists but is not an admin.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = login_id(parts)
            .ok_or_else(|| AppError::Unauthorized("Login id required".to_string()))?;

        let user = state
            .store()
            .get_user(&id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid login id".to_string()))?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access only".to_string()));
        }

        set_sentry_user(&user.id);
        Ok(Self(user))
    }
}
