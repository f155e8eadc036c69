//! User route handlers.

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use ecom24_core::{Email, Gender, NewUser, User, UserId};

use super::{ApiJson, Envelope, NoData, created, non_empty, ok, parse_id};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Create the user routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(create))
        .route("/all", get(all_users))
        .route("/{id}", get(show).delete(delete))
}

/// Registration body sent by the client after identity-provider sign-in.
#[derive(Debug, Deserialize)]
pub struct NewUserRequest {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersBody {
    pub count: usize,
    pub users: Vec<User>,
}

/// Accept a plain date or a full timestamp, keeping only the date.
fn parse_dob(raw: &str) -> Result<NaiveDate> {
    NaiveDate::from_str(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
        .map_err(|_| AppError::BadRequest(format!("Invalid date of birth: {raw}")))
}

impl TryFrom<NewUserRequest> for NewUser {
    type Error = AppError;

    fn try_from(body: NewUserRequest) -> Result<Self> {
        let (Some(id), Some(name), Some(email), Some(photo), Some(gender), Some(dob)) = (
            non_empty(body.id),
            non_empty(body.name),
            non_empty(body.email),
            non_empty(body.photo),
            non_empty(body.gender),
            non_empty(body.dob),
        ) else {
            return Err(AppError::BadRequest("Please enter all fields".to_owned()));
        };

        Ok(Self {
            id: parse_id(&id)?,
            name,
            email: Email::parse(&email).map_err(|e| AppError::BadRequest(e.to_string()))?,
            photo,
            gender: Gender::from_str(&gender)
                .map_err(|_| AppError::BadRequest(format!("Invalid gender: {gender}")))?,
            dob: parse_dob(&dob)?,
        })
    }
}

/// Register a user, or greet a returning one.
pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewUserRequest>,
) -> Result<Response> {
    if let Some(id) = body.id.as_deref().and_then(|raw| UserId::parse(raw).ok())
        && let Some(existing) = state.store().get_user(&id).await?
    {
        return Ok(ok(format!("Welcome back, {}", existing.name), NoData {}).into_response());
    }

    let new_user = NewUser::try_from(body)?;
    let user = state.store().create_user(new_user).await?;
    info!(user_id = %user.id, "User registered");

    Ok(created(
        format!(
            "Welcome {}, your user account has been successfully created",
            user.name
        ),
        UserBody { user },
    )
    .into_response())
}

pub async fn all_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<UsersBody>>> {
    let users = state.store().list_users().await?;
    Ok(ok(
        "All users fetched successfully",
        UsersBody {
            count: users.len(),
            users,
        },
    ))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserBody>>> {
    let id: UserId = parse_id(&id)?;
    let user = state
        .store()
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid Id".to_owned()))?;

    Ok(ok(
        format!("User with id:{id} fetched successfully"),
        UserBody { user },
    ))
}

pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserBody>>> {
    let id: UserId = parse_id(&id)?;
    let not_found = || AppError::NotFound(format!("User with id:{id} not found!"));
    let user = state.store().get_user(&id).await?.ok_or_else(not_found)?;
    if !state.store().delete_user(&id).await? {
        return Err(not_found());
    }
    info!(user_id = %id, "User deleted");

    Ok(ok(
        format!("User with id:{id} deleted successfully"),
        UserBody { user },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> NewUserRequest {
        NewUserRequest {
            id: Some("uid-7".to_owned()),
            name: Some("Ravi".to_owned()),
            email: Some("ravi@example.com".to_owned()),
            photo: Some("https://img/ravi.png".to_owned()),
            gender: Some("male".to_owned()),
            dob: Some("1995-04-12".to_owned()),
        }
    }

    #[test]
    fn test_dob_accepts_date_or_timestamp() {
        let expected = NaiveDate::from_ymd_opt(1995, 4, 12).unwrap();
        assert_eq!(parse_dob("1995-04-12").unwrap(), expected);
        assert_eq!(parse_dob("1995-04-12T00:00:00.000Z").unwrap(), expected);
        assert!(parse_dob("12/04/1995").is_err());
    }

    #[test]
    fn test_new_user_from_request() {
        let user = NewUser::try_from(request()).unwrap();
        assert_eq!(user.id.as_str(), "uid-7");
        assert_eq!(user.gender, Gender::Male);
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut body = request();
        body.photo = Some("  ".to_owned());
        assert!(matches!(
            NewUser::try_from(body),
            Err(AppError::BadRequest(m)) if m == "Please enter all fields"
        ));
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut body = request();
        body.email = Some("not-an-email".to_owned());
        assert!(NewUser::try_from(body).is_err());
    }
}
