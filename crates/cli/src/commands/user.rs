//! User role management.
//!
//! Users register themselves through the API on first sign-in; this is how
//! an operator grants or revokes admin access afterwards.

use ecom24_api::db::{PgStore, RepositoryError, Store};
use ecom24_core::{Role, UserId};

use super::{CliError, connect};

/// Set the role of an existing user.
///
/// # Errors
///
/// Returns an error if the uid is blank, the user does not exist, or the
/// database operation fails.
pub async fn set_role(uid: &str, role: Role) -> Result<(), CliError> {
    let id = UserId::parse(uid).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let store = PgStore::new(connect().await?);

    let user = match store.set_user_role(&id, role).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => {
            return Err(CliError::InvalidArgument(format!("no user with uid {id}")));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(uid = %user.id, name = %user.name, role = %user.role, "Updated user role");
    Ok(())
}
