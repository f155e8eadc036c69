//! Shoppers and admins.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Email, Gender, Role, UserId};

/// A registered user. Identity fields come from the external identity
/// provider; `gender` and `dob` feed the admin dashboard charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub photo: String,
    pub role: Role,
    pub gender: Gender,
    pub dob: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Age in whole years on `today`. Birthdays later in the year have not
    /// counted yet.
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut age = today.year() - self.dob.year();
        if (today.month(), today.day()) < (self.dob.month(), self.dob.day()) {
            age -= 1;
        }
        u32::try_from(age).unwrap_or(0)
    }
}

/// Input for registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub photo: String,
    pub gender: Gender,
    pub dob: NaiveDate,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user_born(dob: NaiveDate) -> User {
        User {
            id: UserId::parse("uid-1").unwrap(),
            name: "Ravi".to_owned(),
            email: Email::parse("ravi@example.com").unwrap(),
            photo: String::new(),
            role: Role::User,
            gender: Gender::Male,
            dob,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_age_counts_birthday_on_the_day() {
        let user = user_born(NaiveDate::from_ymd_opt(2000, 6, 15).unwrap());
        assert_eq!(user.age_on(NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), 19);
        assert_eq!(user.age_on(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), 20);
    }

    #[test]
    fn test_age_never_negative() {
        let user = user_born(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        assert_eq!(user.age_on(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()), 0);
    }
}
