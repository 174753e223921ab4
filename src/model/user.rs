use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::{IntoParams, ToSchema};

/// A person belonging to exactly one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub organization_id: i64,
    /// Name of the referenced organization at read time.
    pub organization_name: String,
    /// Slug of the referenced organization at read time.
    pub organization_slug: String,
    pub name: String,
    /// Always lowercase.
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Coordinator,
    #[default]
    Member,
}

impl UserRole {
    /// Returns the value stored in the `users.role` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Coordinator => "coordinator",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown user role: {0}")]
pub struct UnknownRole(String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "coordinator" => Ok(Self::Coordinator),
            "member" => Ok(Self::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Payload for `POST /v1/users`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CreateUser {
    pub organization_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

/// Payload for `PATCH /v1/users/{id}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateUser {
    pub organization_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

/// User list filters, all optional and combined with `AND`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the email.
    pub email: Option<String>,
    pub organization_id: Option<i64>,
    pub role: Option<UserRole>,
    /// Case-insensitive substring of the name, email or organization name.
    pub q: Option<String>,
}

/// Validated user ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub organization_id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

/// Validated partial update. `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub organization_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub phone: Option<Option<String>>,
    pub timezone: Option<Option<String>>,
}

impl UserChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
