use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::{IntoParams, ToSchema};

/// An organization groups users under a single administrative entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    /// URL-safe unique identifier (e.g. `acme-corp`).
    pub slug: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub support_email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub website: Option<String>,
    pub timezone: String,
    pub language: String,
    pub status: OrganizationStatus,
    pub max_coordinators: i32,
    /// Outstanding membership requests awaiting review.
    pub pending_requests: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    #[default]
    Active,
    Inactive,
}

impl OrganizationStatus {
    /// Returns the value stored in the `organizations.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown organization status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for OrganizationStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Payload for `POST /v1/organizations`.
///
/// Missing fields deserialize to their defaults so the service can report
/// them as validation errors instead of a generic decode failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CreateOrganization {
    pub name: String,
    /// Derived from `name` when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub support_email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub website: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub max_coordinators: Option<i32>,
    pub pending_requests: Option<i32>,
}

/// Payload for `PATCH /v1/organizations/{id}`.
///
/// Absent fields are left untouched; an empty string clears an optional
/// metadata field.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub support_email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub website: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub max_coordinators: Option<i32>,
    pub pending_requests: Option<i32>,
}

/// Payload for `PUT /v1/organizations/{id}/status`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetOrganizationStatus {
    pub status: OrganizationStatus,
}

/// Organization list filters, all optional and combined with `AND`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrganizationFilter {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Case-insensitive substring of the name or the slug.
    pub q: Option<String>,
    pub status: Option<OrganizationStatus>,
}

/// Validated organization ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub support_email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub website: Option<String>,
    pub timezone: String,
    pub language: String,
    pub status: OrganizationStatus,
    pub max_coordinators: i32,
    pub pending_requests: i32,
}

/// Validated partial update. `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub support_email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub alt_phone: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub max_coordinators: Option<i32>,
    pub pending_requests: Option<i32>,
}

impl OrganizationChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the changes to an in-memory record, leaving timestamps alone.
    pub fn apply_to(&self, org: &mut Organization) {
        if let Some(name) = &self.name {
            org.name.clone_from(name);
        }
        if let Some(slug) = &self.slug {
            org.slug.clone_from(slug);
        }
        if let Some(value) = &self.description {
            org.description.clone_from(value);
        }
        if let Some(value) = &self.address {
            org.address.clone_from(value);
        }
        if let Some(value) = &self.support_email {
            org.support_email.clone_from(value);
        }
        if let Some(value) = &self.phone {
            org.phone.clone_from(value);
        }
        if let Some(value) = &self.alt_phone {
            org.alt_phone.clone_from(value);
        }
        if let Some(value) = &self.website {
            org.website.clone_from(value);
        }
        if let Some(value) = &self.timezone {
            org.timezone.clone_from(value);
        }
        if let Some(value) = &self.language {
            org.language.clone_from(value);
        }
        if let Some(status) = self.status {
            org.status = status;
        }
        if let Some(max) = self.max_coordinators {
            org.max_coordinators = max;
        }
        if let Some(pending) = self.pending_requests {
            org.pending_requests = pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_value() {
        for status in [OrganizationStatus::Active, OrganizationStatus::Inactive] {
            assert_eq!(status.as_str().parse::<OrganizationStatus>().ok(), Some(status));
        }
        assert!("Active".parse::<OrganizationStatus>().is_err());
    }

    #[test]
    fn create_payload_defaults_missing_fields() {
        let payload: CreateOrganization = serde_json::from_str("{}").unwrap_or_default();
        assert!(payload.name.is_empty());
        assert!(payload.slug.is_none());
    }

    #[test]
    fn create_payload_rejects_unknown_fields() {
        let result = serde_json::from_str::<CreateOrganization>(r#"{"name":"a","bogus":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_changes() {
        assert!(OrganizationChanges::default().is_empty());
        let changes = OrganizationChanges {
            phone: Some(None),
            ..OrganizationChanges::default()
        };
        assert!(!changes.is_empty());
    }
}
