//! Error taxonomy shared by the store, the services and the HTTP layer.

use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Organization,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organization => f.write_str("organization"),
            Self::User => f.write_str("user"),
        }
    }
}

/// Uniqueness or referential-integrity rule that a write would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("An organization with this name already exists.")]
    OrganizationName,

    #[error("An organization with this slug already exists.")]
    OrganizationSlug,

    #[error("A user with this email already exists.")]
    UserEmail,

    #[error("The referenced organization does not exist.")]
    MissingOrganization,

    #[error("The organization still has users; delete them first or request a cascade.")]
    OrganizationHasUsers,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_and_id() {
        let err = Error::not_found(Entity::User, 42);
        assert_eq!(err.to_string(), "user 42 not found");
    }

    #[test]
    fn conflict_is_transparent() {
        let err = Error::from(Conflict::UserEmail);
        assert_eq!(err.to_string(), "A user with this email already exists.");
        assert!(matches!(err, Error::Conflict(Conflict::UserEmail)));
    }
}
