//! # Roster (Organization & User directory)
//!
//! `roster` is a small REST service that keeps a directory of organizations
//! and the users that belong to them.
//!
//! ## Layers
//!
//! - [`store`]: the storage contract ([`store::Store`]) with a PostgreSQL
//!   adapter and an in-process memory adapter.
//! - [`service`]: validation and business rules for organizations and users.
//! - [`roster`]: the axum router, handlers and `OpenAPI` document.
//! - [`cli`]: configuration, telemetry and server start-up.
//!
//! ## Invariants
//!
//! - Organization names and slugs are unique, user emails are unique
//!   (stored lowercased).
//! - A user always references an existing organization. Deleting an
//!   organization that still has users is rejected unless the caller asks for
//!   a cascade.
//! - Ids are assigned by the store and never reused.

pub mod cli;
pub mod error;
pub mod model;
pub mod roster;
pub mod service;
pub mod store;

pub use error::{Conflict, Entity, Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
