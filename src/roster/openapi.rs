use super::handlers::{health, organizations, users};
use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        organizations::list,
        organizations::create,
        organizations::get,
        organizations::update,
        organizations::set_status,
        organizations::delete,
        users::list,
        users::create,
        users::get,
        users::update,
        users::delete,
    ),
    tags(
        (name = "health", description = "Service and store liveness"),
        (name = "organizations", description = "Organization directory"),
        (name = "users", description = "Users and their organization")
    )
)]
struct ApiDoc;

/// `OpenAPI` document with the info block taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => {
            let name = author[..start].trim();
            let email = author[start + 1..].trim_end_matches('>').trim();
            (
                Some(name).filter(|s| !s.is_empty()),
                Some(email).filter(|s| !s.is_empty()),
            )
        }
        None => (Some(author.trim()).filter(|s| !s.is_empty()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Roster"));
            assert_eq!(contact.email.as_deref(), Some("team@roster.dev"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_paths() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/organizations",
            "/v1/organizations/{id}",
            "/v1/organizations/{id}/status",
            "/v1/users",
            "/v1/users/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "organizations"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Roster <team@roster.dev>"),
            (Some("Team Roster"), Some("team@roster.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
    }
}
