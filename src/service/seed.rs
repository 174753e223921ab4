//! Sample directory loaded into an empty store with `--seed`.

use crate::{
    model::{CreateOrganization, CreateUser, Organization, UserRole},
    service::{OrganizationService, UserService},
    Result,
};
use tracing::info;

fn organization(
    name: &str,
    slug: &str,
    support_email: &str,
    phone: &str,
    alt_phone: &str,
    website: &str,
    timezone: &str,
) -> CreateOrganization {
    CreateOrganization {
        name: name.to_string(),
        slug: Some(slug.to_string()),
        support_email: Some(support_email.to_string()),
        phone: Some(phone.to_string()),
        alt_phone: Some(alt_phone.to_string()),
        website: Some(website.to_string()),
        timezone: Some(timezone.to_string()),
        language: Some("English".to_string()),
        max_coordinators: Some(5),
        pending_requests: Some(45),
        ..CreateOrganization::default()
    }
}

fn user(org: &Organization, name: &str, email: &str, role: UserRole, phone: &str) -> CreateUser {
    CreateUser {
        organization_id: Some(org.id),
        name: name.to_string(),
        email: email.to_string(),
        role: Some(role),
        phone: Some(phone.to_string()),
        timezone: Some(org.timezone.clone()),
    }
}

/// Inserts two organizations and three users when no organization exists yet.
/// Returns whether anything was inserted.
///
/// # Errors
/// Returns an error if the store rejects any of the records.
pub async fn seed(organizations: &OrganizationService, users: &UserService) -> Result<bool> {
    if !organizations.is_empty().await? {
        return Ok(false);
    }

    let mit = organizations
        .create(organization(
            "Massachusetts Institute of Technology",
            "mit",
            "support@mit.edu",
            "+1-617-253-1000",
            "+1-617-253-9999",
            "https://mit.edu",
            "America/New_York",
        ))
        .await?;
    let gitam = organizations
        .create(organization(
            "GITAM Institute of Technology",
            "gitam",
            "gitam@gitam.in",
            "+91-9676456543",
            "+91-93473294913",
            "https://gitam.edu",
            "Asia/Kolkata",
        ))
        .await?;

    for input in [
        user(
            &gitam,
            "Dave Richards",
            "dave.richards@example.com",
            UserRole::Admin,
            "+91-9000000001",
        ),
        user(
            &gitam,
            "Abhishek Hari",
            "abhishek.hari@example.com",
            UserRole::Coordinator,
            "+91-9000000002",
        ),
        user(
            &mit,
            "Nishta Gupta",
            "nishta.gupta@example.com",
            UserRole::Admin,
            "+1-617-0000003",
        ),
    ] {
        users.create(input).await?;
    }

    info!("seeded sample organizations and users");
    Ok(true)
}
