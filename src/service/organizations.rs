use crate::{
    model::{
        CreateOrganization, NewOrganization, Organization, OrganizationChanges,
        OrganizationFilter, OrganizationStatus, Page, PageRequest, UpdateOrganization,
    },
    service::{
        normalize_filter_text, page_request,
        slug,
        validate::{self, NAME_MAX},
    },
    store::DynStore,
    Conflict, Entity, Error, Result,
};
use tracing::{info, instrument};
use ulid::Ulid;

const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
const DEFAULT_LANGUAGE: &str = "English";
const DEFAULT_MAX_COORDINATORS: i32 = 5;

// Derived slugs get `-2` up to `-50` on collision, then one random suffix.
const SLUG_ATTEMPTS: usize = 50;

/// Validation and business rules for organizations.
#[derive(Clone)]
pub struct OrganizationService {
    store: DynStore,
}

impl OrganizationService {
    #[must_use]
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Creates an organization. When no slug is given one is derived from the
    /// name and de-duplicated with a suffix, so any valid name gets a slug; an
    /// explicit slug that is already taken is a conflict.
    ///
    /// # Errors
    /// `Validation` for missing or malformed fields, `Conflict` when the name
    /// or an explicit slug is taken.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateOrganization) -> Result<Organization> {
        let name = validate::required("name", &input.name, NAME_MAX)?;

        let explicit_slug = input
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let (base_slug, derived) = match explicit_slug {
            Some(explicit) => (parse_slug(explicit)?, false),
            None => (slug::derive(&name), true),
        };

        let mut new = NewOrganization {
            name,
            slug: base_slug.clone(),
            description: validate::optional("description", input.description.as_deref())?,
            address: validate::optional("address", input.address.as_deref())?,
            support_email: validate::optional_email(
                "support_email",
                input.support_email.as_deref(),
            )?,
            phone: validate::optional("phone", input.phone.as_deref())?,
            alt_phone: validate::optional("alt_phone", input.alt_phone.as_deref())?,
            website: validate::optional_website("website", input.website.as_deref())?,
            timezone: validate::optional("timezone", input.timezone.as_deref())?
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            language: validate::optional("language", input.language.as_deref())?
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            status: input.status.unwrap_or_default(),
            max_coordinators: non_negative(
                "max_coordinators",
                input.max_coordinators.unwrap_or(DEFAULT_MAX_COORDINATORS),
            )?,
            pending_requests: non_negative(
                "pending_requests",
                input.pending_requests.unwrap_or_default(),
            )?,
        };

        let mut attempt = 1;
        loop {
            match self.store.insert_organization(new.clone()).await {
                Err(Error::Conflict(Conflict::OrganizationSlug))
                    if derived && attempt <= SLUG_ATTEMPTS =>
                {
                    attempt += 1;
                    new.slug = if attempt <= SLUG_ATTEMPTS {
                        slug::suffixed(&base_slug, attempt)
                    } else {
                        slug::suffixed(&base_slug, Ulid::new().to_string().to_lowercase())
                    };
                }
                Ok(org) => {
                    info!(id = org.id, slug = %org.slug, "organization created");
                    return Ok(org);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// # Errors
    /// `NotFound` when no organization has this id.
    pub async fn get(&self, id: i64) -> Result<Organization> {
        self.store
            .fetch_organization(id)
            .await?
            .ok_or_else(|| Error::not_found(Entity::Organization, id))
    }

    /// Lists organizations matching `filter`, ordered by id.
    ///
    /// # Errors
    /// `Validation` when the page window is out of range.
    pub async fn list(
        &self,
        filter: OrganizationFilter,
        page: PageRequest,
    ) -> Result<Page<Organization>> {
        let page = page_request(page)?;
        let filter = OrganizationFilter {
            name: normalize_filter_text(filter.name),
            q: normalize_filter_text(filter.q),
            status: filter.status,
        };
        self.store.list_organizations(&filter, page).await
    }

    /// Applies a partial update. Absent fields are kept, blank optional
    /// fields are cleared.
    ///
    /// # Errors
    /// `NotFound`, `Validation` (including an empty patch) or `Conflict`.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: UpdateOrganization) -> Result<Organization> {
        let changes = OrganizationChanges {
            name: input
                .name
                .as_deref()
                .map(|name| validate::required("name", name, NAME_MAX))
                .transpose()?,
            slug: input.slug.as_deref().map(parse_slug).transpose()?,
            description: validate::patch(
                "description",
                input.description.as_deref(),
                validate::optional,
            )?,
            address: validate::patch("address", input.address.as_deref(), validate::optional)?,
            support_email: validate::patch(
                "support_email",
                input.support_email.as_deref(),
                validate::optional_email,
            )?,
            phone: validate::patch("phone", input.phone.as_deref(), validate::optional)?,
            alt_phone: validate::patch(
                "alt_phone",
                input.alt_phone.as_deref(),
                validate::optional,
            )?,
            website: validate::patch(
                "website",
                input.website.as_deref(),
                validate::optional_website,
            )?,
            timezone: input
                .timezone
                .as_deref()
                .map(|value| validate::required("timezone", value, NAME_MAX))
                .transpose()?,
            language: input
                .language
                .as_deref()
                .map(|value| validate::required("language", value, NAME_MAX))
                .transpose()?,
            status: input.status,
            max_coordinators: input
                .max_coordinators
                .map(|value| non_negative("max_coordinators", value))
                .transpose()?,
            pending_requests: input
                .pending_requests
                .map(|value| non_negative("pending_requests", value))
                .transpose()?,
        };

        if changes.is_empty() {
            return Err(Error::validation("No updates provided."));
        }

        let org = self
            .store
            .update_organization(id, changes)
            .await?
            .ok_or_else(|| Error::not_found(Entity::Organization, id))?;
        info!(id, "organization updated");
        Ok(org)
    }

    /// # Errors
    /// `NotFound` when no organization has this id.
    pub async fn set_status(&self, id: i64, status: OrganizationStatus) -> Result<Organization> {
        let changes = OrganizationChanges {
            status: Some(status),
            ..OrganizationChanges::default()
        };
        let org = self
            .store
            .update_organization(id, changes)
            .await?
            .ok_or_else(|| Error::not_found(Entity::Organization, id))?;
        info!(id, %status, "organization status changed");
        Ok(org)
    }

    /// Deletes an organization; with `cascade` its users go with it.
    ///
    /// # Errors
    /// `NotFound`, or `Conflict` when users remain and `cascade` is false.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64, cascade: bool) -> Result<()> {
        if !self.store.delete_organization(id, cascade).await? {
            return Err(Error::not_found(Entity::Organization, id));
        }
        info!(id, cascade, "organization deleted");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store cannot be queried.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.store.count_organizations().await? == 0)
    }
}

fn parse_slug(value: &str) -> Result<String> {
    slug::parse(value).ok_or_else(|| {
        Error::validation(format!(
            "slug must have at least {} letters, digits or dashes",
            slug::MIN_LEN
        ))
    })
}

fn non_negative(field: &str, value: i32) -> Result<i32> {
    if value < 0 {
        return Err(Error::validation(format!("{field} must not be negative")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{CreateUser, SortOrder},
        service::UserService,
        store::{DynStore, MemoryStore},
    };
    use std::sync::Arc;

    fn service() -> OrganizationService {
        OrganizationService::new(Arc::new(MemoryStore::new()))
    }

    fn named(name: &str) -> CreateOrganization {
        CreateOrganization {
            name: name.to_string(),
            ..CreateOrganization::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() -> Result<()> {
        let service = service();
        let org = service.create(named("  Massachusetts Institute of Technology ")).await?;
        assert!(org.id > 0);
        assert_eq!(org.name, "Massachusetts Institute of Technology");
        assert_eq!(org.slug, "massachusetts-institute-of-technology");
        assert_eq!(org.timezone, DEFAULT_TIMEZONE);
        assert_eq!(org.language, DEFAULT_LANGUAGE);
        assert_eq!(org.status, OrganizationStatus::Active);
        assert_eq!(org.max_coordinators, DEFAULT_MAX_COORDINATORS);
        assert_eq!(org.pending_requests, 0);
        assert_eq!(org.created_at, org.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn create_requires_name() {
        let err = service().create(named("   ")).await;
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn create_rejects_malformed_fields() {
        let service = service();
        let input = CreateOrganization {
            support_email: Some("not-an-email".to_string()),
            ..named("Acme")
        };
        assert!(matches!(service.create(input).await, Err(Error::Validation(_))));

        let input = CreateOrganization {
            website: Some("acme.example".to_string()),
            ..named("Acme")
        };
        assert!(matches!(service.create(input).await, Err(Error::Validation(_))));

        let input = CreateOrganization {
            max_coordinators: Some(-1),
            ..named("Acme")
        };
        assert!(matches!(service.create(input).await, Err(Error::Validation(_))));

        let input = CreateOrganization {
            pending_requests: Some(-3),
            ..named("Acme")
        };
        assert!(matches!(service.create(input).await, Err(Error::Validation(_))));

        let input = CreateOrganization {
            slug: Some("ab".to_string()),
            ..named("Acme")
        };
        assert!(matches!(service.create(input).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn create_keeps_pending_requests() -> Result<()> {
        let org = service()
            .create(CreateOrganization {
                pending_requests: Some(45),
                ..named("GITAM")
            })
            .await?;
        assert_eq!(org.pending_requests, 45);
        Ok(())
    }

    #[tokio::test]
    async fn short_and_non_ascii_names_get_a_slug() -> Result<()> {
        let service = service();
        let hp = service.create(named("HP")).await?;
        assert_eq!(hp.name, "HP");
        assert_eq!(hp.slug, "hp-org");

        let three_m = service.create(named("3M")).await?;
        assert_eq!(three_m.slug, "3m-org");

        let tokyo = service.create(named("東京大学")).await?;
        assert_eq!(tokyo.name, "東京大学");
        assert_eq!(tokyo.slug, "org");

        let olympia = service.create(named("Ὀλυμπία")).await?;
        assert_eq!(olympia.slug, "org-2");
        assert_eq!(service.get(olympia.id).await?, olympia);
        Ok(())
    }

    #[tokio::test]
    async fn derived_slug_never_runs_out() -> Result<()> {
        let service = service();
        let mut last = None;
        for index in 1..=SLUG_ATTEMPTS + 1 {
            last = Some(service.create(named(&format!("Acme{}", "!".repeat(index)))).await?);
        }
        let slugs = service
            .list(
                OrganizationFilter::default(),
                PageRequest {
                    limit: 3,
                    ..PageRequest::default()
                },
            )
            .await?;
        assert_eq!(
            slugs.items.iter().map(|o| o.slug.as_str()).collect::<Vec<_>>(),
            ["acme", "acme-2", "acme-3"]
        );

        let last = last.map(|org| org.slug).unwrap_or_default();
        assert!(last.starts_with("acme-"), "{last}");
        assert_eq!(last.len(), "acme-".len() + 26);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() -> Result<()> {
        let service = service();
        service.create(named("Acme")).await?;
        let err = service.create(named("Acme")).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationName))));
        Ok(())
    }

    #[tokio::test]
    async fn derived_slug_is_suffixed() -> Result<()> {
        let service = service();
        let first = service.create(named("Acme Corp")).await?;
        let second = service.create(named("acme   corp")).await?;
        let third = service.create(named("ACME corp!")).await?;
        assert_eq!(first.slug, "acme-corp");
        assert_eq!(second.slug, "acme-corp-2");
        assert_eq!(third.slug, "acme-corp-3");
        Ok(())
    }

    #[tokio::test]
    async fn explicit_slug_conflicts() -> Result<()> {
        let service = service();
        service.create(named("Acme Corp")).await?;
        let input = CreateOrganization {
            slug: Some("Acme-Corp".to_string()),
            ..named("Other")
        };
        let err = service.create(input).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationSlug))));
        Ok(())
    }

    #[tokio::test]
    async fn get_after_create_matches() -> Result<()> {
        let service = service();
        let input = CreateOrganization {
            description: Some("Research university".to_string()),
            support_email: Some("Support@MIT.edu".to_string()),
            website: Some("https://mit.edu".to_string()),
            ..named("MIT")
        };
        let created = service.create(input).await?;
        assert_eq!(created.support_email.as_deref(), Some("support@mit.edu"));
        assert_eq!(service.get(created.id).await?, created);
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let err = service().get(7).await;
        assert!(matches!(
            err,
            Err(Error::NotFound {
                entity: Entity::Organization,
                id: 7
            })
        ));
    }

    #[tokio::test]
    async fn update_preserves_identity() -> Result<()> {
        let service = service();
        let created = service
            .create(CreateOrganization {
                phone: Some("+1-617-253-1000".to_string()),
                ..named("MIT")
            })
            .await?;

        let patch = UpdateOrganization {
            name: Some("MIT Media Lab".to_string()),
            phone: Some(String::new()),
            ..UpdateOrganization::default()
        };
        let updated = service.update(created.id, patch).await?;
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.name, "MIT Media Lab");
        assert_eq!(updated.slug, created.slug);
        assert_eq!(updated.phone, None);
        assert_eq!(service.get(created.id).await?, updated);
        Ok(())
    }

    #[tokio::test]
    async fn update_validates() -> Result<()> {
        let service = service();
        let created = service.create(named("MIT")).await?;
        service.create(named("GITAM")).await?;

        let err = service
            .update(created.id, UpdateOrganization::default())
            .await;
        assert!(matches!(err, Err(Error::Validation(_))));

        let patch = UpdateOrganization {
            name: Some(String::new()),
            ..UpdateOrganization::default()
        };
        assert!(matches!(
            service.update(created.id, patch).await,
            Err(Error::Validation(_))
        ));

        let patch = UpdateOrganization {
            name: Some("GITAM".to_string()),
            ..UpdateOrganization::default()
        };
        assert!(matches!(
            service.update(created.id, patch).await,
            Err(Error::Conflict(Conflict::OrganizationName))
        ));

        let patch = UpdateOrganization {
            status: Some(OrganizationStatus::Inactive),
            ..UpdateOrganization::default()
        };
        assert!(matches!(
            service.update(999, patch).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn set_status_changes_only_status() -> Result<()> {
        let service = service();
        let created = service.create(named("MIT")).await?;
        let updated = service
            .set_status(created.id, OrganizationStatus::Inactive)
            .await?;
        assert_eq!(updated.status, OrganizationStatus::Inactive);
        assert_eq!(updated.name, created.name);
        Ok(())
    }

    #[tokio::test]
    async fn list_filters_by_name_substring_in_id_order() -> Result<()> {
        let service = service();
        for name in ["Institute of Art", "GITAM", "MIT Institute", "Harvard"] {
            service.create(named(name)).await?;
        }

        let filter = OrganizationFilter {
            name: Some("institute".to_string()),
            ..OrganizationFilter::default()
        };
        let page = service.list(filter, PageRequest::default()).await?;
        let names: Vec<_> = page.items.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Institute of Art", "MIT Institute"]);
        assert!(page.items.windows(2).all(|w| w[0].id < w[1].id));
        Ok(())
    }

    #[tokio::test]
    async fn list_can_be_walked_and_restarted() -> Result<()> {
        let service = service();
        for index in 0..5 {
            service.create(named(&format!("Org {index}"))).await?;
        }

        let first = PageRequest {
            offset: 0,
            limit: 2,
            order: SortOrder::Asc,
        };
        let mut seen = Vec::new();
        let mut request = Some(first);
        while let Some(page_request) = request {
            let page = service
                .list(OrganizationFilter::default(), page_request)
                .await?;
            seen.extend(page.items.iter().map(|o| o.id));
            request = page.next(page_request.order);
        }
        assert_eq!(seen.len(), 5);

        let again = service.list(OrganizationFilter::default(), first).await?;
        assert_eq!(again.items.first().map(|o| o.id), seen.first().copied());
        Ok(())
    }

    #[tokio::test]
    async fn list_rejects_bad_window() {
        let page = PageRequest {
            limit: 0,
            ..PageRequest::default()
        };
        let err = service().list(OrganizationFilter::default(), page).await;
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn delete_after_removing_users() -> Result<()> {
        let store: DynStore = Arc::new(MemoryStore::new());
        let service = OrganizationService::new(store.clone());
        let users = UserService::new(store);

        let org = service.create(named("GITAM")).await?;
        let mut ids = Vec::new();
        for email in ["dave@gitam.in", "abhishek@gitam.in"] {
            let user = users
                .create(CreateUser {
                    organization_id: Some(org.id),
                    name: "Staff".to_string(),
                    email: email.to_string(),
                    ..CreateUser::default()
                })
                .await?;
            ids.push(user.id);
        }

        let err = service.delete(org.id, false).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationHasUsers))));
        assert_eq!(service.get(org.id).await?, org);

        for id in ids {
            users.delete(id).await?;
        }
        service.delete(org.id, false).await?;
        assert!(matches!(
            service.get(org.id).await,
            Err(Error::NotFound {
                entity: Entity::Organization,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let err = service().delete(1, false).await;
        assert!(matches!(err, Err(Error::NotFound { .. })));
    }
}
