//! In-process store backed by ordered maps behind a mutex.
//!
//! It enforces the same constraints as the `PostgreSQL` schema: unique
//! organization names/slugs, unique user emails, users referencing existing
//! organizations, and ids that are never handed out twice.

use crate::{
    model::{
        NewOrganization, NewUser, Organization, OrganizationChanges, OrganizationFilter, Page,
        PageRequest, SortOrder, User, UserChanges, UserFilter,
    },
    store::{contains_ci, Store},
    Conflict, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default)]
struct State {
    organizations: BTreeMap<i64, Organization>,
    users: BTreeMap<i64, User>,
    last_organization_id: i64,
    last_user_id: i64,
}

impl State {
    /// Returns the user with its organization name and slug resolved.
    fn joined(&self, user: &User) -> User {
        let mut user = user.clone();
        if let Some(org) = self.organizations.get(&user.organization_id) {
            user.organization_name.clone_from(&org.name);
            user.organization_slug.clone_from(&org.slug);
        }
        user
    }

    fn org_conflict(&self, id: Option<i64>, name: &str, slug: &str) -> Option<Conflict> {
        let others = self
            .organizations
            .values()
            .filter(|org| Some(org.id) != id);
        for org in others {
            if org.name == name {
                return Some(Conflict::OrganizationName);
            }
            if org.slug == slug {
                return Some(Conflict::OrganizationSlug);
            }
        }
        None
    }

    fn user_conflict(&self, id: Option<i64>, organization_id: i64, email: &str) -> Option<Conflict> {
        if !self.organizations.contains_key(&organization_id) {
            return Some(Conflict::MissingOrganization);
        }
        self.users
            .values()
            .any(|user| Some(user.id) != id && user.email == email)
            .then_some(Conflict::UserEmail)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Next `updated_at`, strictly after the previous one.
fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    if page.order == SortOrder::Desc {
        items.reverse();
    }
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
        .collect();
    Page {
        items,
        total,
        offset: page.offset,
        limit: page.limit,
    }
}

fn organization_matches(org: &Organization, filter: &OrganizationFilter) -> bool {
    if let Some(name) = &filter.name {
        if !contains_ci(&org.name, name) {
            return false;
        }
    }
    if let Some(q) = &filter.q {
        if !contains_ci(&org.name, q) && !contains_ci(&org.slug, q) {
            return false;
        }
    }
    filter.status.map_or(true, |status| org.status == status)
}

fn user_matches(user: &User, filter: &UserFilter) -> bool {
    if let Some(name) = &filter.name {
        if !contains_ci(&user.name, name) {
            return false;
        }
    }
    if let Some(email) = &filter.email {
        if !contains_ci(&user.email, email) {
            return false;
        }
    }
    if let Some(q) = &filter.q {
        if !contains_ci(&user.name, q)
            && !contains_ci(&user.email, q)
            && !contains_ci(&user.organization_name, q)
        {
            return false;
        }
    }
    if filter
        .organization_id
        .is_some_and(|id| user.organization_id != id)
    {
        return false;
    }
    filter.role.map_or(true, |role| user.role == role)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_organization(&self, new: NewOrganization) -> Result<Organization> {
        let mut state = self.state();
        if let Some(conflict) = state.org_conflict(None, &new.name, &new.slug) {
            return Err(conflict.into());
        }

        state.last_organization_id += 1;
        let now = Utc::now();
        let org = Organization {
            id: state.last_organization_id,
            name: new.name,
            slug: new.slug,
            description: new.description,
            address: new.address,
            support_email: new.support_email,
            phone: new.phone,
            alt_phone: new.alt_phone,
            website: new.website,
            timezone: new.timezone,
            language: new.language,
            status: new.status,
            max_coordinators: new.max_coordinators,
            pending_requests: new.pending_requests,
            created_at: now,
            updated_at: now,
        };
        state.organizations.insert(org.id, org.clone());
        Ok(org)
    }

    async fn fetch_organization(&self, id: i64) -> Result<Option<Organization>> {
        Ok(self.state().organizations.get(&id).cloned())
    }

    async fn list_organizations(
        &self,
        filter: &OrganizationFilter,
        page: PageRequest,
    ) -> Result<Page<Organization>> {
        let state = self.state();
        let matches = state
            .organizations
            .values()
            .filter(|org| organization_matches(org, filter))
            .cloned()
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_organization(
        &self,
        id: i64,
        changes: OrganizationChanges,
    ) -> Result<Option<Organization>> {
        let mut state = self.state();
        let Some(mut org) = state.organizations.get(&id).cloned() else {
            return Ok(None);
        };

        changes.apply_to(&mut org);
        if let Some(conflict) = state.org_conflict(Some(id), &org.name, &org.slug) {
            return Err(conflict.into());
        }
        org.updated_at = touch(org.updated_at);
        state.organizations.insert(id, org.clone());
        Ok(Some(org))
    }

    async fn delete_organization(&self, id: i64, cascade: bool) -> Result<bool> {
        let mut state = self.state();
        if !state.organizations.contains_key(&id) {
            return Ok(false);
        }

        let has_users = state.users.values().any(|user| user.organization_id == id);
        if has_users {
            if !cascade {
                return Err(Conflict::OrganizationHasUsers.into());
            }
            state.users.retain(|_, user| user.organization_id != id);
        }
        state.organizations.remove(&id);
        Ok(true)
    }

    async fn count_organizations(&self) -> Result<u64> {
        Ok(self.state().organizations.len() as u64)
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut state = self.state();
        if let Some(conflict) = state.user_conflict(None, new.organization_id, &new.email) {
            return Err(conflict.into());
        }

        state.last_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.last_user_id,
            organization_id: new.organization_id,
            organization_name: String::new(),
            organization_slug: String::new(),
            name: new.name,
            email: new.email,
            role: new.role,
            phone: new.phone,
            timezone: new.timezone,
            created_at: now,
            updated_at: now,
        };
        let user = state.joined(&user);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>> {
        let state = self.state();
        Ok(state.users.get(&id).map(|user| state.joined(user)))
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>> {
        let state = self.state();
        let matches = state
            .users
            .values()
            .map(|user| state.joined(user))
            .filter(|user| user_matches(user, filter))
            .collect();
        Ok(paginate(matches, page))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<Option<User>> {
        let mut state = self.state();
        let Some(mut user) = state.users.get(&id).cloned() else {
            return Ok(None);
        };

        if let Some(organization_id) = changes.organization_id {
            user.organization_id = organization_id;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(phone) = changes.phone {
            user.phone = phone;
        }
        if let Some(timezone) = changes.timezone {
            user.timezone = timezone;
        }

        if let Some(conflict) = state.user_conflict(Some(id), user.organization_id, &user.email) {
            return Err(conflict.into());
        }
        user.updated_at = touch(user.updated_at);
        let user = state.joined(&user);
        state.users.insert(id, user.clone());
        Ok(Some(user))
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        Ok(self.state().users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{OrganizationStatus, UserRole},
        Error,
    };

    fn new_org(name: &str, slug: &str) -> NewOrganization {
        NewOrganization {
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            address: None,
            support_email: None,
            phone: None,
            alt_phone: None,
            website: None,
            timezone: "UTC".to_string(),
            language: "English".to_string(),
            status: OrganizationStatus::Active,
            max_coordinators: 5,
            pending_requests: 0,
        }
    }

    fn new_user(organization_id: i64, email: &str) -> NewUser {
        NewUser {
            organization_id,
            name: "Dave".to_string(),
            email: email.to_string(),
            role: UserRole::Member,
            phone: None,
            timezone: None,
        }
    }

    #[tokio::test]
    async fn ids_are_not_reused() -> Result<()> {
        let store = MemoryStore::new();
        let first = store.insert_organization(new_org("One", "one")).await?;
        assert!(store.delete_organization(first.id, false).await?);
        let second = store.insert_organization(new_org("Two", "two")).await?;
        assert!(second.id > first.id);
        Ok(())
    }

    #[tokio::test]
    async fn unique_name_and_slug() -> Result<()> {
        let store = MemoryStore::new();
        store.insert_organization(new_org("One", "one")).await?;

        let err = store.insert_organization(new_org("One", "other")).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationName))));

        let err = store.insert_organization(new_org("Other", "one")).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationSlug))));
        Ok(())
    }

    #[tokio::test]
    async fn user_requires_organization() {
        let store = MemoryStore::new();
        let err = store.insert_user(new_user(99, "a@example.com")).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::MissingOrganization))));
    }

    #[tokio::test]
    async fn cascade_delete_removes_users() -> Result<()> {
        let store = MemoryStore::new();
        let org = store.insert_organization(new_org("One", "one")).await?;
        let user = store.insert_user(new_user(org.id, "a@example.com")).await?;

        let err = store.delete_organization(org.id, false).await;
        assert!(matches!(err, Err(Error::Conflict(Conflict::OrganizationHasUsers))));
        assert!(store.fetch_user(user.id).await?.is_some());

        assert!(store.delete_organization(org.id, true).await?);
        assert!(store.fetch_user(user.id).await?.is_none());
        assert!(store.fetch_organization(org.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn user_reads_current_organization_name() -> Result<()> {
        let store = MemoryStore::new();
        let org = store.insert_organization(new_org("One", "one")).await?;
        let user = store.insert_user(new_user(org.id, "a@example.com")).await?;
        assert_eq!(user.organization_name, "One");
        assert_eq!(user.organization_slug, "one");

        let changes = OrganizationChanges {
            name: Some("Renamed".to_string()),
            slug: Some("renamed".to_string()),
            ..OrganizationChanges::default()
        };
        store.update_organization(org.id, changes).await?;

        let fetched = store.fetch_user(user.id).await?;
        assert_eq!(
            fetched.map(|u| (u.organization_name, u.organization_slug)),
            Some(("Renamed".to_string(), "renamed".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn update_refreshes_updated_at_only() -> Result<()> {
        let store = MemoryStore::new();
        let org = store.insert_organization(new_org("One", "one")).await?;
        let changes = OrganizationChanges {
            description: Some(Some("first".to_string())),
            ..OrganizationChanges::default()
        };
        let updated = store.update_organization(org.id, changes).await?;
        let Some(updated) = updated else {
            panic!("organization should exist");
        };
        assert_eq!(updated.created_at, org.created_at);
        assert!(updated.updated_at > org.updated_at);
        assert_eq!(updated.description.as_deref(), Some("first"));
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_and_pages() -> Result<()> {
        let store = MemoryStore::new();
        for (name, slug) in [("Alpha", "alpha"), ("Beta", "beta"), ("Alphabet", "alphabet")] {
            store.insert_organization(new_org(name, slug)).await?;
        }

        let filter = OrganizationFilter {
            name: Some("alpha".to_string()),
            ..OrganizationFilter::default()
        };
        let page = store
            .list_organizations(&filter, PageRequest::default())
            .await?;
        let names: Vec<_> = page.items.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Alphabet"]);
        assert_eq!(page.total, 2);

        let desc = PageRequest {
            offset: 1,
            limit: 1,
            order: SortOrder::Desc,
        };
        let page = store
            .list_organizations(&OrganizationFilter::default(), desc)
            .await?;
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Beta");
        Ok(())
    }
}
