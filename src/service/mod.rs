//! Business rules between the HTTP handlers and the store.

pub mod organizations;
pub mod seed;
pub mod slug;
pub mod users;
pub mod validate;

pub use self::{organizations::OrganizationService, seed::seed, users::UserService};

use crate::{
    model::{page::MAX_LIMIT, PageRequest},
    store::DynStore,
    Error, Result,
};

/// Both entity services over one store.
#[derive(Clone)]
pub struct Services {
    pub organizations: OrganizationService,
    pub users: UserService,
}

impl Services {
    #[must_use]
    pub fn new(store: &DynStore) -> Self {
        Self {
            organizations: OrganizationService::new(store.clone()),
            users: UserService::new(store.clone()),
        }
    }
}

pub(crate) fn page_request(page: PageRequest) -> Result<PageRequest> {
    if !(1..=MAX_LIMIT).contains(&page.limit) {
        return Err(Error::validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(page)
}

/// Blank filter text matches everything.
pub(crate) fn normalize_filter_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
