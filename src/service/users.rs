use crate::{
    model::{CreateUser, NewUser, Page, PageRequest, UpdateUser, User, UserChanges, UserFilter},
    service::{
        normalize_filter_text, page_request,
        validate::{self, NAME_MAX},
    },
    store::DynStore,
    Entity, Error, Result,
};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct UserService {
    store: DynStore,
}

impl UserService {
    #[must_use]
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Creates a user inside an existing organization.
    ///
    /// # Errors
    /// `Validation` for missing or malformed fields, `Conflict` when the email
    /// is taken or the organization does not exist.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateUser) -> Result<User> {
        let organization_id = input
            .organization_id
            .ok_or_else(|| Error::validation("organization_id is required"))?;
        let new = NewUser {
            organization_id: validate::positive_id("organization_id", organization_id)?,
            name: validate::required("name", &input.name, NAME_MAX)?,
            email: validate::email("email", &input.email)?,
            role: input.role.unwrap_or_default(),
            phone: validate::optional("phone", input.phone.as_deref())?,
            timezone: validate::optional("timezone", input.timezone.as_deref())?,
        };

        let user = self.store.insert_user(new).await?;
        info!(id = user.id, organization_id = user.organization_id, "user created");
        Ok(user)
    }

    /// # Errors
    /// `NotFound` when no user has this id.
    pub async fn get(&self, id: i64) -> Result<User> {
        self.store
            .fetch_user(id)
            .await?
            .ok_or_else(|| Error::not_found(Entity::User, id))
    }

    /// # Errors
    /// `Validation` when the page window is out of range.
    pub async fn list(&self, filter: UserFilter, page: PageRequest) -> Result<Page<User>> {
        let page = page_request(page)?;
        let filter = UserFilter {
            name: normalize_filter_text(filter.name),
            email: normalize_filter_text(filter.email),
            organization_id: filter.organization_id,
            role: filter.role,
            q: normalize_filter_text(filter.q),
        };
        self.store.list_users(&filter, page).await
    }

    /// # Errors
    /// `NotFound`, `Validation` (including an empty patch) or `Conflict`.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: UpdateUser) -> Result<User> {
        let changes = UserChanges {
            organization_id: input
                .organization_id
                .map(|org| validate::positive_id("organization_id", org))
                .transpose()?,
            name: input
                .name
                .as_deref()
                .map(|name| validate::required("name", name, NAME_MAX))
                .transpose()?,
            email: input
                .email
                .as_deref()
                .map(|email| validate::email("email", email))
                .transpose()?,
            role: input.role,
            phone: validate::patch("phone", input.phone.as_deref(), validate::optional)?,
            timezone: validate::patch("timezone", input.timezone.as_deref(), validate::optional)?,
        };

        if changes.is_empty() {
            return Err(Error::validation("No updates provided."));
        }

        let user = self
            .store
            .update_user(id, changes)
            .await?
            .ok_or_else(|| Error::not_found(Entity::User, id))?;
        info!(id, "user updated");
        Ok(user)
    }

    /// # Errors
    /// `NotFound` when no user has this id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(Error::not_found(Entity::User, id));
        }
        info!(id, "user deleted");
        Ok(())
    }
}
