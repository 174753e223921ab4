//! Entity records, request payloads and storage inputs.
//!
//! Request payloads (`Create*`, `Update*`, filters) are deserialized straight
//! from HTTP and validated by the services, which then hand the normalized
//! `New*` / `*Changes` values to the store.

pub mod organization;
pub mod page;
pub mod user;

pub use self::organization::{
    CreateOrganization, NewOrganization, Organization, OrganizationChanges, OrganizationFilter,
    OrganizationStatus, SetOrganizationStatus, UpdateOrganization,
};
pub use self::page::{Page, PageRequest, SortOrder};
pub use self::user::{CreateUser, NewUser, UpdateUser, User, UserChanges, UserFilter, UserRole};
