//! `PostgreSQL` storage adapter.
//!
//! Constraint names in `sql/schema.sql` are part of the contract: unique and
//! foreign-key violations are mapped to [`Conflict`] by name, so renaming a
//! constraint there means updating [`classify`] here.

use crate::{
    model::{
        NewOrganization, NewUser, Organization, OrganizationChanges, OrganizationFilter, Page,
        PageRequest, User, UserChanges, UserFilter,
    },
    store::{like_pattern, Store},
    Conflict, Error, Result,
};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Postgres, QueryBuilder, Row,
};
use std::time::Duration;
use tracing::{debug, info_span, instrument, Instrument};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const ORGANIZATION_COLUMNS: &str = "id, name, slug, description, address, support_email, \
     phone, alt_phone, website, timezone, language, status, max_coordinators, \
     pending_requests, created_at, updated_at";

const USER_COLUMNS: &str = "u.id, u.organization_id, o.name AS organization_name, \
     o.slug AS organization_slug, u.name, u.email, u.role, u.phone, u.timezone, u.created_at, \
     u.updated_at";

const TOUCH_UPDATED_AT: &str = "updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens a connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if no connection can be established.
    pub async fn connect(dsn: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Applies `sql/schema.sql` in a single transaction.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn apply_schema(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to start schema transaction")?;

        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        tx.commit().await.context("failed to commit schema")?;
        debug!("schema applied");

        Ok(())
    }

    /// Runs `count` and `select` in one read-only `REPEATABLE READ`
    /// transaction so `total` and `items` come from the same snapshot.
    async fn fetch_page<T>(
        &self,
        mut count: QueryBuilder<'_, Postgres>,
        mut select: QueryBuilder<'_, Postgres>,
        page: PageRequest,
        decode: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> Result<Page<T>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 = count.build().fetch_one(&mut *tx).await?.try_get(0)?;
        let rows = select.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let items = rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            offset: page.offset,
            limit: page.limit,
        })
    }
}

/// Splits a schema file into individual statements on trailing `;`,
/// dropping `--` comment lines. Statements must not nest semicolons.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Maps constraint violations to [`Conflict`]; `on_foreign_key` names the
/// conflict a foreign-key failure means for the calling operation.
fn classify(err: sqlx::Error, on_foreign_key: Conflict) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        let conflict = match (db_err.code().as_deref(), db_err.constraint()) {
            (Some(UNIQUE_VIOLATION), Some("organizations_name_key")) => {
                Some(Conflict::OrganizationName)
            }
            (Some(UNIQUE_VIOLATION), Some("organizations_slug_key")) => {
                Some(Conflict::OrganizationSlug)
            }
            (Some(UNIQUE_VIOLATION), Some("users_email_key")) => Some(Conflict::UserEmail),
            (Some(FOREIGN_KEY_VIOLATION), _) => Some(on_foreign_key),
            _ => None,
        };
        if let Some(conflict) = conflict {
            return conflict.into();
        }
    }
    Error::Database(err)
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn organization_from_row(row: &PgRow) -> Result<Organization, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        support_email: row.try_get("support_email")?,
        phone: row.try_get("phone")?,
        alt_phone: row.try_get("alt_phone")?,
        website: row.try_get("website")?,
        timezone: row.try_get("timezone")?,
        language: row.try_get("language")?,
        status: status.parse().map_err(decode_err)?,
        max_coordinators: row.try_get("max_coordinators")?,
        pending_requests: row.try_get("pending_requests")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        organization_name: row.try_get("organization_name")?,
        organization_slug: row.try_get("organization_slug")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role.parse().map_err(decode_err)?,
        phone: row.try_get("phone")?,
        timezone: row.try_get("timezone")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, column: &str, page: PageRequest) {
    builder
        .push(" ORDER BY ")
        .push(column)
        .push(" ")
        .push(page.order.as_sql())
        .push(" LIMIT ")
        .push_bind(to_i64(page.limit))
        .push(" OFFSET ")
        .push_bind(to_i64(page.offset));
}

fn push_organization_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrganizationFilter) {
    builder.push(" WHERE TRUE");
    if let Some(name) = filter.name.as_deref() {
        builder.push(" AND name ILIKE ").push_bind(like_pattern(name));
    }
    if let Some(q) = filter.q.as_deref() {
        let pattern = like_pattern(q);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR slug ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE TRUE");
    if let Some(name) = filter.name.as_deref() {
        builder.push(" AND u.name ILIKE ").push_bind(like_pattern(name));
    }
    if let Some(email) = filter.email.as_deref() {
        builder.push(" AND u.email ILIKE ").push_bind(like_pattern(email));
    }
    if let Some(organization_id) = filter.organization_id {
        builder
            .push(" AND u.organization_id = ")
            .push_bind(organization_id);
    }
    if let Some(role) = filter.role {
        builder.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(q) = filter.q.as_deref() {
        let pattern = like_pattern(q);
        builder
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn insert_organization(&self, new: NewOrganization) -> Result<Organization> {
        let query = format!(
            r"
            INSERT INTO organizations (
                name, slug, description, address, support_email, phone, alt_phone,
                website, timezone, language, status, max_coordinators, pending_requests
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORGANIZATION_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description)
            .bind(&new.address)
            .bind(&new.support_email)
            .bind(&new.phone)
            .bind(&new.alt_phone)
            .bind(&new.website)
            .bind(&new.timezone)
            .bind(&new.language)
            .bind(new.status.as_str())
            .bind(new.max_coordinators)
            .bind(new.pending_requests)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify(err, Conflict::MissingOrganization))?;

        Ok(organization_from_row(&row)?)
    }

    async fn fetch_organization(&self, id: i64) -> Result<Option<Organization>> {
        let query = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(organization_from_row).transpose()?)
    }

    async fn list_organizations(
        &self,
        filter: &OrganizationFilter,
        page: PageRequest,
    ) -> Result<Page<Organization>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM organizations");
        push_organization_filter(&mut count, filter);

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(ORGANIZATION_COLUMNS).push(" FROM organizations");
        push_organization_filter(&mut select, filter);
        push_page(&mut select, "id", page);

        self.fetch_page(count, select, page, organization_from_row)
            .await
    }

    #[instrument(skip(self, changes))]
    async fn update_organization(
        &self,
        id: i64,
        changes: OrganizationChanges,
    ) -> Result<Option<Organization>> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE organizations SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(slug) = changes.slug {
            set.push("slug = ").push_bind_unseparated(slug);
        }
        if let Some(value) = changes.description {
            set.push("description = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.address {
            set.push("address = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.support_email {
            set.push("support_email = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.phone {
            set.push("phone = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.alt_phone {
            set.push("alt_phone = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.website {
            set.push("website = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.timezone {
            set.push("timezone = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.language {
            set.push("language = ").push_bind_unseparated(value);
        }
        if let Some(status) = changes.status {
            set.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(max) = changes.max_coordinators {
            set.push("max_coordinators = ").push_bind_unseparated(max);
        }
        if let Some(pending) = changes.pending_requests {
            set.push("pending_requests = ").push_bind_unseparated(pending);
        }
        set.push(TOUCH_UPDATED_AT);

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(ORGANIZATION_COLUMNS);

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| classify(err, Conflict::MissingOrganization))?;

        Ok(row.as_ref().map(organization_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn delete_organization(&self, id: i64, cascade: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if cascade {
            let removed = sqlx::query("DELETE FROM users WHERE organization_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            debug!("cascade removed {} users", removed.rows_affected());
        }

        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|err| classify(err, Conflict::OrganizationHasUsers))?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_organizations(&self) -> Result<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM organizations")
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    #[instrument(skip(self, new), fields(organization_id = new.organization_id))]
    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let query = format!(
            r"
            WITH u AS (
                INSERT INTO users (organization_id, name, email, role, phone, timezone)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {USER_COLUMNS}
            FROM u JOIN organizations o ON o.id = u.organization_id
            "
        );
        let row = sqlx::query(&query)
            .bind(new.organization_id)
            .bind(&new.name)
            .bind(&new.email)
            .bind(new.role.as_str())
            .bind(&new.phone)
            .bind(&new.timezone)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify(err, Conflict::MissingOrganization))?;

        Ok(user_from_row(&row)?)
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN organizations o ON o.id = u.organization_id \
             WHERE u.id = $1"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM users u JOIN organizations o ON o.id = u.organization_id",
        );
        push_user_filter(&mut count, filter);

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select
            .push(USER_COLUMNS)
            .push(" FROM users u JOIN organizations o ON o.id = u.organization_id");
        push_user_filter(&mut select, filter);
        push_page(&mut select, "u.id", page);

        self.fetch_page(count, select, page, user_from_row).await
    }

    #[instrument(skip(self, changes))]
    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<Option<User>> {
        let mut builder = QueryBuilder::<Postgres>::new("WITH u AS (UPDATE users SET ");
        let mut set = builder.separated(", ");
        if let Some(organization_id) = changes.organization_id {
            set.push("organization_id = ")
                .push_bind_unseparated(organization_id);
        }
        if let Some(name) = changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = changes.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(role) = changes.role {
            set.push("role = ").push_bind_unseparated(role.as_str());
        }
        if let Some(value) = changes.phone {
            set.push("phone = ").push_bind_unseparated(value);
        }
        if let Some(value) = changes.timezone {
            set.push("timezone = ").push_bind_unseparated(value);
        }
        set.push(TOUCH_UPDATED_AT);

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *) SELECT ")
            .push(USER_COLUMNS)
            .push(" FROM u JOIN organizations o ON o.id = u.organization_id");

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| classify(err, Conflict::MissingOrganization))?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
