//! PostgreSQL credential store.
//!
//! Tables are created on start; invariants (unique names, unique membership
//! pairs, cascading deletes) live in the schema so concurrent writers are
//! settled by the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use super::{CredentialStore, StoreError};
use crate::models::{
    Account, AccountFilter, AccountMember, AccountPatch, AccountUser, Group, GroupFilter, GroupMembership, GroupRef, GroupUpdate, Member, Membership, Resource,
    ResourcePatch, ResourceUsage, Service, UsageFilter, User, UserPatch,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        numeric_id BIGSERIAL UNIQUE,
        dom_name TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        logon_name TEXT NOT NULL UNIQUE,
        seed TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id UUID PRIMARY KEY,
        numeric_id BIGSERIAL UNIQUE,
        name TEXT NOT NULL UNIQUE,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        group_id UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        admin BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (group_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        principal_investigator TEXT,
        faculty TEXT,
        department TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_users (
        account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        admin BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (account_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        access TEXT NOT NULL UNIQUE,
        secret_digest TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resources (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_groups (
        resource_id UUID NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
        group_id UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        PRIMARY KEY (resource_id, group_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_usage (
        id UUID PRIMARY KEY,
        resource_id UUID NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        start_utc TIMESTAMPTZ NOT NULL,
        end_utc TIMESTAMPTZ NOT NULL,
        metrics JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS resource_usage_lookup ON resource_usage (resource_id, user_id, start_utc)",
];

#[derive(FromRow)]
struct UsageRow {
    id: Uuid,
    resource_id: Uuid,
    user_id: Uuid,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    metrics: Json<BTreeMap<String, f64>>,
    created_at: DateTime<Utc>,
}

impl From<UsageRow> for ResourceUsage {
    fn from(row: UsageRow) -> Self {
        Self {
            id: row.id,
            resource_id: row.resource_id,
            user_id: row.user_id,
            start: row.start_utc,
            end: row.end_utc,
            metrics: row.metrics.0,
            created_at: row.created_at,
        }
    }
}

/// Maps driver errors onto the store taxonomy. `what` names the entity for
/// conflict and not-found messages.
fn map_err(what: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(what.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::NotFound(format!("entity referenced by {}", what))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(what.to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            tracing::error!(error = %e, entity = what, "Database unreachable");
            StoreError::Unavailable(e.to_string())
        }
        _ => {
            tracing::error!(error = %e, entity = what, "Database error");
            StoreError::Internal(anyhow::anyhow!(e))
        }
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(url)
            .await
            .map_err(map_err("connection"))?;

        tracing::info!("Successfully connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Creates any missing tables. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_err("schema"))?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_err("health check"))?;
        Ok(())
    }

    // ==================== Users ====================

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, dom_name, full_name, logon_name, seed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.dom_name)
        .bind(&user.full_name)
        .bind(&user.logon_name)
        .bind(&user.seed)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err("user"))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("user"))
    }

    async fn find_user_by_dom_name(&self, dom_name: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE dom_name = $1")
            .bind(dom_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("user"))
    }

    async fn find_user_by_logon_name(&self, logon_name: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE logon_name = $1")
            .bind(logon_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("user"))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY dom_name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err("user"))
    }

    async fn logon_names_like(&self, candidate: &str) -> Result<HashSet<String>, StoreError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT logon_name FROM users WHERE logon_name = $1 OR left(logon_name, length($2)) = $2",
        )
        .bind(candidate)
        .bind(format!("{}.", candidate))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("user"))?;

        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name), updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.full_name.as_deref())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("user"))?
        .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    async fn set_user_seed(&self, id: Uuid, seed: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET seed = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(seed)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("user"))?
        .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err("user"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".to_string()));
        }
        Ok(())
    }

    // ==================== Groups ====================

    async fn insert_group(&self, group: Group) -> Result<Group, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (id, name, active, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.active)
        .bind(group.owner_id)
        .bind(group.created_at)
        .bind(group.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err("group"))
    }

    async fn find_group(&self, group: &GroupRef) -> Result<Option<Group>, StoreError> {
        let query = match group {
            GroupRef::Id(id) => sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = $1").bind(*id),
            GroupRef::Name(name) => {
                sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE name = $1").bind(name.clone())
            }
        };
        query.fetch_optional(&self.pool).await.map_err(map_err("group"))
    }

    async fn list_groups(&self, filter: GroupFilter) -> Result<Vec<Group>, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM groups g
            WHERE ($1 = FALSE OR g.active)
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM memberships m WHERE m.group_id = g.id AND m.user_id = $2))
            ORDER BY g.name
            LIMIT $3
            "#,
        )
        .bind(filter.active_only)
        .bind(filter.member)
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("group"))
    }

    async fn update_group(&self, id: Uuid, update: &GroupUpdate) -> Result<Group, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
            SET active = COALESCE($2, active),
                owner_id = COALESCE($3, owner_id),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.active)
        .bind(update.owner_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("group"))?
        .ok_or_else(|| StoreError::NotFound("group".to_string()))
    }

    // ==================== Memberships ====================

    async fn insert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO memberships (group_id, user_id, admin)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(membership.group_id)
        .bind(membership.user_id)
        .bind(membership.admin)
        .execute(&self.pool)
        .await
        .map_err(map_err("membership"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict("membership".to_string()));
        }
        Ok(())
    }

    async fn delete_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM memberships WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_err("membership"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("membership".to_string()));
        }
        Ok(())
    }

    async fn find_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        sqlx::query_as::<_, Membership>(
            "SELECT group_id, user_id, admin FROM memberships WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("membership"))
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Member>, StoreError> {
        sqlx::query_as::<_, Member>(
            r#"
            SELECT u.*, m.admin FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
            ORDER BY u.dom_name
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("membership"))
    }

    async fn list_user_groups(&self, user_id: Uuid) -> Result<Vec<GroupMembership>, StoreError> {
        sqlx::query_as::<_, GroupMembership>(
            r#"
            SELECT g.*, m.admin FROM memberships m
            JOIN groups g ON g.id = m.group_id
            WHERE m.user_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("membership"))
    }

    // ==================== Accounts ====================

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, name, active, principal_investigator, faculty, department,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(account.active)
        .bind(account.principal_investigator.as_deref())
        .bind(account.faculty.as_deref())
        .bind(account.department.as_deref())
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err("account"))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("account"))
    }

    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT a.* FROM accounts a
            WHERE $1::uuid IS NULL OR EXISTS (
                SELECT 1 FROM account_users au
                WHERE au.account_id = a.id AND au.user_id = $1 AND ($2 = FALSE OR au.admin))
            ORDER BY a.name
            LIMIT $3
            "#,
        )
        .bind(filter.member)
        .bind(filter.admin_only)
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("account"))
    }

    async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET active = COALESCE($2, active),
                principal_investigator = COALESCE($3, principal_investigator),
                faculty = COALESCE($4, faculty),
                department = COALESCE($5, department),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.active)
        .bind(patch.principal_investigator.as_deref())
        .bind(patch.faculty.as_deref())
        .bind(patch.department.as_deref())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("account"))?
        .ok_or_else(|| StoreError::NotFound("account".to_string()))
    }

    async fn insert_account_user(&self, row: AccountUser) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO account_users (account_id, user_id, admin)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, user_id) DO NOTHING
            "#,
        )
        .bind(row.account_id)
        .bind(row.user_id)
        .bind(row.admin)
        .execute(&self.pool)
        .await
        .map_err(map_err("account user"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict("account user".to_string()));
        }
        Ok(())
    }

    async fn delete_account_user(&self, account_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM account_users WHERE account_id = $1 AND user_id = $2")
                .bind(account_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(map_err("account user"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("account user".to_string()));
        }
        Ok(())
    }

    async fn find_account_user(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountUser>, StoreError> {
        sqlx::query_as::<_, AccountUser>(
            "SELECT account_id, user_id, admin FROM account_users WHERE account_id = $1 AND user_id = $2",
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("account user"))
    }

    async fn list_account_users(&self, account_id: Uuid) -> Result<Vec<AccountMember>, StoreError> {
        sqlx::query_as::<_, AccountMember>(
            r#"
            SELECT u.*, au.admin FROM account_users au
            JOIN users u ON u.id = au.user_id
            WHERE au.account_id = $1
            ORDER BY u.dom_name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("account user"))
    }

    // ==================== Services ====================

    async fn insert_service(&self, service: Service) -> Result<Service, StoreError> {
        sqlx::query_as::<_, Service>(
            r#"
            INSERT INTO services (id, name, access, secret_digest, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(service.id)
        .bind(&service.name)
        .bind(&service.access)
        .bind(&service.secret_digest)
        .bind(service.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err("service"))
    }

    async fn find_service_by_access(&self, access: &str) -> Result<Option<Service>, StoreError> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE access = $1")
            .bind(access)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("service"))
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err("service"))
    }

    async fn delete_service(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM services WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_err("service"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("service '{}'", name)));
        }
        Ok(())
    }

    // ==================== Resources ====================

    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError> {
        sqlx::query_as::<_, Resource>(
            r#"
            INSERT INTO resources (id, name, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(resource.id)
        .bind(&resource.name)
        .bind(resource.active)
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err("resource"))
    }

    async fn find_resource_by_id(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("resource"))
    }

    async fn find_resource_by_name(&self, name: &str) -> Result<Option<Resource>, StoreError> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err("resource"))
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err("resource"))
    }

    async fn update_resource(
        &self,
        id: Uuid,
        patch: &ResourcePatch,
    ) -> Result<Resource, StoreError> {
        sqlx::query_as::<_, Resource>(
            r#"
            UPDATE resources
            SET name = COALESCE($2, name), active = COALESCE($3, active), updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err("resource"))?
        .ok_or_else(|| StoreError::NotFound("resource".to_string()))
    }

    async fn list_resource_groups(&self, resource_id: Uuid) -> Result<Vec<Group>, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM resource_groups rg
            JOIN groups g ON g.id = rg.group_id
            WHERE rg.resource_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("resource group association"))
    }

    async fn add_resource_group(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO resource_groups (resource_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT (resource_id, group_id) DO NOTHING
            "#,
        )
        .bind(resource_id)
        .bind(group_id)
        .execute(&self.pool)
        .await
        .map_err(map_err("resource group association"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict("resource group association".to_string()));
        }
        Ok(())
    }

    async fn remove_resource_group(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM resource_groups WHERE resource_id = $1 AND group_id = $2")
                .bind(resource_id)
                .bind(group_id)
                .execute(&self.pool)
                .await
                .map_err(map_err("resource group association"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("resource group association".to_string()));
        }
        Ok(())
    }

    // ==================== Usage ====================

    async fn insert_usage(&self, records: Vec<ResourceUsage>) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err("usage"))?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO resource_usage (id, resource_id, user_id, start_utc, end_utc, metrics, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(record.id)
            .bind(record.resource_id)
            .bind(record.user_id)
            .bind(record.start)
            .bind(record.end)
            .bind(Json(&record.metrics))
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_err("usage"))?;
        }

        tx.commit().await.map_err(map_err("usage"))?;
        Ok(records.len())
    }

    async fn list_usage(&self, filter: UsageFilter) -> Result<Vec<ResourceUsage>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT * FROM resource_usage
            WHERE resource_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::timestamptz IS NULL OR start_utc >= $3)
              AND ($4::timestamptz IS NULL OR end_utc <= $4)
            ORDER BY start_utc
            "#,
        )
        .bind(filter.resource_id)
        .bind(filter.user_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err("usage"))?;

        Ok(rows.into_iter().map(ResourceUsage::from).collect())
    }
}
