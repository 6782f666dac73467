//! `PostgreSQL` store.
//!
//! Feature-gated behind `postgres-backend`. Tables are created on connect if
//! missing. Every multi-row operation runs in one transaction; uniqueness of
//! slugs, emails, membership pairs, and the single owner per vault is also
//! enforced by constraints, and violations come back as
//! [`StoreError::Conflict`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Resource, StoreError};
use crate::models::{Credential, Membership, Tenant, User, Vault};
use crate::role::{UserRole, VaultRole};
use crate::store::Store;

const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS tenants (
        id         UUID PRIMARY KEY,
        name       TEXT NOT NULL,
        slug       TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS users (
        id              UUID PRIMARY KEY,
        tenant_id       UUID NOT NULL REFERENCES tenants(id),
        email           TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL,
        avatar          TEXT NOT NULL DEFAULT '',
        password_hash   TEXT,
        master_key_salt TEXT NOT NULL,
        oauth_provider  TEXT,
        oauth_id        TEXT,
        role            TEXT NOT NULL,
        account_type    TEXT NOT NULL,
        status          TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL,
        updated_at      TIMESTAMPTZ NOT NULL
    )",
    r"CREATE UNIQUE INDEX IF NOT EXISTS idx_users_oauth
        ON users (oauth_provider, oauth_id) WHERE oauth_id IS NOT NULL",
    r"CREATE TABLE IF NOT EXISTS vaults (
        id          UUID PRIMARY KEY,
        tenant_id   UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        icon        TEXT NOT NULL DEFAULT '',
        is_personal BOOLEAN NOT NULL DEFAULT FALSE,
        owner_id    UUID REFERENCES users(id),
        created_at  TIMESTAMPTZ NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS vault_members (
        seq        BIGSERIAL,
        vault_id   UUID NOT NULL REFERENCES vaults(id) ON DELETE CASCADE,
        user_id    UUID NOT NULL REFERENCES users(id),
        role       TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (vault_id, user_id)
    )",
    r"CREATE UNIQUE INDEX IF NOT EXISTS idx_vault_members_single_owner
        ON vault_members (vault_id) WHERE role = 'owner'",
    r"CREATE INDEX IF NOT EXISTS idx_vault_members_user ON vault_members (user_id)",
    r"CREATE TABLE IF NOT EXISTS credentials (
        id         UUID PRIMARY KEY,
        vault_id   UUID NOT NULL REFERENCES vaults(id) ON DELETE CASCADE,
        tenant_id  UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        title      TEXT NOT NULL,
        url        TEXT NOT NULL DEFAULT '',
        username   TEXT NOT NULL DEFAULT '',
        password   TEXT NOT NULL,
        notes      TEXT NOT NULL DEFAULT '',
        category   TEXT NOT NULL DEFAULT '',
        favicon    TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE INDEX IF NOT EXISTS idx_credentials_vault ON credentials (vault_id)",
];

/// Connection settings for [`PostgresStore`].
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub max_connections: u32,
    /// How long a query waits for a pooled connection before failing with
    /// [`StoreError::Unavailable`].
    pub acquire_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// A [`Store`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

fn map_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            // unique_violation, foreign_key_violation
            Some("23505") => StoreError::Conflict {
                reason: db_err.message().to_owned(),
            },
            Some("23503") => StoreError::Conflict {
                reason: format!("row is still referenced: {}", db_err.message()),
            },
            _ => StoreError::Backend {
                reason: err.to_string(),
            },
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable {
                reason: err.to_string(),
            }
        }
        _ => StoreError::Backend {
            reason: err.to_string(),
        },
    }
}

fn not_found(resource: Resource) -> StoreError {
    StoreError::NotFound { resource }
}

/// Membership rows carry their role as text; an unknown value drops the row.
fn membership_from_row(row: &PgRow) -> Result<Option<Membership>, StoreError> {
    let vault_id: Uuid = row.try_get("vault_id").map_err(map_err)?;
    let user_id: Uuid = row.try_get("user_id").map_err(map_err)?;
    let role: String = row.try_get("role").map_err(map_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_err)?;
    let Some(role) = VaultRole::from_stored(&role) else {
        warn!(vault_id = %vault_id, user_id = %user_id, role = %role, "ignoring membership with unknown role");
        return Ok(None);
    };
    Ok(Some(Membership {
        vault_id,
        user_id,
        role,
        created_at,
    }))
}

impl PostgresStore {
    /// Connect and create missing tables.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the database cannot be reached,
    /// [`StoreError::Backend`] if the schema cannot be created.
    pub async fn connect(database_url: &str, options: &PostgresOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable {
                reason: format!("failed to connect: {e}"),
            })?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Backend {
                    reason: format!("migration failed: {e}"),
                })?;
        }

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool.begin().await.map_err(map_err)
    }
}

async fn insert_tenant(tx: &mut Transaction<'_, Postgres>, tenant: &Tenant) -> Result<(), StoreError> {
    sqlx::query(
        r"INSERT INTO tenants (id, name, slug, created_at, updated_at)
          VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(tenant.id)
    .bind(&tenant.name)
    .bind(&tenant.slug)
    .bind(tenant.created_at)
    .bind(tenant.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(map_err)?;
    Ok(())
}

async fn insert_user<'e, E>(executor: E, user: &User) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r"INSERT INTO users (id, tenant_id, email, name, avatar, password_hash, master_key_salt,
                             oauth_provider, oauth_id, role, account_type, status, created_at, updated_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(user.id)
    .bind(user.tenant_id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.avatar)
    .bind(&user.password_hash)
    .bind(&user.master_key_salt)
    .bind(&user.oauth_provider)
    .bind(&user.oauth_id)
    .bind(user.role)
    .bind(user.account_type)
    .bind(user.status)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(executor)
    .await
    .map_err(map_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    // ── Tenants ──────────────────────────────────────────────────────

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn create_tenant_for_user(
        &self,
        tenant: &Tenant,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        insert_tenant(&mut tx, tenant).await?;

        let moved = sqlx::query("UPDATE users SET tenant_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(tenant.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        if moved.rows_affected() == 0 {
            return Err(not_found(Resource::User));
        }

        tx.commit().await.map_err(map_err)
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tenants SET name = $2, slug = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Tenant));
        }
        Ok(())
    }

    async fn delete_tenant(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Tenant));
        }
        Ok(())
    }

    async fn count_tenant_users(&self, tenant_id: Uuid) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    // ── Users ────────────────────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        insert_user(&self.pool, user).await
    }

    async fn create_user_with_tenant(&self, tenant: &Tenant, user: &User) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        insert_tenant(&mut tx, tenant).await?;
        insert_user(&mut *tx, user).await?;
        tx.commit().await.map_err(map_err)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_user_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE oauth_provider = $1 AND oauth_id = $2")
            .bind(provider)
            .bind(oauth_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_users(&self, tenant_id: Option<Uuid>) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE $1::uuid IS NULL OR tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE users SET tenant_id = $2, email = $3, name = $4, avatar = $5,
                              password_hash = $6, oauth_provider = $7, oauth_id = $8,
                              role = $9, status = $10, account_type = $11, updated_at = $12
              WHERE id = $1",
        )
        .bind(user.id)
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .bind(&user.oauth_provider)
        .bind(&user.oauth_id)
        .bind(user.role)
        .bind(user.status)
        .bind(user.account_type)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::User));
        }
        Ok(())
    }

    async fn has_super_admin(&self) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
            .bind(UserRole::SuperAdmin)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }

    // ── Vaults ───────────────────────────────────────────────────────

    async fn create_vault_with_owner(
        &self,
        vault: &Vault,
        owner_id: Uuid,
    ) -> Result<Membership, StoreError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r"INSERT INTO vaults (id, tenant_id, name, description, icon, is_personal, owner_id,
                                  created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(vault.id)
        .bind(vault.tenant_id)
        .bind(&vault.name)
        .bind(&vault.description)
        .bind(&vault.icon)
        .bind(vault.is_personal)
        .bind(vault.owner_id)
        .bind(vault.created_at)
        .bind(vault.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        sqlx::query(
            r"INSERT INTO vault_members (vault_id, user_id, role, created_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(vault.id)
        .bind(owner_id)
        .bind(VaultRole::Owner.as_str())
        .bind(vault.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;

        Ok(Membership {
            vault_id: vault.id,
            user_id: owner_id,
            role: VaultRole::Owner,
            created_at: vault.created_at,
        })
    }

    async fn get_vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError> {
        sqlx::query_as::<_, Vault>("SELECT * FROM vaults WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_vaults_for_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Vault>, StoreError> {
        sqlx::query_as::<_, Vault>(
            r"SELECT v.* FROM vaults v
              JOIN vault_members m ON m.vault_id = v.id
              WHERE v.tenant_id = $1 AND m.user_id = $2
              ORDER BY v.created_at",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_vault(&self, vault: &Vault) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE vaults SET name = $2, description = $3, icon = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(vault.id)
        .bind(&vault.name)
        .bind(&vault.description)
        .bind(&vault.icon)
        .bind(vault.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Vault));
        }
        Ok(())
    }

    async fn delete_vault(&self, id: Uuid) -> Result<(), StoreError> {
        // Memberships and credentials go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM vaults WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Vault));
        }
        Ok(())
    }

    // ── Memberships ──────────────────────────────────────────────────

    async fn get_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query("SELECT * FROM vault_members WHERE vault_id = $1 AND user_id = $2")
            .bind(vault_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        match row {
            Some(row) => membership_from_row(&row),
            None => Ok(None),
        }
    }

    async fn list_members(&self, vault_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query("SELECT * FROM vault_members WHERE vault_id = $1 ORDER BY seq")
            .bind(vault_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        let mut members = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(m) = membership_from_row(row)? {
                members.push(m);
            }
        }
        Ok(members)
    }

    async fn upsert_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
        role: VaultRole,
    ) -> Result<Membership, StoreError> {
        if role == VaultRole::Owner {
            return Err(StoreError::OwnerImmutable);
        }
        let mut tx = self.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT role FROM vault_members WHERE vault_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(vault_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_err)?;
        if existing.as_deref() == Some(VaultRole::Owner.as_str()) {
            return Err(StoreError::OwnerImmutable);
        }

        let row = sqlx::query(
            r"INSERT INTO vault_members (vault_id, user_id, role, created_at)
              VALUES ($1, $2, $3, NOW())
              ON CONFLICT (vault_id, user_id) DO UPDATE SET role = EXCLUDED.role
              RETURNING *",
        )
        .bind(vault_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;

        membership_from_row(&row)?.ok_or(StoreError::Backend {
            reason: "upserted membership has an unreadable role".to_owned(),
        })
    }

    async fn remove_membership(&self, vault_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT role FROM vault_members WHERE vault_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(vault_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_err)?;
        match existing.as_deref() {
            None => return Err(not_found(Resource::Membership)),
            Some(role) if role == VaultRole::Owner.as_str() => {
                return Err(StoreError::OwnerImmutable);
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM vault_members WHERE vault_id = $1 AND user_id = $2")
            .bind(vault_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)
    }

    // ── Credentials ──────────────────────────────────────────────────

    async fn create_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO credentials (id, vault_id, tenant_id, title, url, username, password,
                                       notes, category, favicon, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(credential.id)
        .bind(credential.vault_id)
        .bind(credential.tenant_id)
        .bind(&credential.title)
        .bind(&credential.url)
        .bind(&credential.username)
        .bind(&credential.password)
        .bind(&credential.notes)
        .bind(&credential.category)
        .bind(&credential.favicon)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn list_credentials(&self, vault_id: Uuid) -> Result<Vec<Credential>, StoreError> {
        sqlx::query_as::<_, Credential>(
            "SELECT * FROM credentials WHERE vault_id = $1 ORDER BY created_at DESC",
        )
        .bind(vault_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE credentials SET title = $2, url = $3, username = $4, password = $5,
                                     notes = $6, category = $7, favicon = $8, updated_at = $9
              WHERE id = $1",
        )
        .bind(credential.id)
        .bind(&credential.title)
        .bind(&credential.url)
        .bind(&credential.username)
        .bind(&credential.password)
        .bind(&credential.notes)
        .bind(&credential.category)
        .bind(&credential.favicon)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Credential));
        }
        Ok(())
    }

    async fn delete_credential(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(not_found(Resource::Credential));
        }
        Ok(())
    }

    async fn list_member_credentials(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Credential>, StoreError> {
        sqlx::query_as::<_, Credential>(
            r"SELECT c.* FROM credentials c
              JOIN vault_members m ON m.vault_id = c.vault_id
              WHERE c.tenant_id = $1 AND m.user_id = $2
                AND m.role IN ('owner', 'admin', 'editor', 'viewer')
              ORDER BY c.created_at DESC",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }
}
