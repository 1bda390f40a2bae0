//! Actors and the authorization subsystem the generated surfaces query.

use crate::error::AppError;
use crate::store::qualified_sys_table;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// An authenticated user as seen by the permission checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        User {
            id,
            email: email.into(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_staff = true;
        self.is_superuser = true;
        self
    }
}

/// Who is making the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(User),
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::User(u) => Some(u),
            Actor::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }

    pub fn is_staff(&self) -> bool {
        self.user().map(|u| u.is_staff).unwrap_or(false)
    }
}

#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// Look up the user a request credential (the `X-User-ID` header value) refers to.
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AppError>;

    /// Whether `user` holds `perm` (e.g. `catalog.view_unit`). Superuser and
    /// active-flag handling happen in the policy before this is called.
    async fn has_perm(&self, user: &User, perm: &str) -> Result<bool, AppError>;
}

/// Fixed set of users and grants; for tests and small deployments.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPermissionBackend {
    users: HashMap<String, User>,
    grants: HashMap<i64, HashSet<String>>,
}

impl InMemoryPermissionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user<I, S>(mut self, user: User, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry(user.id)
            .or_default()
            .extend(perms.into_iter().map(Into::into));
        self.users.insert(user.id.to_string(), user);
        self
    }
}

#[async_trait]
impl PermissionBackend for InMemoryPermissionBackend {
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(credential).cloned())
    }

    async fn has_perm(&self, user: &User, perm: &str) -> Result<bool, AppError> {
        Ok(self.grants.get(&user.id).map(|p| p.contains(perm)).unwrap_or(false))
    }
}

/// Users and grants stored in `_sys_users` / `_sys_user_permissions` (see `store::ensure_auth_tables`).
#[derive(Clone, Debug)]
pub struct PgPermissionBackend {
    pool: PgPool,
    schema: String,
}

impl PgPermissionBackend {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgPermissionBackend {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl PermissionBackend for PgPermissionBackend {
    async fn resolve(&self, credential: &str) -> Result<Option<User>, AppError> {
        let Ok(id) = credential.parse::<i64>() else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT id, email, is_active, is_staff, is_superuser FROM {} WHERE id = $1",
            qualified_sys_table(&self.schema, "_sys_users")
        );
        tracing::debug!(sql = %sql, user_id = id, "query");
        let row = sqlx::query_as::<_, (i64, String, bool, bool, bool)>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, email, is_active, is_staff, is_superuser)| User {
            id,
            email,
            is_active,
            is_staff,
            is_superuser,
        }))
    }

    async fn has_perm(&self, user: &User, perm: &str) -> Result<bool, AppError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND permission = $2)",
            qualified_sys_table(&self.schema, "_sys_user_permissions")
        );
        tracing::debug!(sql = %sql, user_id = user.id, perm, "query");
        let granted = sqlx::query_scalar::<_, bool>(&sql)
            .bind(user.id)
            .bind(perm)
            .fetch_one(&self.pool)
            .await?;
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_backend_resolves_and_checks_grants() {
        let backend = InMemoryPermissionBackend::new()
            .with_user(User::new(7, "ann@example.com"), ["catalog.view_unit"]);
        let user = backend.resolve("7").await.unwrap().unwrap();
        assert_eq!(user.email, "ann@example.com");
        assert!(backend.has_perm(&user, "catalog.view_unit").await.unwrap());
        assert!(!backend.has_perm(&user, "catalog.delete_unit").await.unwrap());
        assert!(backend.resolve("8").await.unwrap().is_none());
    }

    #[test]
    fn actor_accessors() {
        assert!(!Actor::Anonymous.is_authenticated());
        assert!(!Actor::Anonymous.is_staff());
        let actor = Actor::User(User::new(1, "a@b.c").staff());
        assert!(actor.is_authenticated());
        assert!(actor.is_staff());
        assert_eq!(actor.user_id(), Some(1));
    }
}
