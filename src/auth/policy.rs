//! Authorization policy: the one place permission strings are formatted and checked.
//!
//! A permission string has the form `<app_label>.<action>_<model_name>`, for
//! example `catalog.delete_unit`. The action vocabulary is closed: see [`Action`].

use crate::auth::backend::{Actor, PermissionBackend};
use crate::config::ResolvedEntity;
use crate::error::AppError;
use std::fmt;

/// Actions a permission can grant. There are exactly four.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Change,
    Delete,
    View,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Add, Action::Change, Action::Delete, Action::View];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
            Action::View => "view",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<app_label>.<action>_<model_name>`; `model_name` is lowercased here so callers may pass type names.
pub fn permission_string(app_label: &str, model_name: &str, action: Action) -> String {
    format!("{}.{}_{}", app_label, action, model_name.to_lowercase())
}

/// Permission string of `action` on `entity`.
pub fn entity_permission(entity: &ResolvedEntity, action: Action) -> String {
    permission_string(&entity.app_label, &entity.model_name, action)
}

/// Does `actor` hold the `action` permission on `entity`?
///
/// Anonymous and inactive actors are denied, superusers are allowed, everyone
/// else is decided by the backend. A backend error denies.
pub async fn authorization_check(
    backend: &dyn PermissionBackend,
    actor: &Actor,
    entity: &ResolvedEntity,
    action: Action,
) -> bool {
    let Actor::User(user) = actor else {
        return false;
    };
    if !user.is_active {
        return false;
    }
    if user.is_superuser {
        return true;
    }
    let perm = entity_permission(entity, action);
    match backend.has_perm(user, &perm).await {
        Ok(granted) => granted,
        Err(e) => {
            tracing::warn!(user_id = user.id, perm = %perm, error = %e, "permission check failed; denying");
            false
        }
    }
}

/// How a surface reports a denied request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateMode {
    /// Site views: anonymous actors are redirected to the login URL.
    Redirect,
    /// REST endpoints: anonymous actors get 401.
    Status,
    /// Admin: anonymous and non-staff actors are redirected to the login URL.
    Staff,
}

/// Common gate run by every generated handler before it touches the database.
///
/// Returns `LoginRequired` (or `Unauthenticated` in [`GateMode::Status`]) for
/// anonymous actors and `Forbidden` for authenticated actors lacking the permission.
pub async fn authorize(
    backend: &dyn PermissionBackend,
    actor: &Actor,
    entity: &ResolvedEntity,
    action: Action,
    mode: GateMode,
    login_url: &str,
    path: &str,
) -> Result<(), AppError> {
    let login_required = || AppError::LoginRequired {
        login_url: login_url.to_string(),
        next: path.to_string(),
    };
    if !actor.is_authenticated() {
        return Err(match mode {
            GateMode::Status => AppError::Unauthenticated,
            GateMode::Redirect | GateMode::Staff => login_required(),
        });
    }
    if mode == GateMode::Staff && !actor.is_staff() {
        return Err(login_required());
    }
    if authorization_check(backend, actor, entity, action).await {
        Ok(())
    } else {
        let perm = entity_permission(entity, action);
        tracing::debug!(user_id = ?actor.user_id(), perm = %perm, path, "permission denied");
        Err(AppError::Forbidden(perm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::{InMemoryPermissionBackend, User};
    use crate::config::{resolve, EntityConfig, KernelConfig};
    use async_trait::async_trait;

    fn unit() -> ResolvedEntity {
        let config = KernelConfig {
            entities: vec![EntityConfig::new("Unit", "catalog")],
        };
        let model = resolve(&config, "kernel").unwrap();
        model.entities[0].as_ref().clone()
    }

    struct FailingBackend;

    #[async_trait]
    impl PermissionBackend for FailingBackend {
        async fn resolve(&self, _credential: &str) -> Result<Option<User>, AppError> {
            Err(AppError::BadRequest("down".into()))
        }

        async fn has_perm(&self, _user: &User, _perm: &str) -> Result<bool, AppError> {
            Err(AppError::BadRequest("down".into()))
        }
    }

    #[test]
    fn permission_strings_for_every_action() {
        for (action, expected) in [
            (Action::Add, "catalog.add_unit"),
            (Action::Change, "catalog.change_unit"),
            (Action::Delete, "catalog.delete_unit"),
            (Action::View, "catalog.view_unit"),
        ] {
            assert_eq!(permission_string("catalog", "Unit", action), expected);
        }
        assert_eq!(entity_permission(&unit(), Action::Delete), "catalog.delete_unit");
    }

    #[test]
    fn type_names_are_lowercased_without_separators() {
        assert_eq!(
            permission_string("kernel", "KernelUnit", Action::View),
            "kernel.view_kernelunit"
        );
    }

    #[tokio::test]
    async fn anonymous_is_denied_and_redirected() {
        let backend = InMemoryPermissionBackend::new();
        let entity = unit();
        assert!(!authorization_check(&backend, &Actor::Anonymous, &entity, Action::View).await);
        let err = authorize(&backend, &Actor::Anonymous, &entity, Action::View, GateMode::Redirect, "/login/", "/unit/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoginRequired { ref next, .. } if next == "/unit/"));
        let err = authorize(&backend, &Actor::Anonymous, &entity, Action::View, GateMode::Status, "/login/", "/api/x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn authenticated_without_grant_is_forbidden() {
        let user = User::new(1, "a@example.com");
        let backend = InMemoryPermissionBackend::new().with_user(user.clone(), ["catalog.add_unit"]);
        let actor = Actor::User(user);
        let entity = unit();
        let err = authorize(&backend, &actor, &entity, Action::View, GateMode::Redirect, "/login/", "/unit/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref p) if p == "catalog.view_unit"));
        assert!(authorize(&backend, &actor, &entity, Action::Add, GateMode::Redirect, "/login/", "/unit/new")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn superuser_allowed_and_inactive_denied() {
        let backend = InMemoryPermissionBackend::new();
        let entity = unit();
        let root = Actor::User(User::new(1, "root@example.com").superuser());
        assert!(authorization_check(&backend, &root, &entity, Action::Delete).await);

        let mut inactive = User::new(2, "gone@example.com").superuser();
        inactive.is_active = false;
        assert!(!authorization_check(&backend, &Actor::User(inactive), &entity, Action::View).await);
    }

    #[tokio::test]
    async fn backend_errors_fail_closed() {
        let actor = Actor::User(User::new(1, "a@example.com"));
        assert!(!authorization_check(&FailingBackend, &actor, &unit(), Action::View).await);
    }

    #[tokio::test]
    async fn staff_mode_redirects_non_staff() {
        let user = User::new(3, "s@example.com");
        let backend = InMemoryPermissionBackend::new().with_user(user.clone(), ["catalog.view_unit"]);
        let err = authorize(&backend, &Actor::User(user.clone()), &unit(), Action::View, GateMode::Staff, "/login/", "/admin/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoginRequired { .. }));
        let staff = Actor::User(user.staff());
        assert!(authorize(&backend, &staff, &unit(), Action::View, GateMode::Staff, "/login/", "/admin/")
            .await
            .is_ok());
    }
}
