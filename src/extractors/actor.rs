//! Resolve the acting user from the `X-User-ID` header set by the authenticating proxy.

use crate::auth::Actor;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the user id. Default: `X-User-ID`.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// The request's actor. Missing, unknown or inactive users are anonymous; a backend
/// failure is logged and also yields anonymous, so gates fail closed.
#[derive(Clone, Debug)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(credential) = credential else {
            return Ok(CurrentActor(Actor::Anonymous));
        };
        let actor = match state.permissions.resolve(credential).await {
            Ok(Some(user)) if user.is_active => Actor::User(user),
            Ok(_) => Actor::Anonymous,
            Err(e) => {
                tracing::warn!(error = %e, "actor lookup failed; treating request as anonymous");
                Actor::Anonymous
            }
        };
        Ok(CurrentActor(actor))
    }
}
