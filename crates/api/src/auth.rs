//! Identity extraction from trusted upstream headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Actor, Role, UserId};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The actor named by the `x-actor-id` and `x-actor-role` headers.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated(format!("invalid {name} header")))
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = Uuid::parse_str(header(parts, ACTOR_ID_HEADER)?.trim())
            .map_err(|e| ApiError::Unauthenticated(format!("invalid {ACTOR_ID_HEADER}: {e}")))?;
        let role: Role = header(parts, ACTOR_ROLE_HEADER)?
            .trim()
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("{e}")))?;
        Ok(Self(Actor::new(UserId::from_uuid(id), role)))
    }
}
