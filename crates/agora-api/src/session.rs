use std::convert::Infallible;

use anyhow::{Result, bail};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use axum::response::Redirect;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: Option<String>,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// The resolved (possibly absent) identity of the current request.
/// Never rejects: an invalid or missing token resolves to `None`.
#[derive(Debug, Clone)]
pub struct Session(pub Option<Claims>);

impl Session {
    pub fn authenticated(claims: Claims) -> Self {
        Self(Some(claims))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|c| c.sub)
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Claims::is_admin)
    }
}

/// Extract the user id from a session that the caller has already
/// established as authenticated. Failing here is a programming-contract
/// violation, not a user-facing error path.
pub fn session_user_id(session: &Session) -> Result<Uuid> {
    match session.user_id() {
        Some(id) => Ok(id),
        None => bail!("session_user_id called on an unauthenticated session"),
    }
}

/// Authenticated identity; unauthenticated requests are redirected to the
/// login destination.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Claims);

impl AuthSession {
    pub fn user_id(&self) -> Uuid {
        self.0.sub
    }

    pub fn session(&self) -> Session {
        Session::authenticated(self.0.clone())
    }
}

/// Admin identity; non-admins are redirected to the unauthorized
/// destination.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Claims);

fn bearer_claims(parts: &Parts, secret: &str) -> Option<Claims> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let token = auth_header.strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session(bearer_claims(parts, &state.config.session_secret)))
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, &state.config.session_secret)
            .map(AuthSession)
            .ok_or_else(|| Redirect::to("/login"))
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, &state.config.session_secret)
            .ok_or_else(|| Redirect::to("/login"))?;

        if !claims.is_admin() {
            return Err(Redirect::to("/unauthorized"));
        }
        Ok(AdminSession(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            name: Some("Alice".into()),
            role: role.into(),
            exp: 0,
        }
    }

    #[test]
    fn session_user_id_requires_authentication() {
        assert!(session_user_id(&Session::anonymous()).is_err());

        let c = claims("user");
        let id = c.sub;
        assert_eq!(session_user_id(&Session::authenticated(c)).unwrap(), id);
    }

    #[test]
    fn admin_flag_follows_role() {
        assert!(Session::authenticated(claims(ROLE_ADMIN)).is_admin());
        assert!(!Session::authenticated(claims("user")).is_admin());
        assert!(!Session::anonymous().is_admin());
    }
}
