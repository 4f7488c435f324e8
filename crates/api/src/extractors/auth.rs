use alerta_db::models::Role;
use alerta_services::{SessionContext, auth::Claims};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use bson::oid::ObjectId;

use crate::{error::ApiError, state::AppState};

/// The authenticated caller, from a JWT in the Authorization header or the
/// `access_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub username: String,
    pub role: Role,
    pub claims: Claims,
}

impl AuthUser {
    pub fn session(&self) -> SessionContext {
        SessionContext::new(self.user_id, self.username.clone(), self.role)
    }

    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".to_string()))?;
        Ok(AuthUser {
            user_id,
            username: claims.username.clone(),
            role: claims.role,
            claims,
        })
    }
}

fn bearer_or_cookie(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| {
            parts
                .headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|cookies| {
                    cookies.split(';').find_map(|cookie| {
                        cookie
                            .trim()
                            .strip_prefix("access_token=")
                            .map(|s| s.to_string())
                    })
                })
        })
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = bearer_or_cookie(parts)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
        let claims = app_state.auth.verify_access_token(&token)?;
        AuthUser::from_claims(claims)
    }
}

/// Helper trait for extracting AppState from composite state types
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AppState> for AppState {
    fn from_ref(input: &AppState) -> Self {
        input.clone()
    }
}
