use alerta_db::models::{Role, User};
use alerta_services::auth::{TokenPair, role_for_username, validate_registration};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 5, message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, message = "Username must have at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must have at least 6 characters"))]
    pub password: String,
    pub push_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    pub push_token: Option<String>,
}

fn user_response(id: ObjectId, user: User) -> UserResponse {
    UserResponse {
        id: id.to_hex(),
        email: user.email,
        username: user.username,
        role: user.role,
        push_token: user.push_token,
    }
}

fn session_cookie(tokens: &TokenPair) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        tokens.access_token, tokens.expires_in
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    Ok(headers)
}

fn authenticated(state: &AppState, id: ObjectId, user: User) -> Result<(HeaderMap, AuthResponse), ApiError> {
    let tokens = state.auth.generate_tokens(id, &user.username, user.role)?;
    let headers = session_cookie(&tokens)?;
    Ok((
        headers,
        AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user: user_response(id, user),
        },
    ))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let email = body.email.trim().to_string();
    let username = body.username.trim().to_string();
    validate_registration(&email, &username, &body.password)?;

    if state.users.find_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let now = DateTime::now();
    let mut user = User {
        id: None,
        email,
        role: role_for_username(&username),
        username,
        password_hash: Some(state.auth.hash_password(&body.password)?),
        push_token: body.push_token.filter(|t| !t.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    let id = state.users.insert(&user).await?;
    user.id = Some(id);
    info!(user_id = %id, role = %user.role, "User registered");

    let (headers, response) = authenticated(&state, id, user)?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user = if let Some(ref username) = body.username {
        state.users.find_by_username(username.trim()).await?
    } else if let Some(ref email) = body.email {
        state.users.find_by_email(email.trim()).await?
    } else {
        return Err(ApiError::BadRequest(
            "Either username or email is required".to_string(),
        ));
    }
    .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("No password set".to_string()))?;
    if !state.auth.verify_password(&body.password, password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let id = user
        .id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;
    let (headers, response) = authenticated(&state, id, user)?;
    Ok((headers, Json(response)))
}

pub async fn logout() -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("access_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"),
    );
    Ok(headers)
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.find_by_id(auth.user_id).await?;
    Ok(Json(user_response(auth.user_id, user)))
}

/// Stores the caller's device token as given; `null` clears it.
pub async fn update_push_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PushTokenRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let token = body
        .push_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if !state.users.set_push_token(auth.user_id, token).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    let user = state.users.find_by_id(auth.user_id).await?;
    Ok(Json(user_response(auth.user_id, user)))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let claims = state.auth.verify_refresh_token(&body.refresh_token)?;
    let id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid user ID".to_string()))?;
    let user = state.users.find_by_id(id).await?;

    let (headers, response) = authenticated(&state, id, user)?;
    Ok((headers, Json(response)))
}
