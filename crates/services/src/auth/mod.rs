use alerta_config::JwtSettings;
use alerta_db::models::{Category, Role};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hash error: {0}")]
    HashError(String),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Checks the sign-up form: a plausible email, a username of at least three
/// characters without spaces and a password of at least six.
pub fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), AuthError> {
    if !email.contains('@') || email.chars().count() < 5 {
        return Err(AuthError::Validation("Invalid email address".to_string()));
    }
    if username.chars().count() < 3 || username.chars().any(char::is_whitespace) {
        return Err(AuthError::Validation(
            "Username must have at least 3 characters and no spaces".to_string(),
        ));
    }
    if password.chars().count() < 6 {
        return Err(AuthError::Validation(
            "Password must have at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

/// Team accounts are registered under the category key itself.
pub fn role_for_username(username: &str) -> Role {
    username
        .parse::<Category>()
        .map(Role::from)
        .unwrap_or(Role::Ciudadano)
}

pub struct AuthService {
    jwt_settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_settings: JwtSettings) -> Self {
        let encoding_key = EncodingKey::from_secret(jwt_settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt_settings.secret.as_bytes());
        Self {
            jwt_settings,
            encoding_key,
            decoding_key,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::HashError(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn sign(
        &self,
        user_id: ObjectId,
        username: &str,
        role: Role,
        token_type: TokenType,
    ) -> Result<String, AuthError> {
        let ttl = match token_type {
            TokenType::Access => self.jwt_settings.access_token_ttl_secs,
            TokenType::Refresh => self.jwt_settings.refresh_token_ttl_secs,
        };
        let issued = Utc::now();
        let claims = Claims {
            sub: user_id.to_hex(),
            username: username.to_string(),
            role,
            iat: issued.timestamp(),
            exp: (issued + Duration::seconds(ttl as i64)).timestamp(),
            iss: self.jwt_settings.issuer.clone(),
            token_type,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Access and refresh tokens for a signed-in user. The role travels in
    /// the claims so routing checks need no user lookup.
    pub fn generate_tokens(
        &self,
        user_id: ObjectId,
        username: &str,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.sign(user_id, username, role, TokenType::Access)?,
            refresh_token: self.sign(user_id, username, role, TokenType::Refresh)?,
            expires_in: self.jwt_settings.access_token_ttl_secs,
        })
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.jwt_settings.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?
            .claims;
        if claims.token_type != expected {
            return Err(AuthError::InvalidToken(format!(
                "Expected a {expected:?} token"
            )));
        }
        Ok(claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenType::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token, TokenType::Refresh)
    }
}
