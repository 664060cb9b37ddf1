use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::state::AppState;

const USER_TOKEN_TYPE: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub jti: String,
}

/// Tokens are issued by the account service; signing lives here for tests and
/// local tooling.
pub fn sign_jwt_for_user(
    user_id: &str,
    secret: &str,
    expires_in_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expires_in_hours as i64);
    let claims = Claims {
        sub: user_id.to_string(),
        token_type: USER_TOKEN_TYPE.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("jwt sign failed: {e}")))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.algorithms = vec![Algorithm::HS256];

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    extract_bearer_token(headers).ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

fn user_id_from_token(token: &str, secret: &str) -> Result<String, AppError> {
    let claims = verify_jwt(token, secret)?;
    if claims.token_type != USER_TOKEN_TYPE {
        return Err(AppError::unauthorized("Invalid token type"));
    }
    Ok(claims.sub)
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Reader identity for public endpoints. A missing or invalid token is a
/// guest, never a rejection.
#[derive(Debug, Clone, Default)]
pub struct MaybeReader {
    pub user_id: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers)?;
        let user_id = user_id_from_token(&token, &app_state.config().jwt_secret)?;
        Ok(AuthUser { user_id })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeReader
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(MaybeReader::default());
        };
        let app_state = AppState::from_ref(state);
        match user_id_from_token(&token, &app_state.config().jwt_secret) {
            Ok(user_id) => Ok(MaybeReader {
                user_id: Some(user_id),
            }),
            Err(_) => {
                tracing::debug!("Ignoring invalid bearer token on public read");
                Ok(MaybeReader::default())
            }
        }
    }
}
