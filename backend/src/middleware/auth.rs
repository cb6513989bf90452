//! Authentication middleware
//!
//! Sessions are issued elsewhere; this layer only verifies the HS256 token
//! carried in the `Authorization: Bearer` header or the session cookie, and
//! places the resolved identity in the request extensions.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::models::Role;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from the token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    /// Admins and managers
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, name: impl Into<String>, role: Role, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            name: name.into(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Sign claims with the shared secret
pub fn encode_token(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Decode and validate a token
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

fn resolve_user(claims: Claims) -> AppResult<AuthUser> {
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        name: claims.name,
        role: claims.role,
    })
}

/// Reject requests without a valid token before they reach a handler
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|header| header.token().to_string());

    let token = match bearer {
        Some(token) => token,
        None => CookieJar::from_headers(request.headers())
            .get(&state.config.jwt.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?,
    };

    let claims = decode_token(&token, &state.config.jwt.secret)?;
    let user = resolve_user(claims)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extractor for the authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Admin or manager only
pub fn require_elevated(user: &AuthUser) -> AppResult<()> {
    if user.is_elevated() {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

/// Admin only
pub fn require_admin(user: &AuthUser) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}
