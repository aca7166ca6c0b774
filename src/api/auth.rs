//! Minimal JWT auth for the single-page app.
//!
//! - The app submits username/password to `/api/login`
//! - Server returns the user record and a JWT valid for `JWT_TTL_DAYS`
//! - When `DEV_MODE=false`, all other API endpoints require `Authorization: Bearer <jwt>`
//!
//! # Security notes
//! - Accounts come from the injected user directory; there is no sign-up or
//!   password rotation here.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};
use crate::users::User;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Username (for display/auditing)
    #[serde(default)]
    usr: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl From<&User> for AuthUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            name: u.name.clone(),
        }
    }
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &User) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id.clone(),
        usr: user.username.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let user = state
        .users
        .authenticate(&req.username, &req.password)
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

    let (token, exp) = match state.config.auth.jwt_secret.as_deref() {
        Some(secret) => {
            let (token, exp) = issue_jwt(secret, state.config.auth.jwt_ttl_days, &user)
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            (Some(token), Some(exp))
        }
        None => (None, None),
    };

    tracing::info!(user = %user.id, role = ?user.role, "User logged in");
    Ok(Json(LoginResponse { user, token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if !state.config.auth.auth_required(state.config.dev_mode) {
        req.extensions_mut().insert(AuthUser {
            id: "dev".to_string(),
            username: "dev".to_string(),
            name: "Developer".to_string(),
        });
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => match state.users.get(&claims.sub) {
            Some(user) => {
                let auth = AuthUser::from(&user);
                tracing::debug!(user = %auth.id, username = %auth.username, path = %req.uri().path(), "Authenticated request");
                req.extensions_mut().insert(auth);
                next.run(req).await
            }
            None => (StatusCode::UNAUTHORIZED, "Invalid user").into_response(),
        },
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}
