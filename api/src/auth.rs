use std::time::{Duration, SystemTime, UNIX_EPOCH};

use agentboard_shared::{AuthResponse, RegisterUser, User};
use axum::{extract::State, http::HeaderMap, Json};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::Payload;
use crate::store::users;
use crate::{db, AppState};

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
}

/// Signing and verification keys, derived once from the configured secret.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthKeys {
    pub fn new(secret: &SecretString, ttl_days: u64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::from_secs(ttl_days.saturating_mul(24 * 60 * 60)),
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let claims = Claims {
            sub: user_id,
            exp: now.saturating_add(self.ttl).as_secs() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<i64> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|_| AppError::Unauthorized("invalid or expired token"))
    }
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, keys: &AuthKeys) -> Result<i64> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized("missing bearer token"))?;

    keys.verify(token)
}

/// Resolves the bearer token to a stored user.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let user_id = extract_user_id(headers, &state.auth)?;
    db::run(&state.db, move |conn| users::require(conn, user_id)).await
}

// ── Handlers ──

/// POST /api/auth/register: create a user and hand back its token
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterUser>,
) -> Result<Json<AuthResponse>> {
    let username = payload.username.trim().to_string();
    let user = db::run(&state.db, move |conn| users::create(conn, &username)).await?;
    let token = state.auth.issue(user.id)?;

    tracing::info!(user_id = user.id, username = %user.username, "registered user");
    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me: return current user
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &headers).await?))
}
