use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::identity::Identity;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_blocked: bool,
    pub exp: usize,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.user_id,
            role: claims.role,
            permissions: claims.permissions.into_iter().collect(),
            blocked: claims.is_blocked,
        }
    }
}

pub fn decode_identity(token: &str, secret: &str) -> Result<Identity> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))?;
    Ok(data.claims.into())
}

/// Signs an HS256 token for `identity`, valid for `ttl_seconds`.
pub fn issue_token(identity: &Identity, secret: &str, ttl_seconds: i64) -> Result<String> {
    let exp = (chrono::Utc::now().timestamp() + ttl_seconds).max(0) as usize;
    let mut permissions: Vec<String> = identity.permissions.iter().cloned().collect();
    permissions.sort();
    let claims = Claims {
        user_id: identity.user_id,
        role: identity.role.clone(),
        permissions,
        is_blocked: identity.blocked,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
}

fn bearer_token(req: &Request) -> Result<&str> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))
}

/// Resolves the bearer token into an [`Identity`] request extension.
/// Blocked users are turned away before any handler runs.
pub async fn require_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let identity = match bearer_token(&req).and_then(|t| decode_identity(t, &state.config.jwt_secret)) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = identity.ensure_not_blocked() {
        tracing::warn!(user_id = identity.user_id, "blocked user rejected");
        return e.into_response();
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}
