//! Request authentication.
//!
//! User routes authenticate with an HS256 JWT issued by the messenger's auth
//! service (`Authorization: Bearer <jwt>`, or `?access_token=` on the live
//! channel, since browsers cannot set headers on a WebSocket handshake).
//! The user id is read from the `UserId` claim, falling back to `sub`.
//!
//! Internal routes use a shared admin key instead.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request_id::RequestId;
use crate::errors::AppError;
use crate::AppState;

/// Who is calling, carried explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "UserId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
}

/// Validate a user token and return the user id it names.
pub fn decode_user_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 30;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("auth: rejected token: {}", e);
        AppError::Unauthorized
    })?;

    let raw = data
        .claims
        .user_id
        .or(data.claims.sub)
        .ok_or(AppError::Unauthorized)?;
    Uuid::parse_str(&raw).map_err(|_| AppError::Unauthorized)
}

/// Mint a user token. Used by the `token` CLI command for local testing.
pub fn issue_user_token(
    user_id: Uuid,
    secret: &str,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let claims = Claims {
        user_id: Some(user_id.to_string()),
        sub: None,
        exp: (chrono::Utc::now() + ttl).timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!("auth: missing bearer token");
            AppError::Unauthorized
        })?;
        let user_id = decode_user_token(token, &state.config.jwt_secret)?;

        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(RequestContext {
            user_id,
            request_id,
        })
    }
}

/// Middleware: validates `X-Admin-Key` (or bearer) against the configured admin key.
/// With no admin key configured, every internal call is refused.
pub async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| bearer_token(req.headers()));

    let Some(expected) = state.config.admin_key.as_deref() else {
        tracing::error!("internal API: INBOX_ADMIN_KEY is not set, refusing request");
        return Err(AppError::Unauthorized);
    };

    match provided_key {
        Some(k) if k == expected => Ok(next.run(req).await),
        Some(k) => {
            // SECURITY: Never log the expected key or the full provided key
            let masked = if k.len() > 8 {
                format!("{}…{}", &k[..4], &k[k.len() - 4..])
            } else {
                "****".to_string()
            };
            tracing::warn!("internal API: invalid key (provided: '{}')", masked);
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("internal API: missing X-Admin-Key header");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_issued_token_round_trips() {
        let user = Uuid::new_v4();
        let token = issue_user_token(user, SECRET, chrono::Duration::minutes(5)).unwrap();
        assert_eq!(decode_user_token(&token, SECRET).unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token =
            issue_user_token(Uuid::new_v4(), SECRET, chrono::Duration::minutes(5)).unwrap();
        assert!(matches!(
            decode_user_token(&token, "other-secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let token =
            issue_user_token(Uuid::new_v4(), SECRET, chrono::Duration::hours(-2)).unwrap();
        assert!(matches!(
            decode_user_token(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_sub_claim_is_accepted() {
        let user = Uuid::new_v4();
        let claims = Claims {
            user_id: None,
            sub: Some(user.to_string()),
            exp: (chrono::Utc::now() + chrono::Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(decode_user_token(&token, SECRET).unwrap(), user);
    }

    #[test]
    fn test_non_uuid_subject_is_unauthorized() {
        let claims = Claims {
            user_id: Some("admin".into()),
            sub: None,
            exp: (chrono::Utc::now() + chrono::Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(decode_user_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert("authorization", "Basic xyz".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
