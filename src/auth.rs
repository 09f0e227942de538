use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, INVALID_ACCESS_TOKEN, INVALID_OR_EXPIRED, NOT_LOGGED_IN},
    models::Principal,
    repository::{Repository, RepositoryState},
};

/// Name of the cookie carrying the credential. Checked before the Authorization header.
pub const TOKEN_COOKIE: &str = "token";

/// Claims
///
/// The payload expected inside a credential. The principal id is read from `sub`;
/// tokens minted by the legacy issuer carry it as `id` or `userId` instead, sometimes
/// next to `sub`, so each is its own optional field.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Expiration Time (exp). Always validated.
    pub exp: usize,
    /// Issued At (iat).
    #[serde(default)]
    pub iat: usize,
}

impl Claims {
    /// Principal id carried by the token: `sub`, then `id`, then `userId`.
    pub fn principal_id(&self) -> Option<Uuid> {
        self.sub.or(self.id).or(self.user_id)
    }
}

/// extract_credential
///
/// Locates the raw credential in the request headers. The `token` cookie wins over
/// an `Authorization: Bearer <token>` header when both are present.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header);

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// token_from_cookie_header
///
/// Finds the `token` pair in a `Cookie:` header value (`a=1; token=xyz; b=2`).
pub fn token_from_cookie_header(cookies: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == TOKEN_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// decode_claims
///
/// Verifies signature and expiry. Every failure kind collapses to the same
/// Unauthenticated answer; the kind is only logged.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("credential expired"),
                kind => tracing::debug!(?kind, "credential rejected"),
            }
            ApiError::Unauthenticated(INVALID_OR_EXPIRED)
        })
}

/// verify_credential
///
/// The token verifier: credential lookup, signature/expiry check, then identity-store
/// lookup so that tokens of deleted accounts stop working immediately.
pub async fn verify_credential(
    headers: &HeaderMap,
    repo: &dyn Repository,
    config: &AppConfig,
) -> Result<Principal, ApiError> {
    let token = extract_credential(headers).ok_or(ApiError::Unauthenticated(NOT_LOGGED_IN))?;

    let claims = decode_claims(&token, &config.jwt_secret)?;
    let principal_id = claims.principal_id().ok_or_else(|| {
        tracing::debug!("credential carries no principal id");
        ApiError::Unauthenticated(INVALID_OR_EXPIRED)
    })?;

    match repo.find_principal(principal_id).await {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => {
            tracing::debug!(%principal_id, "credential references a missing principal");
            Err(ApiError::Unauthenticated(INVALID_ACCESS_TOKEN))
        }
        Err(e) => {
            // A store failure is terminal for this request only.
            tracing::error!(error = %e, "identity lookup failed");
            Err(ApiError::Unauthenticated(INVALID_OR_EXPIRED))
        }
    }
}

/// issue_token
///
/// Mints an HS256 credential for `principal_id` valid for `ttl`. The production issuer
/// lives outside this service; this is used by tooling and tests.
pub fn issue_token(
    principal_id: Uuid,
    ttl: Duration,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let claims = Claims {
        sub: Some(principal_id),
        iat: now as usize,
        exp: (now + ttl.as_secs()) as usize,
        ..Claims::default()
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Principal Extractor Implementation
///
/// Lets handlers take `Principal` as an argument. When the authentication gate already
/// ran for this request the principal is read from the request extensions; otherwise
/// the verifier runs here.
///
/// Rejection: ApiError::Unauthenticated (401) with a fixed message.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let principal = verify_credential(&parts.headers, repo.as_ref(), &config).await?;
        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}
