//! Request gates and the per-route-group pipeline that composes them.
//!
//! A gate either lets the request continue or ends it with an [`ApiError`]. The
//! pipeline runs its gates strictly in the order they were declared; the first
//! failure short-circuits and the handler never executes.
//!
//! ```ignore
//! let admin = Pipeline::new()
//!     .authenticate()
//!     .require_admin()
//!     .secret_key()
//!     .wrap(admin_settings_routes(), &state);
//! ```

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
};
use serde_json::Value;

use crate::{
    AppState,
    auth::verify_credential,
    config::AppConfig,
    error::{ADMINS_ONLY, ApiError, ROLE_DENIED, SECRET_INVALID, SECRET_MISSING},
    models::{ADMIN_ROLE, Principal},
};

/// Body field carrying the operator secret.
pub const SECRET_FIELD: &str = "secretKey";

/// Upper bound for bodies buffered by the secret-key gate.
const MAX_GATED_BODY_BYTES: usize = 64 * 1024;

/// Allow, or deny with the reason to answer with.
pub type AuthorizationDecision = Result<(), ApiError>;

// --- Pure decisions ---

/// authorize_role
///
/// The role authorizer. Allows iff the principal's role equals the required label.
pub fn authorize_role(principal: &Principal, required_role: &str) -> AuthorizationDecision {
    if principal.role == required_role {
        Ok(())
    } else if required_role == ADMIN_ROLE {
        Err(ApiError::Forbidden(ADMINS_ONLY))
    } else {
        Err(ApiError::Forbidden(ROLE_DENIED))
    }
}

/// check_secret_key
///
/// The secret-key gate on an already parsed JSON body. On success the secret field is
/// removed from `body` so it cannot reach a persistence write. A missing server secret
/// rejects every caller.
pub fn check_secret_key(body: &mut Value, configured: Option<&str>) -> AuthorizationDecision {
    let supplied = match body.get(SECRET_FIELD) {
        Some(Value::String(key)) if !key.is_empty() => key.as_str(),
        // Empty-ish values (null, "", false, 0) count as not supplied.
        Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) | None => {
            return Err(ApiError::BadRequest(SECRET_MISSING));
        }
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
            return Err(ApiError::BadRequest(SECRET_MISSING));
        }
        // A non-string secret can never equal the configured one.
        Some(_) => return Err(ApiError::Forbidden(SECRET_INVALID)),
    };

    match configured {
        Some(expected) if secrets_match(supplied, expected) => {}
        _ => return Err(ApiError::Forbidden(SECRET_INVALID)),
    }

    if let Some(fields) = body.as_object_mut() {
        fields.remove(SECRET_FIELD);
    }
    Ok(())
}

/// Comparison whose running time does not depend on where the inputs first differ.
fn secrets_match(supplied: &str, expected: &str) -> bool {
    let (a, b) = (supplied.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// --- Middleware ---

/// authenticate
///
/// Runs the token verifier and stores the resolved principal in the request
/// extensions for the gates and handler that follow.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = verify_credential(request.headers(), state.repo.as_ref(), &state.config)
        .await
        .inspect_err(|e| tracing::debug!(reason = %e, "authentication gate rejected request"))?;

    tracing::debug!(principal_id = %principal.id, role = %principal.role, "principal resolved");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// RoleRequirement
///
/// The middleware state of a role gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleRequirement(pub &'static str);

/// require_role
///
/// Role gate. Expects `authenticate` to have run earlier in the same pipeline; a
/// request without a resolved principal is refused.
pub async fn require_role(
    State(RoleRequirement(role)): State<RoleRequirement>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let decision = match request.extensions().get::<Principal>() {
        Some(principal) => authorize_role(principal, role),
        None if role == ADMIN_ROLE => Err(ApiError::Forbidden(ADMINS_ONLY)),
        None => Err(ApiError::Forbidden(ROLE_DENIED)),
    };

    if let Err(e) = decision {
        tracing::warn!(required_role = role, "role gate rejected request");
        return Err(e);
    }
    Ok(next.run(request).await)
}

/// secret_key_gate
///
/// Buffers the JSON body, checks the operator secret against the configured one,
/// and forwards a re-encoded body without the secret field.
pub async fn secret_key_gate(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let bytes = to_bytes(body, MAX_GATED_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BadRequest(SECRET_MISSING))?;

    // Anything that is not a JSON object cannot carry the secret.
    let mut payload: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    if !payload.is_object() {
        return Err(ApiError::BadRequest(SECRET_MISSING));
    }

    if let Err(e) = check_secret_key(&mut payload, config.maintenance_secret.as_deref()) {
        tracing::warn!(reason = %e, "secret-key gate rejected request");
        return Err(e);
    }

    let sanitized = serde_json::to_vec(&payload).map_err(|_| ApiError::Internal)?;
    parts.headers.insert(header::CONTENT_LENGTH, sanitized.len().into());
    let request = Request::from_parts(parts, Body::from(sanitized));
    Ok(next.run(request).await)
}

// --- Pipeline ---

/// Gate
///
/// One step of a route-group pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    Authenticate,
    RequireRole(&'static str),
    SecretKey,
}

/// Pipeline
///
/// Declares, in execution order, the gates in front of a route group.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    gates: Vec<Gate>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticate(self) -> Self {
        self.gate(Gate::Authenticate)
    }

    pub fn require_role(self, role: &'static str) -> Self {
        self.gate(Gate::RequireRole(role))
    }

    pub fn require_admin(self) -> Self {
        self.require_role(ADMIN_ROLE)
    }

    pub fn secret_key(self) -> Self {
        self.gate(Gate::SecretKey)
    }

    pub fn gate(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// wrap
    ///
    /// Applies the gates to every route of `router`. Axum runs the most recently added
    /// route layer first, so the gates are layered in reverse to keep declared order.
    pub fn wrap(self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        self.gates
            .into_iter()
            .rev()
            .fold(router, |router, gate| match gate {
                Gate::Authenticate => router.route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    authenticate,
                )),
                Gate::RequireRole(role) => router.route_layer(middleware::from_fn_with_state(
                    RoleRequirement(role),
                    require_role,
                )),
                Gate::SecretKey => router.route_layer(middleware::from_fn_with_state(
                    state.config.clone(),
                    secret_key_gate,
                )),
            })
    }
}
