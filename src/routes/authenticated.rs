use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any principal that passed the token verifier. Handlers receive the
/// resolved `Principal` from the request extensions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The sanitized principal of the caller.
        .route("/me", get(handlers::get_me))
        // GET /admin/system-settings
        // Read-only view of the global settings. Regular users need it too: the client
        // route guard reads the maintenance flag from here with the user's credential.
        .route(
            "/admin/system-settings",
            get(handlers::get_system_settings),
        )
}
