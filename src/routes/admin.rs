use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Routes restricted to principals with the 'admin' role. The role check is a gate in
/// front of the whole group, so none of these handlers repeat it.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/analytics/total-users
        .route(
            "/admin/analytics/total-users",
            get(handlers::get_total_users),
        )
        // GET /admin/analytics/active-users?period=day|week|month
        .route(
            "/admin/analytics/active-users",
            get(handlers::get_active_users),
        )
        .route("/admin/analytics/sessions", get(handlers::get_sessions))
        .route(
            "/admin/analytics/modules-completed",
            get(handlers::get_modules_completed),
        )
        .route(
            "/admin/analytics/quiz-attempts",
            get(handlers::get_quiz_attempts),
        )
        .route(
            "/admin/analytics/feedback",
            get(handlers::get_feedback_count),
        )
}

/// Maintenance operations. On top of the admin role these require the operator
/// secret in the request body.
pub fn maintenance_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/system-settings
        // Partial settings update; this is where maintenance mode is toggled.
        .route(
            "/admin/system-settings",
            put(handlers::update_system_settings),
        )
}

/// The admin landing endpoint, mounted outside the versioned API prefix.
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/api/admin/dashboard", get(handlers::admin_dashboard))
}
