use crate::{
    AppState,
    error::{ApiError, ROUTE_NOT_FOUND},
    models::{
        ActiveUsersResponse, FeedbackCountResponse, ModulesCompletedResponse, Principal,
        QuizAttemptsResponse, SessionsResponse, SettingsResponse, TotalUsersResponse,
        UpdateSettingsRequest,
    },
};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::Deserialize;

// --- Filter Structs ---

/// ActiveUsersQuery
///
/// Query parameters for GET /admin/analytics/active-users.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ActiveUsersQuery {
    /// One of `day`, `week` (default) or `month`.
    pub period: Option<String>,
}

/// active_window_start
///
/// Start of the window counted as "active" for `period`. Unknown labels do not shift
/// the window at all.
pub fn active_window_start(period: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        "day" => now - TimeDelta::days(1),
        "week" => now - TimeDelta::days(7),
        "month" => now.checked_sub_months(Months::new(1)).unwrap_or(now),
        _ => now,
    }
}

// --- Handlers ---

/// get_me
///
/// [Authenticated Route] Returns the principal resolved by the authentication gate.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Profile", body = Principal),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn get_me(principal: Principal) -> Json<Principal> {
    Json(principal)
}

/// get_system_settings
///
/// [Authenticated Route] Reads the global settings. The client route guard polls this
/// with the user's credential to learn whether maintenance mode is on.
#[utoipa::path(
    get,
    path = "/api/v1/admin/system-settings",
    responses(
        (status = 200, description = "Settings", body = SettingsResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody)
    )
)]
pub async fn get_system_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.repo.get_system_settings().await?;
    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

/// update_system_settings
///
/// [Admin Route] Partial update of the global settings, including the maintenance
/// toggle. Sits behind authentication, the admin role gate and the secret-key gate, so
/// the body seen here no longer carries the operator secret.
#[utoipa::path(
    put,
    path = "/api/v1/admin/system-settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated", body = SettingsResponse),
        (status = 400, description = "Secret key missing", body = crate::error::ErrorBody),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody),
        (status = 403, description = "Not an admin or bad secret", body = crate::error::ErrorBody)
    )
)]
pub async fn update_system_settings(
    principal: Principal,
    State(state): State<AppState>,
    Json(patch): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let maintenance_change = patch.maintenance_mode;
    let settings = state.repo.update_system_settings(patch).await?;

    tracing::info!(
        admin_id = %principal.id,
        ?maintenance_change,
        maintenance_mode = settings.maintenance_mode,
        "system settings updated"
    );

    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

/// get_total_users
///
/// [Admin Route] Number of registered users.
#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/total-users",
    responses((status = 200, description = "Total users", body = TotalUsersResponse))
)]
pub async fn get_total_users(
    State(state): State<AppState>,
) -> Result<Json<TotalUsersResponse>, ApiError> {
    let total_users = state.repo.count_users().await?;
    Ok(Json(TotalUsersResponse { total_users }))
}

/// get_active_users
///
/// [Admin Route] Users that joined within the requested period.
#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/active-users",
    params(ActiveUsersQuery),
    responses((status = 200, description = "Active users", body = ActiveUsersResponse))
)]
pub async fn get_active_users(
    State(state): State<AppState>,
    Query(query): Query<ActiveUsersQuery>,
) -> Result<Json<ActiveUsersResponse>, ApiError> {
    let period = query.period.unwrap_or_else(|| "week".to_string());
    let since = active_window_start(&period, Utc::now());
    let active_users = state.repo.count_users_since(since).await?;
    Ok(Json(ActiveUsersResponse {
        active_users,
        period,
    }))
}

/// get_sessions
///
/// [Admin Route] Total learning sessions.
#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/sessions",
    responses((status = 200, description = "Sessions", body = SessionsResponse))
)]
pub async fn get_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let total_sessions = state.repo.count_sessions().await?;
    Ok(Json(SessionsResponse { total_sessions }))
}

/// get_modules_completed
///
/// [Admin Route] Users whose status is `completed`.
#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/modules-completed",
    responses((status = 200, description = "Completed modules", body = ModulesCompletedResponse))
)]
pub async fn get_modules_completed(
    State(state): State<AppState>,
) -> Result<Json<ModulesCompletedResponse>, ApiError> {
    let modules_completed = state.repo.count_users_with_status("completed").await?;
    Ok(Json(ModulesCompletedResponse { modules_completed }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/quiz-attempts",
    responses((status = 200, description = "Quiz attempts", body = QuizAttemptsResponse))
)]
pub async fn get_quiz_attempts(
    State(state): State<AppState>,
) -> Result<Json<QuizAttemptsResponse>, ApiError> {
    let quiz_attempts = state.repo.count_quiz_attempts().await?;
    Ok(Json(QuizAttemptsResponse { quiz_attempts }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics/feedback",
    responses((status = 200, description = "Feedback submitted", body = FeedbackCountResponse))
)]
pub async fn get_feedback_count(
    State(state): State<AppState>,
) -> Result<Json<FeedbackCountResponse>, ApiError> {
    let feedback_count = state.repo.count_feedback().await?;
    Ok(Json(FeedbackCountResponse { feedback_count }))
}

/// admin_dashboard
///
/// [Admin Route] Minimal landing endpoint for the admin area.
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses((status = 200, description = "Greeting", body = String))
)]
pub async fn admin_dashboard() -> &'static str {
    "Hello Admin"
}

/// not_found
///
/// Fallback for every unmatched route.
pub async fn not_found() -> ApiError {
    ApiError::NotFound(ROUTE_NOT_FOUND)
}
