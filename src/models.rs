use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// The role label granting access to the admin area.
pub const ADMIN_ROLE: &str = "admin";

// --- Identity ---

/// Principal
///
/// The authenticated identity attached to a request. Loaded from the `users` table with
/// the sensitive columns (`password_hash`, `refresh_token`) left out of the projection,
/// so they never enter the request context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    // The RBAC field: 'admin' or any other label (usually 'user').
    pub role: String,
    // Account status as recorded by the identity store, e.g. 'active' or 'completed'.
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

// --- System Settings ---

/// SystemSettings
///
/// Global platform settings owned by the admin-settings store. Stored as a single row;
/// missing JSON fields fall back to the defaults so partial payloads still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    pub site_name: String,
    pub maintenance_mode: bool,
    pub registration_enabled: bool,
    pub email_notifications: bool,
    pub max_users_per_course: i32,
    // Minutes.
    pub session_timeout: i32,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            site_name: "Learning Portal".to_string(),
            maintenance_mode: false,
            registration_enabled: true,
            email_notifications: true,
            max_users_per_course: 100,
            session_timeout: 30,
        }
    }
}

impl SystemSettings {
    /// apply
    ///
    /// Merges a partial update into the current settings. Only fields present in the
    /// patch are changed.
    pub fn apply(&mut self, patch: UpdateSettingsRequest) {
        if let Some(site_name) = patch.site_name {
            self.site_name = site_name;
        }
        if let Some(maintenance_mode) = patch.maintenance_mode {
            self.maintenance_mode = maintenance_mode;
        }
        if let Some(registration_enabled) = patch.registration_enabled {
            self.registration_enabled = registration_enabled;
        }
        if let Some(email_notifications) = patch.email_notifications {
            self.email_notifications = email_notifications;
        }
        if let Some(max_users_per_course) = patch.max_users_per_course {
            self.max_users_per_course = max_users_per_course;
        }
        if let Some(session_timeout) = patch.session_timeout {
            self.session_timeout = session_timeout;
        }
    }
}

/// SettingsResponse
///
/// Envelope returned by both settings endpoints and consumed by the client guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SettingsResponse {
    pub success: bool,
    #[serde(default)]
    pub settings: SystemSettings,
}

/// UpdateSettingsRequest
///
/// Partial update payload for PUT /admin/system-settings. The operator secret travels in
/// the same body but is stripped by the secret-key gate before this is deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_users_per_course: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<i32>,
}

// --- Analytics Counters (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TotalUsersResponse {
    pub total_users: i64,
}

/// ActiveUsersResponse
///
/// Echoes the requested period back so the dashboard can label the figure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUsersResponse {
    pub active_users: i64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub total_sessions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ModulesCompletedResponse {
    pub modules_completed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptsResponse {
    pub quiz_attempts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCountResponse {
    pub feedback_count: i64,
}
