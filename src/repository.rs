use crate::models::{Principal, SystemSettings, UpdateSettingsRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Failure of the backing store. Callers log it and answer with a generic error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The abstract contract for the identity store, the admin-settings store and the
/// analytics counters. Handlers and the token verifier only see this trait, so tests
/// swap in hand-written mocks.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    // Resolves a principal by id, without password hash or refresh token.
    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, RepositoryError>;

    // --- System Settings ---
    // Returns the stored settings, or the defaults when none were saved yet.
    async fn get_system_settings(&self) -> Result<SystemSettings, RepositoryError>;
    // Merges the patch into the stored settings and returns the result.
    async fn update_system_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SystemSettings, RepositoryError>;

    // --- Analytics ---
    async fn count_users(&self) -> Result<i64, RepositoryError>;
    async fn count_users_since(&self, since: DateTime<Utc>) -> Result<i64, RepositoryError>;
    async fn count_users_with_status(&self, status: &str) -> Result<i64, RepositoryError>;
    async fn count_sessions(&self) -> Result<i64, RepositoryError>;
    async fn count_quiz_attempts(&self) -> Result<i64, RepositoryError>;
    async fn count_feedback(&self) -> Result<i64, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. The schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

const SETTINGS_COLUMNS: &str = "site_name, maintenance_mode, registration_enabled, \
     email_notifications, max_users_per_course, session_timeout";

#[async_trait]
impl Repository for PostgresRepository {
    /// find_principal
    ///
    /// The projection deliberately omits `password_hash` and `refresh_token`.
    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, RepositoryError> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT id, email, name, role, status, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(principal)
    }

    async fn get_system_settings(&self) -> Result<SystemSettings, RepositoryError> {
        let settings = sqlx::query_as::<_, SystemSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM system_settings WHERE id = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings.unwrap_or_default())
    }

    /// update_system_settings
    ///
    /// Read-merge-upsert inside one transaction so concurrent partial updates cannot
    /// interleave between the read and the write.
    async fn update_system_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SystemSettings, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Make sure there is a row to lock, even if it was removed after seeding.
        let defaults = SystemSettings::default();
        sqlx::query(&format!(
            "INSERT INTO system_settings (id, {SETTINGS_COLUMNS}) \
             VALUES (1, $1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING"
        ))
        .bind(&defaults.site_name)
        .bind(defaults.maintenance_mode)
        .bind(defaults.registration_enabled)
        .bind(defaults.email_notifications)
        .bind(defaults.max_users_per_course)
        .bind(defaults.session_timeout)
        .execute(&mut *tx)
        .await?;

        let mut settings = sqlx::query_as::<_, SystemSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM system_settings WHERE id = 1 FOR UPDATE"
        ))
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or_default();

        settings.apply(patch);

        let saved = sqlx::query_as::<_, SystemSettings>(&format!(
            r#"
            INSERT INTO system_settings (id, {SETTINGS_COLUMNS}, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO UPDATE SET
                site_name = EXCLUDED.site_name,
                maintenance_mode = EXCLUDED.maintenance_mode,
                registration_enabled = EXCLUDED.registration_enabled,
                email_notifications = EXCLUDED.email_notifications,
                max_users_per_course = EXCLUDED.max_users_per_course,
                session_timeout = EXCLUDED.session_timeout,
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(&settings.site_name)
        .bind(settings.maintenance_mode)
        .bind(settings.registration_enabled)
        .bind(settings.email_notifications)
        .bind(settings.max_users_per_course)
        .bind(settings.session_timeout)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn count_users(&self) -> Result<i64, RepositoryError> {
        self.count("SELECT COUNT(*) FROM users").await
    }

    async fn count_users_since(&self, since: DateTime<Utc>) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_users_with_status(&self, status: &str) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_sessions(&self) -> Result<i64, RepositoryError> {
        self.count("SELECT COUNT(*) FROM learning_sessions").await
    }

    async fn count_quiz_attempts(&self) -> Result<i64, RepositoryError> {
        self.count("SELECT COUNT(*) FROM quiz_attempts").await
    }

    async fn count_feedback(&self) -> Result<i64, RepositoryError> {
        self.count("SELECT COUNT(*) FROM feedback").await
    }
}
