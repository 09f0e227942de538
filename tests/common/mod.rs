#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use learning_portal::{
    AppState, create_router,
    auth::{Claims, issue_token},
    config::AppConfig,
    models::{Principal, SystemSettings, UpdateSettingsRequest},
    repository::{Repository, RepositoryError, RepositoryState},
};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const TEST_MAINTENANCE_SECRET: &str = "maintenance-secret-abc";

pub const USER_ID: Uuid = Uuid::from_u128(1);
pub const ADMIN_ID: Uuid = Uuid::from_u128(2);

// --- Mock Repository ---

/// In-memory stand-in for the stores. `handler_calls` counts every call that only a
/// handler makes, so tests can prove a handler never ran.
pub struct MockRepo {
    pub principals: HashMap<Uuid, Principal>,
    pub settings: Mutex<SystemSettings>,
    pub fail_lookups: bool,
    pub handler_calls: AtomicUsize,
    pub last_patch: Mutex<Option<UpdateSettingsRequest>>,
    pub last_since: Mutex<Option<DateTime<Utc>>>,
}

impl Default for MockRepo {
    fn default() -> Self {
        let mut principals = HashMap::new();
        principals.insert(USER_ID, principal(USER_ID, "user"));
        principals.insert(ADMIN_ID, principal(ADMIN_ID, "admin"));
        Self {
            principals,
            settings: Mutex::new(SystemSettings::default()),
            fail_lookups: false,
            handler_calls: AtomicUsize::new(0),
            last_patch: Mutex::new(None),
            last_since: Mutex::new(None),
        }
    }
}

impl MockRepo {
    pub fn calls(&self) -> usize {
        self.handler_calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.handler_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>, RepositoryError> {
        if self.fail_lookups {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.principals.get(&id).cloned())
    }

    async fn get_system_settings(&self) -> Result<SystemSettings, RepositoryError> {
        self.record();
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn update_system_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SystemSettings, RepositoryError> {
        self.record();
        *self.last_patch.lock().unwrap() = Some(patch.clone());
        let mut settings = self.settings.lock().unwrap();
        settings.apply(patch);
        Ok(settings.clone())
    }

    async fn count_users(&self) -> Result<i64, RepositoryError> {
        self.record();
        Ok(self.principals.len() as i64)
    }

    async fn count_users_since(&self, since: DateTime<Utc>) -> Result<i64, RepositoryError> {
        self.record();
        *self.last_since.lock().unwrap() = Some(since);
        Ok(1)
    }

    async fn count_users_with_status(&self, _status: &str) -> Result<i64, RepositoryError> {
        self.record();
        Ok(4)
    }

    async fn count_sessions(&self) -> Result<i64, RepositoryError> {
        self.record();
        Ok(12)
    }

    async fn count_quiz_attempts(&self) -> Result<i64, RepositoryError> {
        self.record();
        Ok(7)
    }

    async fn count_feedback(&self) -> Result<i64, RepositoryError> {
        self.record();
        Ok(3)
    }
}

pub fn principal(id: Uuid, role: &str) -> Principal {
    Principal {
        id,
        email: format!("{}@example.com", role),
        name: role.to_string(),
        role: role.to_string(),
        status: "active".to_string(),
        created_at: Utc::now(),
    }
}

// --- State & Router ---

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        maintenance_secret: Some(TEST_MAINTENANCE_SECRET.to_string()),
        ..AppConfig::default()
    }
}

pub fn app_state(repo: Arc<MockRepo>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config: test_config(),
    }
}

pub fn app(repo: Arc<MockRepo>) -> Router {
    create_router(app_state(repo))
}

// --- Credentials ---

pub fn token_for(id: Uuid) -> String {
    issue_token(id, Duration::from_secs(3600), TEST_JWT_SECRET).unwrap()
}

/// A token that expired an hour ago (well past the default validation leeway).
pub fn expired_token(id: Uuid) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: Some(id),
        iat: (now - 7200) as usize,
        exp: (now - 3600) as usize,
        ..Claims::default()
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

// --- Request helpers ---

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn put_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn assert_error(response: Response, status: StatusCode, message: &str) {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["message"], Value::String(message.to_string()));
}
