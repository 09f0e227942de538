mod common;

use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::{self, post},
};
use chrono::{TimeDelta, TimeZone, Utc};
use common::*;
use learning_portal::{
    AppState, Pipeline,
    error::{
        ADMINS_ONLY, ApiError, INVALID_ACCESS_TOKEN, INVALID_OR_EXPIRED, NOT_LOGGED_IN,
        ROLE_DENIED, ROUTE_NOT_FOUND, SECRET_INVALID, SECRET_MISSING,
    },
    gates::{Gate, SECRET_FIELD, authorize_role, check_secret_key},
    handlers::active_window_start,
    models::Principal,
};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

const SETTINGS_URI: &str = "/api/v1/admin/system-settings";

// --- Role authorizer ---

#[test]
fn test_role_authorizer_is_exact_match() {
    let admin = principal(ADMIN_ID, "admin");
    let user = principal(USER_ID, "user");

    assert_eq!(authorize_role(&admin, "admin"), Ok(()));
    assert_eq!(
        authorize_role(&user, "admin"),
        Err(ApiError::Forbidden(ADMINS_ONLY))
    );
    assert_eq!(authorize_role(&user, "user"), Ok(()));
    assert_eq!(
        authorize_role(&admin, "instructor"),
        Err(ApiError::Forbidden(ROLE_DENIED))
    );
    // Labels are case-sensitive.
    let shouting = principal(USER_ID, "ADMIN");
    assert!(authorize_role(&shouting, "admin").is_err());
}

// --- Secret-key gate (pure) ---

#[test]
fn test_secret_gate_strips_secret_on_match() {
    let mut body = json!({ "secretKey": "s3cret", "maintenanceMode": true });
    assert_eq!(check_secret_key(&mut body, Some("s3cret")), Ok(()));
    assert_eq!(body, json!({ "maintenanceMode": true }));
}

#[test]
fn test_secret_gate_rejections() {
    let mut missing = json!({ "maintenanceMode": true });
    assert_eq!(
        check_secret_key(&mut missing, Some("s3cret")),
        Err(ApiError::BadRequest(SECRET_MISSING))
    );

    let mut empty = json!({ "secretKey": "" });
    assert_eq!(
        check_secret_key(&mut empty, Some("s3cret")),
        Err(ApiError::BadRequest(SECRET_MISSING))
    );

    let mut wrong = json!({ "secretKey": "guess" });
    assert_eq!(
        check_secret_key(&mut wrong, Some("s3cret")),
        Err(ApiError::Forbidden(SECRET_INVALID))
    );
    // Rejected bodies are left untouched.
    assert_eq!(wrong[SECRET_FIELD], "guess");

    let mut unconfigured = json!({ "secretKey": "anything" });
    assert_eq!(
        check_secret_key(&mut unconfigured, None),
        Err(ApiError::Forbidden(SECRET_INVALID))
    );

    let mut numeric = json!({ "secretKey": 1234 });
    assert_eq!(
        check_secret_key(&mut numeric, Some("1234")),
        Err(ApiError::Forbidden(SECRET_INVALID))
    );
}

#[test]
fn test_secret_gate_treats_false_and_zero_as_missing() {
    for value in [json!(false), json!(0), json!(0.0), Value::Null] {
        let mut body = json!({ "secretKey": value, "maintenanceMode": true });
        assert_eq!(
            check_secret_key(&mut body, Some("s3cret")),
            Err(ApiError::BadRequest(SECRET_MISSING)),
            "secretKey = {}",
            body[SECRET_FIELD]
        );
    }

    let mut truthy = json!({ "secretKey": true });
    assert_eq!(
        check_secret_key(&mut truthy, Some("true")),
        Err(ApiError::Forbidden(SECRET_INVALID))
    );
}

// --- Pipeline composition ---

#[test]
fn test_pipeline_keeps_declared_order() {
    let pipeline = Pipeline::new().authenticate().require_admin().secret_key();
    assert_eq!(
        pipeline.gates(),
        &[Gate::Authenticate, Gate::RequireRole("admin"), Gate::SecretKey]
    );
}

/// A router whose only handler echoes the body it receives, behind the secret gate.
fn echo_app(gates: Pipeline) -> Router {
    let state: AppState = app_state(Arc::new(MockRepo::default()));
    let routes = Router::new().route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }));
    gates.wrap(routes, &state).with_state(state)
}

fn post_echo(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_forwarded_body_never_contains_secret() {
    let app = echo_app(Pipeline::new().secret_key());
    let response = send(
        app,
        post_echo(
            json!({ "secretKey": TEST_MAINTENANCE_SECRET, "siteName": "Academy" }),
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = json_body(response).await;
    assert_eq!(echoed, json!({ "siteName": "Academy" }));
    assert!(echoed.get(SECRET_FIELD).is_none());
}

#[tokio::test]
async fn test_secret_gate_alone_rejects_non_json_body() {
    let app = echo_app(Pipeline::new().secret_key());
    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from("secretKey=abc"))
        .unwrap();
    assert_error(send(app, request).await, StatusCode::BAD_REQUEST, SECRET_MISSING).await;
}

#[tokio::test]
async fn test_first_failing_gate_decides() {
    // Authentication is declared first, so a request failing both gates is a 401.
    let app = echo_app(Pipeline::new().authenticate().secret_key());
    let response = send(app, post_echo(json!({ "siteName": "x" }), None)).await;
    assert_error(response, StatusCode::UNAUTHORIZED, NOT_LOGGED_IN).await;

    // Reversed declaration: the secret gate answers first.
    let app = echo_app(Pipeline::new().secret_key().authenticate());
    let response = send(app, post_echo(json!({ "siteName": "x" }), None)).await;
    assert_error(response, StatusCode::BAD_REQUEST, SECRET_MISSING).await;
}

#[tokio::test]
async fn test_role_gate_without_authentication_refuses() {
    let state: AppState = app_state(Arc::new(MockRepo::default()));
    let routes = Router::new().route("/only-admins", routing::get(|| async { "in" }));
    let app = Pipeline::new()
        .require_admin()
        .wrap(routes, &state)
        .with_state(state);

    let response = send(app, get("/only-admins", Some(&token_for(ADMIN_ID)))).await;
    assert_error(response, StatusCode::FORBIDDEN, ADMINS_ONLY).await;
}

// --- Full router: authenticated group ---

#[tokio::test]
async fn test_health_is_public() {
    let response = send(app(Arc::new(MockRepo::default())), get("/api/v1/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_route_without_credential_never_runs_handler() {
    let repo = Arc::new(MockRepo::default());
    let response = send(app(repo.clone()), get(SETTINGS_URI, None)).await;

    assert_error(response, StatusCode::UNAUTHORIZED, NOT_LOGGED_IN).await;
    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_protected_route_with_expired_credential() {
    let repo = Arc::new(MockRepo::default());
    let response = send(app(repo.clone()), get(SETTINGS_URI, Some(&expired_token(USER_ID)))).await;

    assert_error(response, StatusCode::UNAUTHORIZED, INVALID_OR_EXPIRED).await;
    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_protected_route_for_deleted_principal() {
    let repo = Arc::new(MockRepo::default());
    let token = token_for(Uuid::new_v4());
    let response = send(app(repo.clone()), get(SETTINGS_URI, Some(&token))).await;

    assert_error(response, StatusCode::UNAUTHORIZED, INVALID_ACCESS_TOKEN).await;
    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_regular_user_can_read_settings() {
    let repo = Arc::new(MockRepo::default());
    repo.settings.lock().unwrap().maintenance_mode = true;

    let response = send(app(repo.clone()), get(SETTINGS_URI, Some(&token_for(USER_ID)))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["settings"]["maintenanceMode"], true);
    assert_eq!(body["settings"]["siteName"], "Learning Portal");
}

#[tokio::test]
async fn test_me_returns_sanitized_principal_from_cookie() {
    let repo = Arc::new(MockRepo::default());
    let request = Request::builder()
        .uri("/api/v1/me")
        .header(header::COOKIE, format!("token={}", token_for(USER_ID)))
        .body(Body::empty())
        .unwrap();
    let response = send(app(repo), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let me: Principal = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(me.id, USER_ID);
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("refreshToken").is_none());
}

// --- Full router: admin groups ---

#[tokio::test]
async fn test_analytics_forbidden_for_non_admin() {
    let repo = Arc::new(MockRepo::default());
    let response = send(
        app(repo.clone()),
        get("/api/v1/admin/analytics/total-users", Some(&token_for(USER_ID))),
    )
    .await;

    assert_error(response, StatusCode::FORBIDDEN, ADMINS_ONLY).await;
    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_analytics_counters_for_admin() {
    let repo = Arc::new(MockRepo::default());
    let admin = token_for(ADMIN_ID);

    let cases = [
        ("/api/v1/admin/analytics/total-users", "totalUsers", 2),
        ("/api/v1/admin/analytics/sessions", "totalSessions", 12),
        ("/api/v1/admin/analytics/modules-completed", "modulesCompleted", 4),
        ("/api/v1/admin/analytics/quiz-attempts", "quizAttempts", 7),
        ("/api/v1/admin/analytics/feedback", "feedbackCount", 3),
    ];

    for (uri, field, expected) in cases {
        let response = send(app(repo.clone()), get(uri, Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(json_body(response).await[field], expected, "{uri}");
    }
}

#[tokio::test]
async fn test_active_users_defaults_to_week() {
    let repo = Arc::new(MockRepo::default());
    let response = send(
        app(repo.clone()),
        get("/api/v1/admin/analytics/active-users", Some(&token_for(ADMIN_ID))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["period"], "week");
    assert_eq!(body["activeUsers"], 1);

    let since = repo.last_since.lock().unwrap().unwrap();
    let age = Utc::now() - since;
    assert!(age >= TimeDelta::days(7) && age < TimeDelta::days(7) + TimeDelta::minutes(1));
}

#[test]
fn test_active_window_start_periods() {
    let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
    assert_eq!(active_window_start("day", now), now - TimeDelta::days(1));
    assert_eq!(active_window_start("week", now), now - TimeDelta::days(7));
    // Clamped to the end of the shorter month.
    assert_eq!(
        active_window_start("month", now),
        Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
    );
    assert_eq!(active_window_start("fortnight", now), now);
}

#[tokio::test]
async fn test_admin_dashboard_route() {
    let repo = Arc::new(MockRepo::default());

    let response = send(app(repo.clone()), get("/api/admin/dashboard", Some(&token_for(USER_ID)))).await;
    assert_error(response, StatusCode::FORBIDDEN, ADMINS_ONLY).await;

    let response = send(app(repo), get("/api/admin/dashboard", Some(&token_for(ADMIN_ID)))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Maintenance toggle: authenticate -> admin -> secret key ---

#[tokio::test]
async fn test_maintenance_toggle_requires_all_gates() {
    let repo = Arc::new(MockRepo::default());
    let body = json!({ "secretKey": TEST_MAINTENANCE_SECRET, "maintenanceMode": true });

    // No credential.
    let response = send(app(repo.clone()), put_json(SETTINGS_URI, None, body.clone())).await;
    assert_error(response, StatusCode::UNAUTHORIZED, NOT_LOGGED_IN).await;

    // Right secret, wrong role.
    let response = send(
        app(repo.clone()),
        put_json(SETTINGS_URI, Some(&token_for(USER_ID)), body.clone()),
    )
    .await;
    assert_error(response, StatusCode::FORBIDDEN, ADMINS_ONLY).await;

    // Admin, missing secret.
    let response = send(
        app(repo.clone()),
        put_json(SETTINGS_URI, Some(&token_for(ADMIN_ID)), json!({ "maintenanceMode": true })),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, SECRET_MISSING).await;

    // Admin, wrong secret.
    let response = send(
        app(repo.clone()),
        put_json(
            SETTINGS_URI,
            Some(&token_for(ADMIN_ID)),
            json!({ "secretKey": "nope", "maintenanceMode": true }),
        ),
    )
    .await;
    assert_error(response, StatusCode::FORBIDDEN, SECRET_INVALID).await;

    assert_eq!(repo.calls(), 0);
    assert!(!repo.settings.lock().unwrap().maintenance_mode);
}

#[tokio::test]
async fn test_maintenance_toggle_succeeds_for_admin_with_secret() {
    let repo = Arc::new(MockRepo::default());
    let response = send(
        app(repo.clone()),
        put_json(
            SETTINGS_URI,
            Some(&token_for(ADMIN_ID)),
            json!({ "secretKey": TEST_MAINTENANCE_SECRET, "maintenanceMode": true }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["settings"]["maintenanceMode"], true);
    // Untouched fields keep their values.
    assert_eq!(body["settings"]["registrationEnabled"], true);

    let patch = repo.last_patch.lock().unwrap().clone().unwrap();
    assert_eq!(patch.maintenance_mode, Some(true));
    assert_eq!(patch.site_name, None);
    assert!(repo.settings.lock().unwrap().maintenance_mode);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = send(app(Arc::new(MockRepo::default())), get("/api/v1/nope", None)).await;
    assert_error(response, StatusCode::NOT_FOUND, ROUTE_NOT_FOUND).await;
}
