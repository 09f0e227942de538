use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Server side: identity, gates, handlers and persistence.
pub mod auth;
pub mod config;
pub mod error;
pub mod gates;
pub mod handlers;
pub mod models;
pub mod repository;

// Route groups (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// Client side: the route guard and its settings/countdown companions.
pub mod client;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use gates::Pipeline;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_me, handlers::get_system_settings, handlers::update_system_settings,
        handlers::get_total_users, handlers::get_active_users, handlers::get_sessions,
        handlers::get_modules_completed, handlers::get_quiz_attempts,
        handlers::get_feedback_count, handlers::admin_dashboard
    ),
    components(
        schemas(
            models::Principal, models::SystemSettings, models::SettingsResponse,
            models::UpdateSettingsRequest, models::TotalUsersResponse,
            models::ActiveUsersResponse, models::SessionsResponse,
            models::ModulesCompletedResponse, models::QuizAttemptsResponse,
            models::FeedbackCountResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "learning-portal", description = "Learning Portal access API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the store and the loaded
/// configuration (which carries the JWT and operator secrets).
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route groups, puts each behind its gate pipeline, and applies the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.frontend_url.as_deref());

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            Pipeline::new()
                .authenticate()
                .wrap(authenticated::authenticated_routes(), &state),
        )
        .merge(
            Pipeline::new()
                .authenticate()
                .require_admin()
                .wrap(admin::analytics_routes(), &state),
        )
        .merge(
            Pipeline::new()
                .authenticate()
                .require_admin()
                .secret_key()
                .wrap(admin::maintenance_routes(), &state),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api)
        .merge(
            Pipeline::new()
                .authenticate()
                .require_admin()
                .wrap(admin::dashboard_routes(), &state),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// cors_layer
///
/// With a configured frontend origin, cookies may cross origins (credentials allowed),
/// which forbids wildcards. Without one, any origin is accepted but no credentials.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = frontend_url.and_then(|url| match HeaderValue::from_str(url) {
        Ok(origin) => Some(origin),
        Err(_) => {
            tracing::warn!(url, "FRONTEND_URL is not a valid origin; falling back to any origin");
            None
        }
    });

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ]),
        None => CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any),
    }
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id`, so every log line
/// of one request is correlated. Credentials are never recorded.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
