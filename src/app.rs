use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::{DatabaseError, DatabaseManager, MemoryStore, PgStore, Store};
use crate::handlers::places;
use crate::middleware::jwt_auth_middleware;
use crate::services::{geocoder, Geocoder, GeocodeError, ImageStore, LocalImageStore, PlaceService};

/// Multipart framing and text fields on top of the image itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state. Built once by the entry point.
#[derive(Clone)]
pub struct AppState {
    pub places: Arc<PlaceService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(places: PlaceService, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            places: Arc::new(places),
            jwt_secret: jwt_secret.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Geocoder(#[from] GeocodeError),
}

/// Picks PostgreSQL when a database URL is configured, the in-memory store otherwise.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, StartupError> {
    if config.database.url.is_some() {
        let pool = DatabaseManager::connect(&config.database).await?;
        DatabaseManager::migrate(&pool).await?;
        Ok(Arc::new(PgStore::new(pool)))
    } else {
        tracing::warn!("DATABASE_URL is not set, using the in-memory store; data is lost on restart");
        Ok(Arc::new(MemoryStore::new()))
    }
}

/// Wires the place service to its store and collaborators.
pub fn build_state(config: &AppConfig, store: Arc<dyn Store>) -> Result<AppState, StartupError> {
    let geocoder: Arc<dyn Geocoder> = Arc::from(geocoder::from_config(&config.geocoder)?);
    let images: Arc<dyn ImageStore> =
        Arc::new(LocalImageStore::new(config.api.upload_dir.clone(), config.api.max_upload_bytes));

    let service = PlaceService::new(store, geocoder, images);
    Ok(AppState::new(service, config.security.jwt_secret.as_str()))
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(place_routes(state.clone()))
        .nest_service("/uploads/images", ServeDir::new(&config.api.upload_dir))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.security.cors_origins))
                .layer(DefaultBodyLimit::max(config.api.max_upload_bytes + FORM_OVERHEAD_BYTES)),
        )
        .with_state(state)
}

fn place_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/places/user/:uid", get(places::get_by_user))
        .route("/api/places/:pid", get(places::get_by_id));

    let protected = Router::new()
        .route("/api/places", post(places::create))
        .route("/api/places/:pid", patch(places::update).delete(places::delete))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware));

    public.merge(protected)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Places API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "places": "/api/places/:pid, /api/places/user/:uid (public reads)",
            "write": "POST /api/places, PATCH|DELETE /api/places/:pid (bearer token)",
            "images": "/uploads/images/:file",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.places.store().health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
