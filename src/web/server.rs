use axum::{routing::get, Router};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::tle::{
    spawn_scheduler, ElementSetProvider, NameMap, NameMapError, NameResolver, RefreshError,
    RefreshService, SpaceTrackClient, TleFetcher, TleStore,
};

use super::api::health as health_handlers;
use super::api::predict as predict_handlers;
use super::api::update as update_handlers;
use super::api_doc::ApiDoc;
use super::auth::{AccessGate, AppState};
use super::config::Config;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Name map error: {0}")]
    NameMap(#[from] NameMapError),
    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),
}

/// Wire the TLE pipeline for `config`: provider, name resolver, fetcher and store.
pub fn build_refresh_service(
    config: &Config,
) -> Result<RefreshService<SpaceTrackClient>, ServerError> {
    let provider = Arc::new(SpaceTrackClient::new(
        &config.space_track.base_url,
        &config.space_track.identity,
        &config.space_track.password,
        config.space_track.timeout,
    ));
    let names = NameMap::load(config.names.map_file.clone())?;
    log::info!(
        "Loaded {} cached satellite names from {}",
        names.len(),
        config.names.map_file.display()
    );
    let resolver = Arc::new(NameResolver::new(
        provider.clone(),
        names,
        config.names.retry_failed,
    ));
    let fetcher = TleFetcher::new(
        provider,
        config.tle.cache_file.clone(),
        config.tle.batch_size,
    );

    Ok(RefreshService::new(
        fetcher,
        Arc::new(TleStore::new()),
        resolver,
        config.tle.satellites.clone(),
    ))
}

pub fn router<P: ElementSetProvider + 'static>(state: AppState<P>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handlers::health::<P>))
        .route("/update_tle", get(update_handlers::update_tle::<P>))
        .route(
            "/{satid}/{lat}/{lon}/{alt}/{days}/{qualifier}",
            get(predict_handlers::predict::<P>),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), ServerError> {
    let bind_addr = config.web.bind.clone();
    let refresh = Arc::new(build_refresh_service(&config)?);

    let loaded = refresh.bootstrap().await?;
    log::info!("Serving {} satellites", loaded);
    let scheduler = spawn_scheduler(refresh.clone(), config.tle.refresh_interval);

    let state = AppState {
        store: refresh.store().clone(),
        gate: Arc::new(AccessGate::from_config(&config.auth)),
        refresh,
        config: Arc::new(config),
    };
    let app = router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.shutdown().await;
    log::info!("Server stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::mock::{MockProvider, MockState, ISS, SAT_43017, SAT_7530};
    use crate::tle::NameRetryPolicy;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
space_track:
  identity: u
  password: p
tle:
  satellites: [25544, 43017]
"#;

    struct Harness {
        _dir: TempDir,
        app: Router,
        provider: MockProvider,
    }

    /// Router over a mock provider, with a cache file holding the two configured satellites.
    async fn harness(keys: Option<&str>, state: MockState) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = Config::from_str(CONFIG).unwrap();
        config.tle.cache_file = dir.path().join("tle_cache.txt");
        std::fs::write(
            &config.tle.cache_file,
            format!("{}\n{}\n{}\n{}\n", ISS.1, ISS.2, SAT_43017.1, SAT_43017.2),
        )
        .unwrap();
        config.names.map_file = dir.path().join("names.json");
        if let Some(keys) = keys {
            let key_file = dir.path().join("api_keys.txt");
            std::fs::write(&key_file, keys).unwrap();
            config.auth.enabled = true;
            config.auth.api_key_file = key_file;
        }

        let provider = MockProvider::with_fixtures(state);
        let shared = Arc::new(provider.clone());
        let resolver = Arc::new(NameResolver::new(
            shared.clone(),
            NameMap::load(config.names.map_file.clone()).unwrap(),
            NameRetryPolicy::OnReload,
        ));
        let fetcher = TleFetcher::new(shared, config.tle.cache_file.clone(), 50);
        let refresh = Arc::new(RefreshService::new(
            fetcher,
            Arc::new(TleStore::new()),
            resolver,
            config.tle.satellites.clone(),
        ));
        refresh.bootstrap().await.unwrap();

        let state = AppState {
            store: refresh.store().clone(),
            gate: Arc::new(AccessGate::from_config(&config.auth)),
            refresh,
            config: Arc::new(config),
        };
        Harness {
            _dir: dir,
            app: router(state),
            provider,
        }
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_reports_cached_count() {
        let h = harness(None, MockState::default()).await;
        let (status, body) = get(&h.app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["satellites"], 2);
    }

    #[tokio::test]
    async fn prediction_errors() {
        let h = harness(None, MockState::default()).await;

        let (status, body) = get(&h.app, "/99999/45/10/0/1/0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("99999"));

        let (status, body) = get(&h.app, "/25544/north/10/0/1/0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("lat"));
    }

    #[tokio::test]
    async fn prediction_requires_key_when_enabled() {
        let h = harness(Some("secret\n"), MockState::default()).await;

        let (status, body) = get(&h.app, "/99999/45/10/0/1/0").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing API key");

        let (status, _) = get(&h.app, "/99999/45/10/0/1/0?apiKey=wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Past the gate, so the unknown satellite is reported
        let (status, _) = get(&h.app, "/99999/45/10/0/1/0?apiKey=secret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&h.app, "/99999/45/10/0/1/0&apiKey=secret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_adds_extra_ids() {
        let h = harness(None, MockState::default()).await;

        let uri = format!("/update_tle?extra_ids={},{}", SAT_7530.0, ISS.0);
        let (status, body) = get(&h.app, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["fetched_ids"], serde_json::json!([7530, 25544, 43017]));
        assert_eq!(body["added_ids"], serde_json::json!([7530]));

        let (_, health) = get(&h.app, "/health").await;
        assert_eq!(health["satellites"], 3);
        assert_eq!(h.provider.batches().last().unwrap(), &vec![ISS.0, SAT_43017.0, SAT_7530.0]);
    }

    #[tokio::test]
    async fn update_rejects_bad_input_and_keys() {
        let h = harness(Some("secret\n"), MockState::default()).await;

        let (status, body) = get(&h.app, "/update_tle?extra_ids=1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");

        let (status, body) = get(&h.app, "/update_tle?apiKey=secret&extra_ids=1,x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("extra_ids"));
    }

    #[tokio::test]
    async fn update_reports_upstream_failure() {
        let h = harness(
            None,
            MockState {
                reject_login: true,
                ..Default::default()
            },
        )
        .await;

        let (status, body) = get(&h.app, "/update_tle").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        let (_, health) = get(&h.app, "/health").await;
        assert_eq!(health["satellites"], 2);
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let h = harness(None, MockState::default()).await;
        let (status, body) = get(&h.app, "/api-doc/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/update_tle"].is_object());
    }
}
