//! Axum HTTP server for the garden gateway.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::header,
    routing::{get, post, put},
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;
use crate::garden::GardenService;
use crate::gateway::handlers::{garden_handler, health_handler, initiate_handler, update_handler};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub service: Arc<GardenService>,
}

/// Build the gateway router with tracing and security headers applied.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let public = Router::new().route("/api/health", get(health_handler));

    let garden = Router::new()
        .route("/api/garden", get(garden_handler))
        .route("/api/garden/initiate", post(initiate_handler))
        .route("/api/garden/update", put(update_handler));

    Router::new()
        .merge(public)
        .merge(garden)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn start_server(
    addr: &str,
    state: Arc<GatewayState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), GatewayError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound = listener.local_addr().map_err(|e| GatewayError::Bind {
        addr: addr.to_string(),
        reason: format!("failed to get local addr: {e}"),
    })?;
    tracing::info!(%bound, "garden gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("garden gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Serve(e.to_string()))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::classifier::{
        Classified, HabitClassifier, InitialAssessment, PlantSeed, TrendRequest,
    };
    use crate::config::ClassifierConfig;
    use crate::db::{GardenStore, LibSqlBackend};
    use crate::error::ClassifierError;
    use crate::garden::{GardenEngine, InitialHabits, Polarity, Verdict, Verdicts};

    struct SteadyClassifier;

    #[async_trait::async_trait]
    impl HabitClassifier for SteadyClassifier {
        async fn initiate(
            &self,
            _habits: &InitialHabits,
        ) -> Result<Classified<InitialAssessment>, ClassifierError> {
            Ok(Classified::Structured(InitialAssessment::from_fn(|_| {
                PlantSeed {
                    polarity_a: Polarity::Good,
                    polarity_b: Polarity::Bad,
                    age: 2,
                    health: 5,
                }
            })))
        }

        async fn classify(
            &self,
            _request: &TrendRequest,
        ) -> Result<Classified<Verdicts>, ClassifierError> {
            Ok(Classified::Structured(Verdicts::from_fn(|_| {
                Verdict::Constant
            })))
        }
    }

    async fn router() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = LibSqlBackend::new_local(&dir.path().join("garden.db"))
            .await
            .unwrap();
        store.run_migrations().await.unwrap();
        let service = GardenService::new(
            Arc::new(store),
            Arc::new(SteadyClassifier),
            GardenEngine::default(),
            ClassifierConfig::default(),
        );
        let state = Arc::new(GatewayState {
            service: Arc::new(service),
        });
        (dir, build_router(state))
    }

    #[tokio::test]
    async fn health_needs_no_identity() {
        let (_dir, app) = router().await;
        let resp = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn garden_routes_require_identity() {
        let (_dir, app) = router().await;
        let resp = app
            .oneshot(Request::get("/api/garden").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_uses_put() {
        let (_dir, app) = router().await;
        let resp = app
            .oneshot(
                Request::post("/api/garden/update")
                    .header("x-user-id", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
