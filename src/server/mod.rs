//! HTTP listing of the published streams.
//!
//! `GET /` answers with a JSON object mapping stream name to source file,
//! `GET /health` with a liveness document.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use loopcast_core::{Error, Result, StreamAssignment};

/// Streams currently advertised by the listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct StreamListing {
    streams: Arc<RwLock<BTreeMap<String, String>>>,
}

impl StreamListing {
    pub fn from_assignments(assignments: &[StreamAssignment]) -> Self {
        let streams = assignments
            .iter()
            .map(|a| (a.stream_name.clone(), a.source_file.clone()))
            .collect();
        Self {
            streams: Arc::new(RwLock::new(streams)),
        }
    }

    /// Stop advertising a stream, e.g. after its process ended.
    pub fn remove(&self, stream_name: &str) -> bool {
        self.streams.write().remove(stream_name).is_some()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.streams.read().clone()
    }
}

/// Build the listing router.
pub fn build_router(listing: StreamListing) -> Router {
    Router::new()
        .route("/", get(list_streams))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(listing)
}

async fn list_streams(State(listing): State<StreamListing>) -> Json<BTreeMap<String, String>> {
    Json(listing.snapshot())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serve the listing on `host:port` until a shutdown signal or `cancel`.
pub async fn serve(
    host: &str,
    port: u16,
    listing: StreamListing,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| Error::Internal(format!("failed to bind {host}:{port}: {e}")))?;

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listing streams on http://{addr}");
    }

    axum::serve(listener, build_router(listing))
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| Error::Internal(format!("listing server failed: {e}")))
}

/// Resolve on Ctrl+C, SIGTERM, or cancellation, then cancel `cancel` so
/// every other task observes the shutdown.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn listing() -> StreamListing {
        StreamListing::from_assignments(&[
            StreamAssignment::derived("Lobby.mp4"),
            StreamAssignment::derived("dock.mov"),
        ])
    }

    #[tokio::test]
    async fn root_lists_streams() {
        let response = build_router(listing())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lobby": "Lobby.mp4", "dock": "dock.mov"})
        );
    }

    #[tokio::test]
    async fn removed_stream_disappears() {
        let listing = listing();
        assert!(listing.remove("lobby"));
        assert!(!listing.remove("lobby"));

        let response = build_router(listing)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"dock": "dock.mov"}));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = build_router(StreamListing::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(serve("127.0.0.1", 0, StreamListing::default(), cancel.clone()));
        cancel.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
