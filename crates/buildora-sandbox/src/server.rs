//! Axum preview server: the browser tab is the isolated execution context

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use buildora_compose::{RelayTransport, STOPPED_DOCUMENT};
use buildora_core::{BuildoraError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::host::ExecutionContext;
use crate::relay::RelaySender;

/// Route prefix the injected shim posts envelopes to
pub const RELAY_ROUTE: &str = "/__relay";

struct Loaded {
    generation: u64,
    document: String,
    relay: Option<RelaySender>,
}

/// Shared server state
struct PreviewState {
    loaded: RwLock<Loaded>,
}

type SharedState = Arc<PreviewState>;

/// Serves the current document at `/` and feeds relay posts to the host
pub struct PreviewServer {
    state: SharedState,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl PreviewServer {
    /// Bind `addr` and start serving the stopped placeholder
    pub async fn bind(addr: &str) -> Result<Self> {
        let state = Arc::new(PreviewState {
            loaded: RwLock::new(Loaded {
                generation: 0,
                document: STOPPED_DOCUMENT.to_string(),
                relay: None,
            }),
        });

        let app = Router::new()
            .route("/", get(document))
            .route(&format!("{}/:generation", RELAY_ROUTE), post(relay))
            .route("/__health", get(health))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!("Preview server failed: {}", e);
            }
        });

        info!("Preview server listening on http://{}", addr);
        Ok(Self {
            state,
            addr,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

#[async_trait]
impl ExecutionContext for PreviewServer {
    async fn load(&self, generation: u64, document: String, relay: RelaySender) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(BuildoraError::Other("Preview server is shut down".to_string()));
        }
        let mut loaded = self.state.loaded.write().await;
        *loaded = Loaded {
            generation,
            document,
            relay: Some(relay),
        };
        debug!(generation, "Preview document replaced");
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        {
            let mut loaded = self.state.loaded.write().await;
            loaded.document = STOPPED_DOCUMENT.to_string();
            loaded.relay = None;
        }
        self.shutdown.cancel();
        info!("Preview server stopped");
        Ok(())
    }

    fn transport(&self, generation: u64) -> RelayTransport {
        RelayTransport::http(format!("{}/{}", RELAY_ROUTE, generation))
    }
}

/// GET / - the live document
async fn document(State(state): State<SharedState>) -> Html<String> {
    Html(state.loaded.read().await.document.clone())
}

/// POST /__relay/:generation - one diagnostic envelope
async fn relay(
    State(state): State<SharedState>,
    Path(generation): Path<u64>,
    body: String,
) -> StatusCode {
    let loaded = state.loaded.read().await;
    if generation != loaded.generation {
        debug!(generation, live = loaded.generation, "Ignoring relay post from replaced document");
        return StatusCode::NO_CONTENT;
    }
    match &loaded.relay {
        Some(sender) => {
            sender.deliver(generation, body);
        }
        None => debug!("No relay attached, dropping diagnostic"),
    }
    StatusCode::NO_CONTENT
}

/// GET /__health
async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let generation = state.loaded.read().await.generation;
    Json(serde_json::json!({
        "status": "ok",
        "service": "buildora-preview",
        "generation": generation,
    }))
}
