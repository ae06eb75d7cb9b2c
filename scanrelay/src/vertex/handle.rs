use std::sync::Arc;
use tokio::sync::RwLock;

use super::client::VertexClient;
use crate::config::{Config, GoogleConfig, VertexConfig};
use crate::credentials::{ServiceAccountCredentials, TokenSource};
use crate::error::Result;
use crate::scan::{ModelRoute, ModelRouter};

/// Builds the preferred and fallback routes from configuration.
///
/// Building performs no network I/O: credentials are resolved and the signing
/// key parsed, tokens are fetched lazily on the first call.
#[derive(Debug, Clone)]
pub struct InferenceFactory {
    google: GoogleConfig,
    vertex: VertexConfig,
}

impl InferenceFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            google: config.google.clone(),
            vertex: config.vertex.clone(),
        }
    }

    pub fn build(&self) -> Result<ModelRouter> {
        let credentials = ServiceAccountCredentials::resolve(&self.google)?;
        let tokens = Arc::new(TokenSource::service_account(&credentials)?);
        let primary = VertexClient::new(credentials.project_id.clone(), tokens, &self.vertex)?;

        tracing::info!(
            project_id = %credentials.project_id,
            region = %self.vertex.region,
            model = %self.vertex.model,
            fallback_model = %self.vertex.fallback_model,
            "Vertex AI client configured"
        );

        let fallback_region = self.vertex.fallback_region();
        let fallback = if fallback_region == self.vertex.region {
            primary.clone()
        } else {
            primary.with_region(fallback_region)
        };

        Ok(ModelRouter::new(
            ModelRoute::new(self.vertex.model.clone(), Arc::new(primary)),
            ModelRoute::new(self.vertex.fallback_model.clone(), Arc::new(fallback)),
        ))
    }
}

type Initializer = Box<dyn Fn() -> Result<ModelRouter> + Send + Sync>;

#[derive(Default)]
struct HandleState {
    router: Option<Arc<ModelRouter>>,
    last_error: Option<String>,
}

/// Initialization outcome reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleStatus {
    pub initialized: bool,
    pub message: Option<String>,
}

/// Process-wide, lazily built inference client.
///
/// The first successful [`get`](Self::get) stores the router; later calls
/// share it. A failed build is remembered for the health endpoint and retried
/// on the next request.
pub struct InferenceHandle {
    state: RwLock<HandleState>,
    init: Initializer,
}

impl std::fmt::Debug for InferenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceHandle").finish_non_exhaustive()
    }
}

impl InferenceHandle {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<ModelRouter> + Send + Sync + 'static,
    {
        Self {
            state: RwLock::new(HandleState::default()),
            init: Box::new(init),
        }
    }

    pub fn from_factory(factory: InferenceFactory) -> Self {
        Self::new(move || factory.build())
    }

    /// A handle that already holds a router and never rebuilds it.
    pub fn ready(router: ModelRouter) -> Self {
        let router = Arc::new(router);
        let shared = router.clone();
        Self {
            state: RwLock::new(HandleState {
                router: Some(router),
                last_error: None,
            }),
            init: Box::new(move || Ok((*shared).clone())),
        }
    }

    pub async fn get(&self) -> Result<Arc<ModelRouter>> {
        if let Some(router) = self.state.read().await.router.clone() {
            return Ok(router);
        }

        let mut state = self.state.write().await;
        // Another request may have finished initializing while we waited.
        if let Some(router) = state.router.clone() {
            return Ok(router);
        }

        match (self.init)() {
            Ok(router) => {
                let router = Arc::new(router);
                state.router = Some(router.clone());
                state.last_error = None;
                tracing::info!(
                    model = router.preferred_model(),
                    "Inference client initialized"
                );
                Ok(router)
            }
            Err(e) => {
                tracing::warn!("Inference client initialization failed: {}", e);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Swaps in a new router for all subsequent requests.
    pub async fn replace(&self, router: ModelRouter) {
        let mut state = self.state.write().await;
        state.router = Some(Arc::new(router));
        state.last_error = None;
    }

    pub async fn status(&self) -> HandleStatus {
        let state = self.state.read().await;
        HandleStatus {
            initialized: state.router.is_some(),
            message: state.last_error.clone(),
        }
    }
}
