use std::sync::Arc;

use super::retry::RetryPolicy;
use crate::error::{ErrorKind, Result};
use crate::vertex::{GenerateRequest, GenerateResponse, InferenceBackend};

/// A model name paired with the backend that serves it.
#[derive(Clone)]
pub struct ModelRoute {
    pub model: String,
    pub backend: Arc<dyn InferenceBackend>,
}

impl ModelRoute {
    pub fn new(model: impl Into<String>, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            model: model.into(),
            backend,
        }
    }

    fn same_target(&self, other: &ModelRoute) -> bool {
        self.model == other.model && self.backend.region() == other.backend.region()
    }
}

impl std::fmt::Debug for ModelRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRoute")
            .field("model", &self.model)
            .field("region", &self.backend.region())
            .finish()
    }
}

/// Output of a routed call, with the model that actually produced it.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub response: GenerateResponse,
    pub model: String,
    pub used_fallback: bool,
}

/// Sends requests to the preferred model and switches to the fallback model
/// when the preferred one is unavailable.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    preferred: ModelRoute,
    fallback: ModelRoute,
}

impl ModelRouter {
    pub fn new(preferred: ModelRoute, fallback: ModelRoute) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    pub fn preferred_model(&self) -> &str {
        &self.preferred.model
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback.model
    }

    pub fn region(&self) -> &str {
        self.preferred.backend.region()
    }

    /// Each model gets the full retry budget; only a model-unavailable
    /// failure of the preferred model moves on to the fallback.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        retry: &RetryPolicy,
    ) -> Result<RoutedResponse> {
        match call(&self.preferred, request, retry).await {
            Ok(response) => Ok(RoutedResponse {
                response,
                model: self.preferred.model.clone(),
                used_fallback: false,
            }),
            Err(e)
                if e.kind() == ErrorKind::ModelUnavailable
                    && !self.preferred.same_target(&self.fallback) =>
            {
                tracing::warn!(
                    preferred = %self.preferred.model,
                    fallback = %self.fallback.model,
                    "Preferred model unavailable, switching to fallback: {}",
                    e
                );
                let response = call(&self.fallback, request, retry).await?;
                Ok(RoutedResponse {
                    response,
                    model: self.fallback.model.clone(),
                    used_fallback: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

async fn call(
    route: &ModelRoute,
    request: &GenerateRequest,
    retry: &RetryPolicy,
) -> Result<GenerateResponse> {
    let backend = &route.backend;
    let model = route.model.as_str();

    retry
        .run(move |attempt| {
            tracing::debug!(model, attempt, "Sending image to model");
            backend.generate_content(model, request)
        })
        .await
}
