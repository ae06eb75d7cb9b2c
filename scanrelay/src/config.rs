use serde::Deserialize;
use std::env;

use crate::credentials::ServiceAccountCredentials;
use crate::error::{Result, ScanError};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash-001";

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => match val.trim().parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        _ => default,
    }
}

/// Reads a variable, treating an empty value the same as an unset one.
fn env_opt(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub vertex: VertexConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Raw service-account material as found in the environment.
///
/// Nothing here is validated; [`ServiceAccountCredentials::resolve`] turns it
/// into a usable credential record.
#[derive(Clone, Default, Deserialize)]
pub struct GoogleConfig {
    pub project_id: Option<String>,
    pub private_key: Option<String>,
    pub private_key_id: Option<String>,
    pub client_email: Option<String>,
    pub client_id: Option<String>,
    /// Full service-account JSON document (`GOOGLE_SERVICE_ACCOUNT`).
    pub service_account_json: Option<String>,
    pub token_uri: String,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("project_id", &self.project_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field(
                "service_account_json",
                &self.service_account_json.as_ref().map(|_| "<redacted>"),
            )
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VertexConfig {
    pub region: String,
    pub model: String,
    pub fallback_model: String,
    /// Region for the fallback model; `None` reuses `region`.
    pub fallback_region: Option<String>,
    /// Overrides the `https://{region}-aiplatform.googleapis.com` host.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
}

impl VertexConfig {
    pub fn fallback_region(&self) -> &str {
        self.fallback_region.as_deref().unwrap_or(&self.region)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_image_bytes: usize,
    /// Include the error source chain in failure responses.
    pub expose_error_details: bool,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            fallback_region: None,
            base_url: None,
            timeout_secs: 60,
            max_output_tokens: 8192,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_image_bytes: 10 * 1024 * 1024,
            expose_error_details: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let vertex_defaults = VertexConfig::default();
        let scan_defaults = ScanConfig::default();

        Self {
            server: ServerConfig {
                host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_env_or("PORT", 5000),
            },
            google: GoogleConfig {
                project_id: env_opt("GOOGLE_PROJECT_ID"),
                private_key: env_opt("GOOGLE_PRIVATE_KEY"),
                private_key_id: env_opt("GOOGLE_PRIVATE_KEY_ID"),
                client_email: env_opt("GOOGLE_CLIENT_EMAIL"),
                client_id: env_opt("GOOGLE_CLIENT_ID"),
                service_account_json: env_opt("GOOGLE_SERVICE_ACCOUNT"),
                token_uri: env_opt("GOOGLE_TOKEN_URI")
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            },
            vertex: VertexConfig {
                region: env_opt("VERTEX_REGION").unwrap_or(vertex_defaults.region),
                model: env_opt("VERTEX_MODEL").unwrap_or(vertex_defaults.model),
                fallback_model: env_opt("VERTEX_FALLBACK_MODEL")
                    .unwrap_or(vertex_defaults.fallback_model),
                fallback_region: env_opt("VERTEX_FALLBACK_REGION"),
                base_url: env_opt("VERTEX_BASE_URL"),
                timeout_secs: parse_env_or("VERTEX_TIMEOUT", vertex_defaults.timeout_secs),
                max_output_tokens: parse_env_or(
                    "VERTEX_MAX_OUTPUT_TOKENS",
                    vertex_defaults.max_output_tokens,
                ),
            },
            scan: ScanConfig {
                max_retries: parse_env_or("SCAN_MAX_RETRIES", scan_defaults.max_retries),
                initial_backoff_ms: parse_env_or(
                    "SCAN_INITIAL_BACKOFF_MS",
                    scan_defaults.initial_backoff_ms,
                ),
                max_image_bytes: parse_env_or("SCAN_MAX_IMAGE_BYTES", scan_defaults.max_image_bytes),
                expose_error_details: parse_env_or(
                    "SCAN_EXPOSE_ERROR_DETAILS",
                    scan_defaults.expose_error_details,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Built-in defaults only. Unlike [`Config::default`], no variable is read.
    pub fn with_defaults() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            google: GoogleConfig {
                token_uri: DEFAULT_TOKEN_URI.to_string(),
                ..Default::default()
            },
            vertex: VertexConfig::default(),
            scan: ScanConfig::default(),
        }
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.vertex.model.trim().is_empty() {
            return Err(ScanError::Configuration("VERTEX_MODEL is empty".to_string()));
        }
        if self.vertex.fallback_model.trim().is_empty() {
            return Err(ScanError::Configuration(
                "VERTEX_FALLBACK_MODEL is empty".to_string(),
            ));
        }
        if self.vertex.region.trim().is_empty() {
            return Err(ScanError::Configuration("VERTEX_REGION is empty".to_string()));
        }
        if self.scan.max_image_bytes == 0 {
            return Err(ScanError::Configuration(
                "SCAN_MAX_IMAGE_BYTES must be greater than zero".to_string(),
            ));
        }

        ServiceAccountCredentials::resolve(&self.google).map(|_| ())
    }
}
