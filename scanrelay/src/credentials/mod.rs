//! Service-account credential assembly.
//!
//! The deployment environment supplies the service account either as separate
//! `GOOGLE_*` variables or as one JSON document in `GOOGLE_SERVICE_ACCOUNT`.
//! [`ServiceAccountCredentials::resolve`] merges both sources, reports every
//! missing field at once and normalizes the private key before anything tries
//! to sign with it.

mod pem;
mod token;

pub use pem::{normalize_private_key, unescape_private_key, PemError};
pub use token::{CachedToken, TokenSource, CLOUD_PLATFORM_SCOPE};

use serde::{Deserialize, Serialize};

use crate::config::GoogleConfig;
use crate::error::{Result, ScanError};

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const AUTH_PROVIDER_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";
const CLIENT_CERT_URL_BASE: &str = "https://www.googleapis.com/robot/v1/metadata/x509/";
const UNIVERSE_DOMAIN: &str = "googleapis.com";

/// Google Cloud service-account credentials with a normalized private key.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
    pub universe_domain: String,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Loose view of a service-account JSON file; every field may be absent.
#[derive(Debug, Default, Deserialize)]
struct ServiceAccountDocument {
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
    client_id: Option<String>,
}

fn require(
    name: &str,
    primary: &Option<String>,
    secondary: Option<String>,
    missing: &mut Vec<String>,
) -> String {
    match primary
        .clone()
        .or(secondary)
        .filter(|value| !value.trim().is_empty())
    {
        Some(value) => value.trim().to_string(),
        None => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

impl ServiceAccountCredentials {
    /// Builds credentials from environment material without any network access.
    ///
    /// Individual `GOOGLE_*` values take precedence over fields of the
    /// `GOOGLE_SERVICE_ACCOUNT` document.
    pub fn resolve(google: &GoogleConfig) -> Result<Self> {
        let document = match &google.service_account_json {
            Some(json) => serde_json::from_str::<ServiceAccountDocument>(json).map_err(|e| {
                ScanError::Configuration(format!("GOOGLE_SERVICE_ACCOUNT is not valid JSON: {e}"))
            })?,
            None => ServiceAccountDocument::default(),
        };

        let mut missing = Vec::new();
        let project_id = require(
            "GOOGLE_PROJECT_ID",
            &google.project_id,
            document.project_id,
            &mut missing,
        );
        let private_key_id = require(
            "GOOGLE_PRIVATE_KEY_ID",
            &google.private_key_id,
            document.private_key_id,
            &mut missing,
        );
        let client_email = require(
            "GOOGLE_CLIENT_EMAIL",
            &google.client_email,
            document.client_email,
            &mut missing,
        );
        let client_id = require(
            "GOOGLE_CLIENT_ID",
            &google.client_id,
            document.client_id,
            &mut missing,
        );
        let raw_key = require(
            "GOOGLE_PRIVATE_KEY",
            &google.private_key,
            document.private_key,
            &mut missing,
        );

        if !missing.is_empty() {
            return Err(ScanError::MissingConfiguration(missing));
        }

        let private_key = normalize_private_key(&raw_key).map_err(|e| {
            ScanError::Configuration(format!("GOOGLE_PRIVATE_KEY is not a valid PEM key: {e}"))
        })?;

        let encoded_email: String =
            url::form_urlencoded::byte_serialize(client_email.as_bytes()).collect();

        Ok(Self {
            account_type: "service_account".to_string(),
            project_id,
            private_key_id,
            private_key,
            client_x509_cert_url: format!("{CLIENT_CERT_URL_BASE}{encoded_email}"),
            client_email,
            client_id,
            auth_uri: AUTH_URI.to_string(),
            token_uri: google.token_uri.clone(),
            auth_provider_x509_cert_url: AUTH_PROVIDER_CERT_URL.to_string(),
            universe_domain: UNIVERSE_DOMAIN.to_string(),
        })
    }
}
