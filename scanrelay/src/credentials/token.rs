use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::ServiceAccountCredentials;
use crate::error::{Result, ScanError};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they actually expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Cached access token with expiration.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::minutes(REFRESH_MARGIN_MINUTES)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

enum TokenKind {
    ServiceAccount {
        client_email: String,
        private_key_id: String,
        token_uri: String,
        key: EncodingKey,
        cache: RwLock<Option<CachedToken>>,
    },
    Fixed(String),
}

/// Supplies OAuth2 bearer tokens for Vertex AI calls.
pub struct TokenSource {
    kind: TokenKind,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TokenKind::ServiceAccount { client_email, .. } => f
                .debug_struct("TokenSource::ServiceAccount")
                .field("client_email", client_email)
                .finish(),
            TokenKind::Fixed(_) => f.write_str("TokenSource::Fixed"),
        }
    }
}

impl TokenSource {
    /// Parses the RSA key up front so a bad key fails here rather than on the first scan.
    pub fn service_account(credentials: &ServiceAccountCredentials) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|e| {
            tracing::error!("Invalid private key format: {}", e);
            ScanError::Configuration(format!(
                "GOOGLE_PRIVATE_KEY could not be parsed as an RSA key: {e}"
            ))
        })?;

        Ok(Self {
            kind: TokenKind::ServiceAccount {
                client_email: credentials.client_email.clone(),
                private_key_id: credentials.private_key_id.clone(),
                token_uri: credentials.token_uri.clone(),
                key,
                cache: RwLock::new(None),
            },
        })
    }

    /// A pre-issued bearer token, e.g. from `gcloud auth print-access-token`.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Fixed(token.into()),
        }
    }

    pub async fn access_token(&self, http: &Client) -> Result<String> {
        match &self.kind {
            TokenKind::Fixed(token) => Ok(token.clone()),
            TokenKind::ServiceAccount {
                client_email,
                private_key_id,
                token_uri,
                key,
                cache,
            } => {
                {
                    let cached = cache.read().await;
                    if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                        tracing::debug!("Using cached access token");
                        return Ok(token.access_token.clone());
                    }
                }

                // Hold the write lock across the exchange so concurrent misses share one token.
                let mut cached = cache.write().await;
                if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                    return Ok(token.access_token.clone());
                }

                let token =
                    exchange_assertion(http, client_email, private_key_id, token_uri, key).await?;
                let access_token = token.access_token.clone();
                *cached = Some(token);

                Ok(access_token)
            }
        }
    }
}

/// Signs a JWT assertion and exchanges it for an access token.
async fn exchange_assertion(
    http: &Client,
    client_email: &str,
    private_key_id: &str,
    token_uri: &str,
    key: &EncodingKey,
) -> Result<CachedToken> {
    tracing::info!(client_email, "Requesting OAuth2 access token for service account");

    let now = Utc::now();
    let claims = JwtClaims {
        iss: client_email.to_string(),
        scope: CLOUD_PLATFORM_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(private_key_id.to_string());

    let assertion = encode(&header, &claims, key)
        .map_err(|e| ScanError::Auth(format!("Failed to sign JWT assertion: {e}")))?;

    let response = http
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), "Token exchange failed: {}", body);
        return Err(ScanError::Auth(format!(
            "OAuth token exchange failed (HTTP {}): {}",
            status.as_u16(),
            body
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ScanError::Auth(format!("Failed to parse token response: {e}")))?;

    tracing::info!(expires_in = token.expires_in, "Obtained access token");

    Ok(CachedToken {
        access_token: token.access_token,
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
    })
}
