//! Bearer tokens for the cloud AI endpoints
//!
//! Two sources are supported:
//! - a token supplied from outside the process (`PICSONG_ACCESS_TOKEN`)
//! - a service-account JSON key, exchanged for an OAuth access token using a
//!   signed RS256 JWT assertion (`urn:ietf:params:oauth:grant-type:jwt-bearer`)
//!
//! Exchanged tokens are cached until shortly before they expire.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use picsong_common::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are refreshed this long before their stated expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Token acquisition errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Assertion signing failed: {0}")]
    Signing(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Token endpoint error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Supplier of bearer tokens for upstream requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

/// Token handed to the process from outside
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

/// The fields of a service-account key file this service needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| TokenError::Credentials(format!("Invalid key file: {}", e)))?;

        if key.key_type != "service_account" {
            return Err(TokenError::Credentials(format!(
                "Unsupported credentials type '{}', expected 'service_account'",
                key.key_type
            )));
        }

        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self, TokenError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| TokenError::Credentials(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

/// JWT claims of the token-exchange assertion
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Exchanges a service-account key for access tokens
pub struct ServiceAccountTokenSource {
    http_client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| TokenError::Credentials(format!("Invalid private key: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signed assertion for the token endpoint
    fn assertion(&self, now: i64) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    async fn exchange(&self) -> Result<TokenResponse, TokenError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        tracing::debug!(client_email = %self.key.client_email, "Requesting access token");

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TokenError::Api(status.as_u16(), error_text));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| TokenError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, TokenError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(entry.token.clone());
            }
        }

        let response = self.exchange().await?;
        tracing::info!(expires_in = response.expires_in, "Access token refreshed");

        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });

        Ok(response.access_token)
    }
}

/// Token source for the resolved configuration
///
/// An externally supplied token wins over the key file.
pub fn token_source_from_config(config: &AppConfig) -> Result<Arc<dyn TokenSource>, TokenError> {
    if let Some(token) = &config.access_token {
        tracing::info!("Using externally supplied access token");
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }

    let path = config
        .credentials_path
        .as_deref()
        .ok_or_else(|| TokenError::Credentials("No credentials configured".to_string()))?;

    let key = ServiceAccountKey::from_file(path)?;
    let source = ServiceAccountTokenSource::new(key, config.request_timeout)?;
    tracing::info!(
        client_email = %source.client_email(),
        "Using service-account credentials from {}",
        path.display()
    );
    Ok(Arc::new(source))
}
