//! Service-account OAuth: signed JWT exchanged for a short-lived access token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reminder_core::error::{ReminderError, Result};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Refresh this long before the provider-reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// Unix seconds after which the token must be refreshed.
    refresh_at: i64,
}

/// Service-account credentials plus a cached access token.
pub struct ServiceAccountAuth {
    client_email: String,
    signing_key: SigningKey<Sha256>,
    token_url: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

/// Parse a PEM private key (PKCS#8 `BEGIN PRIVATE KEY` or PKCS#1 `BEGIN RSA PRIVATE KEY`).
/// Literal `\n` escapes, as stored in env files, are expanded first.
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.replace("\\n", "\n");
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| ReminderError::Auth(format!("Invalid service-account private key: {e}")))
}

/// Build the RS256-signed JWT assertion for the token endpoint.
pub fn sign_assertion(
    key: &SigningKey<Sha256>,
    client_email: &str,
    token_url: &str,
    now: i64,
) -> Result<String> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = Claims {
        iss: client_email,
        scope: SHEETS_SCOPE,
        aud: token_url,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{header}.{claims}");
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

impl ServiceAccountAuth {
    pub fn new(
        client_email: &str,
        private_key_pem: &str,
        token_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        if client_email.trim().is_empty() || private_key_pem.trim().is_empty() {
            return Err(ReminderError::config(
                "Google Sheets credentials missing (GOOGLE_SHEETS_CLIENT_EMAIL, GOOGLE_SHEETS_PRIVATE_KEY)",
            ));
        }
        let key = parse_private_key(private_key_pem)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReminderError::Auth(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client_email: client_email.trim().to_string(),
            signing_key: SigningKey::<Sha256>::new(key),
            token_url: token_url.to_string(),
            client,
            cached: Mutex::new(None),
        })
    }

    /// Current access token, exchanging a fresh assertion when the cache is stale.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(tok) = cached.as_ref()
            && now < tok.refresh_at
        {
            return Ok(tok.token.clone());
        }

        let assertion = sign_assertion(&self.signing_key, &self.client_email, &self.token_url, now)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReminderError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReminderError::Auth(format!(
                "Token exchange failed {status}: {text}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ReminderError::Auth(format!("Invalid token response: {e}")))?;

        tracing::debug!("🔑 Sheets access token refreshed for {}", self.client_email);
        let token = body.access_token.clone();
        *cached = Some(CachedToken {
            token: body.access_token,
            refresh_at: now + (body.expires_in - EXPIRY_MARGIN_SECS).max(0),
        });
        Ok(token)
    }
}
