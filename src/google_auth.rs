use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Tokens are re-minted this long before Google's stated expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid service account key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned status {0}")]
    Status(u16),
    #[error("system clock is before the unix epoch")]
    Clock,
    #[error("token cache lock poisoned")]
    Poisoned,
}

/// The subset of a `GOOGLE_CREDENTIALS` service account JSON file used to
/// mint tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
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
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    refresh_at: SystemTime,
}

/// OAuth2 JWT-bearer flow for a service account, with the current access
/// token cached until shortly before it expires.
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    signer: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey) -> Result<Self, AuthError> {
        let signer = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        info!(client_email = %key.client_email, "using sheets service account");
        Ok(Self {
            key,
            signer,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, issued_at: u64) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: SPREADSHEETS_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(&header, &claims, &self.signer)?)
    }

    pub fn token(&self, client: &reqwest::blocking::Client) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().map_err(|_| AuthError::Poisoned)?;
        let now = SystemTime::now();
        if let Some(current) = cached.as_ref() {
            if now < current.refresh_at {
                return Ok(current.token.clone());
            }
        }

        let issued_at = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Clock)?
            .as_secs();
        let assertion = self.assertion(issued_at)?;
        debug!(token_uri = %self.key.token_uri, "minting sheets access token");
        let resp = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?;
        if !resp.status().is_success() {
            return Err(AuthError::Status(resp.status().as_u16()));
        }
        let body: TokenResponse = resp.json()?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            refresh_at: now + lifetime,
        });
        Ok(body.access_token)
    }
}
