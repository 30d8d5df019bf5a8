//! サービスアカウント認証情報
//!
//! 環境変数で渡された JSON をファイルに書き出し、そこから
//! JWT Bearer グラントでアクセストークンを取得する。

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::SyncError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// 期限の少し前に更新する
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// 環境変数の認証情報をファイルに書き出す。変数がなければ何もしない
pub fn provision_credentials(env_var: &str, path: &Path) -> Result<bool, SyncError> {
    match std::env::var(env_var) {
        Ok(blob) if !blob.trim().is_empty() => {
            std::fs::write(path, blob)?;
            info!("Credentials written to {:?}", path);
            Ok(true)
        }
        _ => {
            debug!("{} not set, using existing credentials file", env_var);
            Ok(false)
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

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
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// アクセストークンの取得とキャッシュ
#[derive(Debug)]
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            scope: SHEETS_SCOPE.to_string(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Credentials(format!("{}: {}", path.display(), e))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| SyncError::Credentials(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(key))
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// 有効なアクセストークンを返す（期限切れ間近なら再取得）
    pub async fn access_token(&self) -> Result<String, SyncError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion()?;
        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::Credentials(format!("token request: {}", e)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Credentials(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Credentials(format!("token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        debug!("Access token acquired for {}", self.key.client_email);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }

    fn signed_assertion(&self) -> Result<String, SyncError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| SyncError::Credentials(format!("private key: {}", e)))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SyncError::Credentials(format!("sign assertion: {}", e)))
    }
}
