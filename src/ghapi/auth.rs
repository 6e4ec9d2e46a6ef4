//! GitHub App authentication.
//!
//! https://docs.github.com/en/apps/creating-github-apps/authenticating-with-a-github-app

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::trace;

use crate::ghapi::{GitHubError, Result};

const APP_TOKEN_CLOCK_DRIFT_IN_SECONDS: u64 = 60;
const APP_TOKEN_LIFETIME_IN_SECONDS: u64 = 9 * 60;
const INSTALLATION_TOKEN_RENEW_THRESHOLD: f32 = 0.5;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JwtClaims {
    pub(crate) iat: u64,
    pub(crate) exp: u64,
    pub(crate) iss: u64,
}

/// Long-lived identity of the GitHub App installation the bot acts as.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    pub fn new(app_id: u64, installation_id: u64, private_key_pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|source| GitHubError::InvalidPrivateKey { source })?;

        Ok(Self {
            app_id,
            installation_id,
            key,
        })
    }

    /// Reads the PEM encoded private key GitHub generated for the app.
    pub fn from_pem_file(app_id: u64, installation_id: u64, path: &Path) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|source| GitHubError::PrivateKeyRead {
            path: path.to_owned(),
            source,
        })?;

        Self::new(app_id, installation_id, &pem)
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    /// Creates the short-lived JWT used to request installation tokens.
    pub(crate) fn app_token(&self, now: u64) -> Result<String> {
        let claims = JwtClaims {
            // backdated to allow for clock drift with GitHub
            iat: now.saturating_sub(APP_TOKEN_CLOCK_DRIFT_IN_SECONDS),
            exp: now + APP_TOKEN_LIFETIME_IN_SECONDS,
            iss: self.app_id,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|source| GitHubError::JwtCreationFailed { source })
    }
}

struct InstallationToken {
    token: String,
    renew_after: u64,
    expiration: u64,
}

/// Last installation token obtained from GitHub.
#[derive(Default)]
pub(crate) struct TokenCache {
    last: RwLock<Option<InstallationToken>>,
}

impl TokenCache {
    /// Returns the cached token, unless it is past its renewal threshold.
    pub(crate) async fn get(&self, now: u64) -> Option<String> {
        let last = self.last.read().await;

        match &*last {
            Some(token) if now <= token.renew_after && now < token.expiration => {
                Some(token.token.clone())
            }
            _ => {
                trace!("no valid installation token cached");
                None
            }
        }
    }

    /// Stores a token obtained at `now` and valid until `expiration`, as reported by GitHub.
    pub(crate) async fn store(&self, token: String, now: u64, expiration: u64) {
        let lifetime = expiration.saturating_sub(now);
        let renew_after = now + (lifetime as f32 * INSTALLATION_TOKEN_RENEW_THRESHOLD) as u64;

        let mut last = self.last.write().await;
        *last = Some(InstallationToken {
            token,
            renew_after,
            expiration,
        });
    }
}

pub(crate) fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
