use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to GitHub or preparing the credentials to do so.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("couldn't read private key {}: {source}", .path.display())]
    PrivateKeyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid RSA private key: {source}")]
    InvalidPrivateKey { source: jsonwebtoken::errors::Error },

    #[error("couldn't sign app token: {source}")]
    JwtCreationFailed { source: jsonwebtoken::errors::Error },

    #[error("invalid API root url `{url}`")]
    InvalidRootUrl { url: String },

    #[error("HTTP error: {source}")]
    HttpError {
        #[from]
        source: reqwest::Error,
    },
}

pub type Result<T, E = GitHubError> = std::result::Result<T, E>;
