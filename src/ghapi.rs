//! Outbound GitHub REST API.

use async_trait::async_trait;

mod auth;
pub use auth::AppCredentials;

mod client;
pub use client::GitHubClient;

mod errors;
pub use errors::{GitHubError, Result};

/// The issue operations the bot performs on GitHub.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueApi: Send + Sync {
    /// Post a comment on an issue, returning the new comment id.
    async fn comments_post(
        &self,
        owner: &str,
        name: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<u64>;

    /// Set the state of an issue to `closed`.
    async fn issues_close(&self, owner: &str, name: &str, issue_number: u64) -> Result<()>;
}
