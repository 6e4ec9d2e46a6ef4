use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use url::Url;

use crate::ghapi::{
    auth::{now_timestamp, AppCredentials, TokenCache},
    GitHubError, IssueApi, Result,
};

const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`IssueApi`] implementation talking to the GitHub REST API as an app installation.
///
/// The installation token is exchanged lazily and cached, so a single client can be shared
/// between all requests.
pub struct GitHubClient {
    http: Client,
    root_url: String,
    credentials: AppCredentials,
    token: TokenCache,
}

impl GitHubClient {
    pub fn new(root_url: &Url, credentials: AppCredentials) -> Result<Self> {
        if root_url.cannot_be_a_base() {
            return Err(GitHubError::InvalidRootUrl {
                url: root_url.to_string(),
            });
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            root_url: root_url.as_str().trim_end_matches('/').to_owned(),
            credentials,
            token: TokenCache::default(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.root_url, path)
    }

    async fn installation_token(&self) -> Result<String> {
        let now = now_timestamp();
        if let Some(token) = self.token.get(now).await {
            return Ok(token);
        }

        let (token, expiration) = self.create_installation_token(now).await?;
        self.token.store(token.clone(), now, expiration).await;

        Ok(token)
    }

    #[instrument(skip_all)]
    async fn create_installation_token(&self, now: u64) -> Result<(String, u64)> {
        #[derive(Deserialize)]
        struct Response {
            token: String,
            #[serde(with = "time::serde::rfc3339")]
            expires_at: OffsetDateTime,
        }

        debug!("requesting a new installation token");
        let app_token = self.credentials.app_token(now)?;
        let installation_id = self.credentials.installation_id();

        let response = self
            .http
            .post(self.build_url(&format!(
                "/app/installations/{installation_id}/access_tokens"
            )))
            .bearer_auth(app_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;

        // a date before the epoch leaves the token uncached
        let expiration = u64::try_from(response.expires_at.unix_timestamp()).unwrap_or_default();
        debug!("installation token expires at {}", response.expires_at);

        Ok((response.token, expiration))
    }
}

#[async_trait]
impl IssueApi for GitHubClient {
    async fn comments_post(
        &self,
        owner: &str,
        name: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<u64> {
        #[derive(Serialize)]
        struct Request<'a> {
            body: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            id: u64,
        }

        let token = self.installation_token().await?;

        Ok(self
            .http
            .post(self.build_url(&format!(
                "/repos/{owner}/{name}/issues/{issue_number}/comments"
            )))
            .bearer_auth(token)
            .json(&Request { body })
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?
            .id)
    }

    async fn issues_close(&self, owner: &str, name: &str, issue_number: u64) -> Result<()> {
        #[derive(Serialize)]
        struct Request {
            state: &'static str,
        }

        let token = self.installation_token().await?;

        self.http
            .patch(self.build_url(&format!("/repos/{owner}/{name}/issues/{issue_number}")))
            .bearer_auth(token)
            .json(&Request { state: "closed" })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
