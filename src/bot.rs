use std::sync::Arc;

use tracing::{debug, error, info, trace};

use crate::{config::ModerationConfig, ghapi::IssueApi, webhooks::github::IssueCommentEvent};

pub(crate) mod commands;
use commands::Intent;

mod message_builder;
use message_builder::closing_message;

/// What happened to an issue comment once it went through the [`Moderator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The comment was edited or deleted rather than created.
    NotCreated,
    /// The comment author isn't allowed to moderate issues.
    Unauthorized,
    /// The comment doesn't contain any command.
    NoCommand,
    /// Both API calls were attempted, whether they succeeded or not.
    Closed {
        intent: Intent,
        comment_posted: bool,
        issue_closed: bool,
    },
}

/// Closes issues on behalf of the authorized moderator.
pub struct Moderator {
    config: ModerationConfig,
    api: Arc<dyn IssueApi>,
}

impl Moderator {
    pub fn new(config: ModerationConfig, api: Arc<dyn IssueApi>) -> Self {
        Self { config, api }
    }

    /// Looks for a moderator command in `event` and acts on it.
    ///
    /// API failures are logged and never retried. Posting the comment and closing the issue are
    /// attempted independently of each other.
    pub async fn handle_issue_comment(&self, event: &IssueCommentEvent) -> Disposition {
        if !event.is_created() {
            debug!("ignoring `{:?}` comment action", event.action);
            return Disposition::NotCreated;
        }

        if event.sender.login != self.config.authorized_user {
            trace!("ignoring comment from {}", event.sender.login);
            return Disposition::Unauthorized;
        }

        let intent = match self.config.commands.match_intent(&event.comment.body) {
            Some(intent) => intent,
            None => {
                trace!("no command in comment from {}", event.sender.login);
                return Disposition::NoCommand;
            }
        };

        let owner = event.repository.owner.login.as_str();
        let name = event.repository.name.as_str();
        let number = event.issue.number;
        debug!("{} command on {}/{}#{}", intent, owner, name, number);

        let message = closing_message(intent, &self.config.documentation_url);

        let comment_posted = match self.api.comments_post(owner, name, number, &message).await {
            Ok(id) => {
                trace!("posted comment {} on {}/{}#{}", id, owner, name, number);
                true
            }
            Err(e) => {
                error!("failed to create a comment on {}/{}#{}: {}", owner, name, number, e);
                false
            }
        };

        let issue_closed = match self.api.issues_close(owner, name, number).await {
            Ok(()) => {
                info!("closed {}/{}#{} ({})", owner, name, number, intent);
                true
            }
            Err(e) => {
                error!("failed to close {}/{}#{}: {}", owner, name, number, e);
                false
            }
        };

        Disposition::Closed {
            intent,
            comment_posted,
            issue_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;
    use url::Url;

    use super::*;
    use crate::{
        bot::commands::CommandSet,
        ghapi::{GitHubError, MockIssueApi},
    };

    const AUTHORIZED: &str = "Zamiell";

    fn config() -> ModerationConfig {
        ModerationConfig {
            authorized_user: AUTHORIZED.into(),
            commands: CommandSet::default(),
            documentation_url: Url::parse("https://example.org/docs").unwrap(),
        }
    }

    fn event(sender: &str, body: &str) -> IssueCommentEvent {
        serde_json::from_value(serde_json::json!({
            "action": "created",
            "sender": { "login": sender },
            "comment": { "body": body },
            "repository": { "owner": { "login": "hanabi" }, "name": "hanabi.github.io" },
            "issue": { "number": 42 }
        }))
        .unwrap()
    }

    // reqwest errors can't be built by hand
    fn api_error() -> GitHubError {
        GitHubError::InvalidRootUrl {
            url: "unreachable".into(),
        }
    }

    fn moderator(api: MockIssueApi) -> Moderator {
        Moderator::new(config(), Arc::new(api))
    }

    #[tokio::test]
    async fn other_senders_are_ignored() {
        // no expectations: any API call fails the test
        let moderator = moderator(MockIssueApi::new());

        for body in ["/accept", "/deny", "/stale"] {
            assert_eq!(
                moderator.handle_issue_comment(&event("someone", body)).await,
                Disposition::Unauthorized
            );
        }
        // identities are compared case-sensitively
        assert_eq!(
            moderator.handle_issue_comment(&event("zamiell", "/accept")).await,
            Disposition::Unauthorized
        );
    }

    #[tokio::test]
    async fn comments_without_commands_are_ignored() {
        let moderator = moderator(MockIssueApi::new());

        assert_eq!(
            moderator
                .handle_issue_comment(&event(AUTHORIZED, "I agree with this."))
                .await,
            Disposition::NoCommand
        );
    }

    #[tokio::test]
    async fn edited_comments_are_ignored() {
        let moderator = moderator(MockIssueApi::new());
        let mut event = event(AUTHORIZED, "/accept");
        event.action = Some("edited".into());

        assert_eq!(
            moderator.handle_issue_comment(&event).await,
            Disposition::NotCreated
        );
    }

    #[tokio::test]
    async fn accept_comments_then_closes() {
        let mut api = MockIssueApi::new();
        let mut seq = Sequence::new();
        api.expect_comments_post()
            .once()
            .in_sequence(&mut seq)
            .withf(|owner, name, number, body| {
                owner == "hanabi"
                    && name == "hanabi.github.io"
                    && *number == 42
                    && body.contains("✔️ This change will be integrated")
                    && !body.contains("**not**")
                    && !body.contains("💤")
            })
            .returning(|_, _, _, _| Ok(1));
        api.expect_issues_close()
            .once()
            .in_sequence(&mut seq)
            .withf(|owner, name, number| {
                owner == "hanabi" && name == "hanabi.github.io" && number == &42
            })
            .returning(|_, _, _| Ok(()));

        assert_eq!(
            moderator(api)
                .handle_issue_comment(&event(AUTHORIZED, "Let's /accept this"))
                .await,
            Disposition::Closed {
                intent: Intent::Accept,
                comment_posted: true,
                issue_closed: true
            }
        );
    }

    #[tokio::test]
    async fn deny_has_priority_over_accept() {
        let mut api = MockIssueApi::new();
        api.expect_comments_post()
            .once()
            .withf(|_, _, _, body| body.contains("will **not** be integrated"))
            .returning(|_, _, _, _| Ok(1));
        api.expect_issues_close().once().returning(|_, _, _| Ok(()));

        assert_eq!(
            moderator(api)
                .handle_issue_comment(&event(AUTHORIZED, "/accept or /deny?"))
                .await,
            Disposition::Closed {
                intent: Intent::Deny,
                comment_posted: true,
                issue_closed: true
            }
        );
    }

    #[tokio::test]
    async fn close_is_attempted_when_comment_fails() {
        let mut api = MockIssueApi::new();
        api.expect_comments_post()
            .once()
            .returning(|_, _, _, _| Err(api_error()));
        api.expect_issues_close().once().returning(|_, _, _| Ok(()));

        assert_eq!(
            moderator(api)
                .handle_issue_comment(&event(AUTHORIZED, "/zzz"))
                .await,
            Disposition::Closed {
                intent: Intent::Stale,
                comment_posted: false,
                issue_closed: true
            }
        );
    }

    #[tokio::test]
    async fn close_failure_is_reported() {
        let mut api = MockIssueApi::new();
        api.expect_comments_post()
            .once()
            .returning(|_, _, _, _| Ok(1));
        api.expect_issues_close()
            .once()
            .returning(|_, _, _| Err(api_error()));

        assert_eq!(
            moderator(api)
                .handle_issue_comment(&event(AUTHORIZED, "/reject"))
                .await,
            Disposition::Closed {
                intent: Intent::Deny,
                comment_posted: true,
                issue_closed: false
            }
        );
    }

    #[tokio::test]
    async fn disabled_stale_intent() {
        let mut config = config();
        config.commands.stale.clear();
        let moderator = Moderator::new(config, Arc::new(MockIssueApi::new()));

        assert_eq!(
            moderator
                .handle_issue_comment(&event(AUTHORIZED, "/stale"))
                .await,
            Disposition::NoCommand
        );
    }
}
