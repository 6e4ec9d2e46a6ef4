use serde::Deserialize;

const CREATED: &str = "created";

/// Payload of an `issue_comment` webhook event.
///
/// Only the fields the bot looks at are decoded, everything else GitHub sends is ignored.
#[derive(Debug, Deserialize)]
pub struct IssueCommentEvent {
    /// Absent from some hand-crafted deliveries, in which case the comment is considered new.
    #[serde(default)]
    pub action: Option<String>,
    pub sender: GitHubUser,
    #[serde(alias = "repo")]
    pub repository: Repository,
    pub issue: Issue,
    pub comment: Comment,
}

impl IssueCommentEvent {
    pub fn is_created(&self) -> bool {
        self.action.as_deref().map_or(true, |action| action == CREATED)
    }
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: GitHubUser,
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
pub struct Comment {
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_short_payload() {
        let event: IssueCommentEvent = serde_json::from_str(
            r#"{"sender":{"login":"Zamiell"},"comment":{"body":"Let's /accept this"},"repo":{"owner":{"login":"hanabi"},"name":"hanabi.github.io"},"issue":{"number":42}}"#,
        )
        .unwrap();

        assert_eq!(event.sender.login, "Zamiell");
        assert_eq!(event.comment.body, "Let's /accept this");
        assert_eq!(event.repository.owner.login, "hanabi");
        assert_eq!(event.repository.name, "hanabi.github.io");
        assert_eq!(event.issue.number, 42);
        assert!(event.is_created());
    }

    #[test]
    fn decode_github_payload() {
        let event: IssueCommentEvent = serde_json::from_str(
            r#"{
                "action": "edited",
                "issue": {"number": 7, "title": "Some convention", "state": "open"},
                "comment": {"id": 1, "body": "/deny", "user": {"login": "someone", "id": 2}},
                "repository": {"name": "repo", "full_name": "org/repo", "owner": {"login": "org", "id": 3}},
                "sender": {"login": "someone", "id": 2}
            }"#,
        )
        .unwrap();

        assert_eq!(event.repository.owner.login, "org");
        assert_eq!(event.issue.number, 7);
        assert!(!event.is_created());
    }

    #[test]
    fn reject_missing_fields() {
        let res = serde_json::from_str::<IssueCommentEvent>(
            r#"{"sender":{"login":"Zamiell"},"comment":{"body":"/accept"}}"#,
        );

        assert!(res.is_err());
    }
}
