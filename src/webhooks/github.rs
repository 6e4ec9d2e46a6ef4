use std::convert::Infallible;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use tracing::{debug, error, info, trace};

use crate::{bot::Moderator, webhooks::throttle::Throttled};

mod events;
pub use events::*;

mod signing;
use signing::SignedGitHubPayload;

const X_GITHUB_EVENT: &str = "X-GitHub-Event";
const X_GITHUB_DELIVERY: &str = "X-GitHub-Delivery";

pub struct GitHubSecret(pub String);

#[rocket::post("/", data = "<payload>")]
pub async fn issue_comment_webhook(
    _throttled: Throttled,
    delivery: Delivery<'_>,
    payload: SignedGitHubPayload,
    moderator: &State<Moderator>,
) -> Status {
    let event_type = match delivery.event {
        // hand-crafted deliveries don't always carry the header
        None | Some("issue_comment") => GitHubEventType::IssueComment,
        Some("ping") => GitHubEventType::Ping,
        Some(other) => GitHubEventType::Other(other),
    };
    trace!(
        "received {:?} delivery {}",
        event_type,
        delivery.id.unwrap_or("<unknown>")
    );

    match event_type {
        GitHubEventType::IssueComment => {}
        GitHubEventType::Ping => {
            info!("received ping from GitHub");
            return Status::Ok;
        }
        GitHubEventType::Other(event) => {
            debug!("ignoring `{}` event", event);
            return Status::Ok;
        }
    }

    let event: IssueCommentEvent = match serde_json::from_slice(&payload.0) {
        Ok(event) => event,
        Err(e) => {
            error!("failed to decode issue comment payload: {}", e);
            return Status::BadRequest;
        }
    };

    let disposition = moderator.handle_issue_comment(&event).await;
    debug!(
        "{}/{}#{}: {:?}",
        event.repository.owner.login, event.repository.name, event.issue.number, disposition
    );

    Status::Ok
}

#[derive(Debug)]
enum GitHubEventType<'r> {
    IssueComment,
    Ping,
    Other(&'r str),
}

/// GitHub headers describing a webhook delivery.
pub struct Delivery<'r> {
    event: Option<&'r str>,
    id: Option<&'r str>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Delivery<'r> {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        Outcome::Success(Delivery {
            event: headers.get_one(X_GITHUB_EVENT),
            id: headers.get_one(X_GITHUB_DELIVERY),
        })
    }
}
