use rocket::{catchers, figment::Provider, http::Status, routes, Build, Request, Rocket};

use crate::bot::Moderator;

pub mod github;
pub use github::{issue_comment_webhook, GitHubSecret};

mod throttle;
pub use throttle::RequestThrottle;

/// Rejected deliveries only get a status code.
#[rocket::catch(default)]
fn no_body(status: Status, _request: &Request<'_>) -> (Status, ()) {
    (status, ())
}

/// Assembles the webhook server around an already configured [`Moderator`].
pub fn build<P: Provider>(
    figment: P,
    moderator: Moderator,
    secret: GitHubSecret,
    throttle: RequestThrottle,
) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", routes![issue_comment_webhook])
        .register("/", catchers![no_body])
        .manage(moderator)
        .manage(secret)
        .manage(throttle)
}
