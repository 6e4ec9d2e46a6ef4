use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use tracing::{trace, warn};

// past this many tracked clients, entries older than the interval are dropped
const PRUNE_THRESHOLD: usize = 1024;

/// Fixed-rate limiter keyed on the client address.
pub struct RequestThrottle {
    interval: Option<Duration>,
    last_seen: Mutex<HashMap<IpAddr, Instant>>,
}

impl RequestThrottle {
    /// Allows `requests_per_second` requests per client, `0` disables throttling.
    pub fn new(requests_per_second: u32) -> Self {
        let interval = (requests_per_second > 0)
            .then(|| Duration::from_secs(1) / requests_per_second);

        Self {
            interval,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request from `client` at `now`, returning whether it is allowed through.
    pub fn check(&self, client: IpAddr, now: Instant) -> bool {
        let interval = match self.interval {
            Some(interval) => interval,
            None => return true,
        };

        let mut last_seen = match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if last_seen.len() > PRUNE_THRESHOLD {
            last_seen.retain(|_, seen| now.saturating_duration_since(*seen) < interval);
        }

        match last_seen.get(&client) {
            Some(seen) if now.saturating_duration_since(*seen) < interval => false,
            _ => {
                last_seen.insert(client, now);
                true
            }
        }
    }
}

/// Request guard failing with `429 Too Many Requests` for clients over the configured rate.
pub struct Throttled;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Throttled {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (throttle, client) = match (
            request.rocket().state::<RequestThrottle>(),
            request.client_ip(),
        ) {
            (Some(throttle), Some(client)) => (throttle, client),
            _ => {
                trace!("no throttle or client address, letting request through");
                return Outcome::Success(Throttled);
            }
        };

        if throttle.check(client, Instant::now()) {
            Outcome::Success(Throttled)
        } else {
            warn!("too many requests from {}", client);
            Outcome::Error((Status::TooManyRequests, anyhow!("rate limit exceeded")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));

    #[test]
    fn one_request_per_second() {
        let throttle = RequestThrottle::new(1);
        let start = Instant::now();

        assert!(throttle.check(CLIENT, start));
        assert!(!throttle.check(CLIENT, start + Duration::from_millis(500)));
        assert!(throttle.check(OTHER, start + Duration::from_millis(500)));
        assert!(throttle.check(CLIENT, start + Duration::from_secs(1)));
    }

    #[test]
    fn rejected_requests_dont_extend_the_window() {
        let throttle = RequestThrottle::new(2);
        let start = Instant::now();

        assert!(throttle.check(CLIENT, start));
        assert!(!throttle.check(CLIENT, start + Duration::from_millis(400)));
        assert!(throttle.check(CLIENT, start + Duration::from_millis(500)));
    }

    #[test]
    fn zero_disables_throttling() {
        let throttle = RequestThrottle::new(0);
        let now = Instant::now();

        for _ in 0..10 {
            assert!(throttle.check(CLIENT, now));
        }
    }
}
