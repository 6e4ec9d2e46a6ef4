use std::io;

use anyhow::anyhow;
use rocket::{
    data::{ByteUnit, FromData, Outcome},
    http::Status,
    Data, Request,
};
use tracing::{trace, warn};

use crate::webhooks::github::GitHubSecret;

// only SHA-256 is checked, GitHub sends it alongside the legacy SHA-1 `X-Hub-Signature`
const X_GITHUB_SIGNATURE: &str = "X-Hub-Signature-256";

pub(crate) fn validate_signature(secret: &str, signature: &str, data: &[u8]) -> bool {
    trace!("validating signature...");
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(data);

    // GitHub puts a prefix in front of its hex SHA256
    let signature = match signature.strip_prefix("sha256=") {
        Some(s) => s,
        None => {
            trace!("couldn't strip prefix from signature `{}`", signature);
            return false;
        }
    };

    match hex::decode(signature) {
        Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
        Err(_) => {
            trace!("couldn't decode hex-encoded signature {}", signature);
            false
        }
    }
}

/// Raw body of a webhook delivery whose signature matched the configured secret.
pub struct SignedGitHubPayload(pub Vec<u8>);

const LIMIT: ByteUnit = ByteUnit::Mebibyte(1);

// Tracking issue for chaining Data guards to avoid reimplementing all this:
// https://github.com/SergioBenitez/Rocket/issues/775
#[rocket::async_trait]
impl<'r> FromData<'r> for SignedGitHubPayload {
    type Error = anyhow::Error;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> Outcome<'r, Self> {
        trace!("received payload on GitHub webhook endpoint: {:?}", request);

        if !request.content_type().map_or(false, |ct| ct.is_json()) {
            trace!(
                "content type `{:?}` wasn't json, stopping here...",
                request.content_type()
            );
            return Outcome::Error((Status::BadRequest, anyhow!("wrong content type")));
        }

        let signatures = request
            .headers()
            .get(X_GITHUB_SIGNATURE)
            .collect::<Vec<_>>();
        if signatures.len() != 1 {
            warn!("couldn't locate {} header", X_GITHUB_SIGNATURE);
            return Outcome::Error((
                Status::BadRequest,
                anyhow!("request header needs exactly one signature"),
            ));
        }

        let size_limit = request.limits().get("json").unwrap_or(LIMIT);
        let content = match data.open(size_limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                let eof = io::ErrorKind::UnexpectedEof;
                trace!("payload was too big");
                return Outcome::Error((
                    Status::PayloadTooLarge,
                    io::Error::new(eof, "data limit exceeded").into(),
                ));
            }
            Err(e) => return Outcome::Error((Status::BadRequest, e.into())),
        };

        let signature = signatures[0];
        let secret = match request.rocket().state::<GitHubSecret>() {
            Some(secret) => secret,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    anyhow!("no webhook secret is configured"),
                ))
            }
        };

        if !validate_signature(&secret.0, signature, &content) {
            warn!("signature validation failed, stopping here...");
            return Outcome::Error((Status::BadRequest, anyhow!("couldn't verify signature")));
        }

        trace!("validated GitHub payload");
        Outcome::Success(SignedGitHubPayload(content))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::validate_signature;

    /// Computes the header value GitHub would send for `body`.
    pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    const BODY: &[u8] = br#"{"secret": "hello"}"#;
    const SECRET: &str = "iAmAsEcReTkEy";

    #[test]
    fn known_signature_is_valid() {
        assert!(validate_signature(
            SECRET,
            "sha256=a2b41e3bb9a09babb36b42e145eacc38916d078ba378d60db679f6ac79cd1408",
            BODY
        ));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        assert!(!validate_signature(
            SECRET,
            "sha256=a2b41e3bb9a09babb36b42e145eacc38916d078ba378d60db679f6ac79cd1409",
            BODY
        ));
    }

    #[test]
    fn signature_covers_exact_bytes() {
        let signature = sign(SECRET, BODY);

        assert!(validate_signature(SECRET, &signature, BODY));
        assert!(!validate_signature(SECRET, &signature, br#"{"secret":"hello"}"#));
        assert!(!validate_signature("another secret", &signature, BODY));
    }

    #[test]
    fn malformed_signatures_are_invalid() {
        let signature = sign(SECRET, BODY);
        let bare = signature.trim_start_matches("sha256=");

        assert!(!validate_signature(SECRET, bare, BODY));
        assert!(!validate_signature(SECRET, &format!("sha1={}", bare), BODY));
        assert!(!validate_signature(SECRET, "sha256=not-hex", BODY));
        assert!(!validate_signature(SECRET, "", BODY));
    }
}
