//! Challenge-response authentication for the management socket.
//!
//! When started with `-S`, the daemon greets every connection with status
//! 107 and a one-time challenge on the first payload line. The client proves
//! it knows the shared secret by answering with
//! `auth <sha256(challenge \n secret \n challenge \n)>`.

use sha2::{Digest, Sha256};

/// Extract the challenge token from a 107 greeting payload.
pub fn parse_challenge(payload: &str) -> Option<&str> {
    payload
        .lines()
        .next()
        .map(str::trim)
        .filter(|challenge| !challenge.is_empty())
}

/// Compute the lowercase hex response to `challenge` for `secret`.
pub fn compute_response(challenge: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(b"\n");
    hasher.update(secret.as_bytes());
    hasher.update(b"\n");
    hasher.update(challenge.as_bytes());
    hasher.update(b"\n");
    hex::encode(hasher.finalize())
}

/// Format the `auth` command line for a computed response.
pub fn format_auth_command(response: &str) -> String {
    format!("auth {}", response)
}
