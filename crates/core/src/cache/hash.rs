//! Request key generation for cache entries.

use sha2::{Digest, Sha256};

use crate::net::{CredentialsMode, Request};

/// Compute the cache key for a URL fetched with the given credentials mode.
///
/// The fragment never reaches the network, so it is ignored.
pub fn compute_request_key(url: &url::Url, credentials: CredentialsMode) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(credentials.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Shorthand for [`compute_request_key`] on a [`Request`].
pub fn request_key(request: &Request) -> String {
    compute_request_key(&request.url, request.credentials)
}
