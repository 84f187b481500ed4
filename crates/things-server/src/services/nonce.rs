//! Anti-forgery tokens for the HTML surface

use crate::storage::MemoryCache;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;

/// Tokens stay valid for their whole window and may be submitted more
/// than once within it.
const NONCE_TTL: Duration = Duration::from_secs(600);

/// Issues and verifies per-action anti-forgery tokens.
///
/// A token is a random value remembered in the cache under a key that
/// binds it to the named action, so a token issued for one form cannot
/// authorize another.
pub struct NonceService {
    cache: Arc<MemoryCache>,
}

impl NonceService {
    pub fn new(cache: Arc<MemoryCache>) -> Self {
        Self { cache }
    }

    /// Generates a fresh token bound to `action`.
    pub fn issue(&self, action: &str) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.cache
            .set_with_ttl(cache_key(action, &token), Vec::new(), NONCE_TTL);

        token
    }

    /// Checks whether `token` was issued for `action` and has not expired.
    pub fn verify(&self, action: &str, token: &str) -> bool {
        !token.is_empty() && self.cache.exists(&cache_key(action, token))
    }
}

fn cache_key(action: &str, token: &str) -> String {
    format!("nonce:{}:{}", action, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> NonceService {
        NonceService::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn issued_token_verifies_for_its_action() {
        let nonces = test_service();

        let token = nonces.issue("thing-form");
        assert!(nonces.verify("thing-form", &token));
        // Reusable within the window.
        assert!(nonces.verify("thing-form", &token));
    }

    #[tokio::test]
    async fn token_is_bound_to_one_action() {
        let nonces = test_service();

        let token = nonces.issue("thing-form");
        assert!(!nonces.verify("other-form", &token));
    }

    #[tokio::test]
    async fn unknown_or_empty_tokens_fail() {
        let nonces = test_service();

        assert!(!nonces.verify("thing-form", "deadbeef"));
        assert!(!nonces.verify("thing-form", ""));
    }
}
