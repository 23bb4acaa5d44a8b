//! Time-bounded memoization of successful verdicts
//!
//! Only [`Verdict::Success`] is ever cached. Any other verdict for the same
//! `(user, pass, extra_groups)` tuple evicts the entry, so an earlier success
//! cannot be replayed after a later rejection.

use async_trait::async_trait;
use authgate_core::metrics as names;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::authenticator::{Authenticator, Verdict};

/// Expiration used when `now + ttl` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Authenticator that remembers successful verdicts of its delegate for `ttl`
pub struct CachedAuthenticator<A> {
    delegate: A,
    ttl: Duration,
    /// cache key -> expiration
    entries: Mutex<HashMap<String, Instant>>,
}

#[derive(Serialize)]
struct CacheKey<'a> {
    #[serde(rename = "U")]
    user: &'a str,
    #[serde(rename = "P")]
    pass: &'a str,
    #[serde(rename = "G")]
    groups: &'a [String],
}

impl<A: Authenticator> CachedAuthenticator<A> {
    pub fn new(delegate: A, ttl: Duration) -> Self {
        Self {
            delegate,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn delegate(&self) -> &A {
        &self.delegate
    }

    /// Number of entries currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Cache key for a credential tuple.
///
/// The group order is part of the key. The password is encoded, not
/// hashed: the key is reversible.
pub fn cache_key(user: &str, pass: &str, extra_groups: &[String]) -> Option<String> {
    let key = CacheKey {
        user,
        pass,
        groups: extra_groups,
    };
    serde_json::to_vec(&key).ok().map(|json| BASE64.encode(json))
}

#[async_trait]
impl<A: Authenticator> Authenticator for CachedAuthenticator<A> {
    async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict {
        let Some(key) = cache_key(user, pass, extra_groups) else {
            return self.delegate.authenticate(user, pass, extra_groups).await;
        };

        // Held across the delegate call: one lookup-or-populate cycle at a time.
        let mut entries = self.entries.lock().await;

        if let Some(expiration) = entries.get(&key) {
            if *expiration > Instant::now() {
                debug!(user = %user, "auth cache hit");
                counter!(names::CACHE_HITS_TOTAL).increment(1);
                return Verdict::Success;
            }
        }
        counter!(names::CACHE_MISSES_TOTAL).increment(1);

        let verdict = self.delegate.authenticate(user, pass, extra_groups).await;

        if verdict.is_success() {
            let now = Instant::now();
            entries.retain(|_, expiration| *expiration > now);
            let expiration = now
                .checked_add(self.ttl)
                .unwrap_or_else(|| now + FAR_FUTURE);
            entries.insert(key, expiration);
            debug!(user = %user, ttl_secs = self.ttl.as_secs(), "cached successful authentication");
        } else if entries.remove(&key).is_some() {
            debug!(user = %user, verdict = %verdict, "evicted cached authentication");
        }

        verdict
    }
}
