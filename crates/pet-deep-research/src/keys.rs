//! Credential rotation for provider clients
//!
//! A client holding several API keys for the same provider moves to the next
//! key when one is rate limited. Rotation is internal to the client; the
//! workflow never sees which key served a call.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, warn};

use crate::error::{ResearchError, Result};

#[derive(Debug)]
pub struct ApiKeyRing {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl ApiKeyRing {
    /// Build a ring from candidate keys; blank keys and duplicates are dropped.
    ///
    /// Returns a configuration error when no usable key remains.
    pub fn new<I, S>(provider: &str, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut usable: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into().trim().to_string();
            if !key.is_empty() && !usable.contains(&key) {
                usable.push(key);
            }
        }

        if usable.is_empty() {
            return Err(ResearchError::Config(format!(
                "no API key configured for {}",
                provider
            )));
        }

        info!(provider, keys = usable.len(), "API keys available for rotation");
        Ok(Self {
            keys: usable,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key currently in use.
    pub fn current(&self) -> &str {
        let idx = self.cursor.load(Ordering::Relaxed) % self.keys.len();
        &self.keys[idx]
    }

    /// Advance to the next key.
    pub fn rotate(&self) {
        let next = (self.cursor.fetch_add(1, Ordering::Relaxed) + 1) % self.keys.len();
        info!(key = next + 1, of = self.keys.len(), "Rotated to next API key");
    }

    /// Run `op` with the current key, moving through the ring on rate limits.
    ///
    /// Every key gets at most one try per call. Errors other than a rate
    /// limit are returned immediately; if every key is rate limited the last
    /// rate-limit error is returned.
    pub async fn with_rotation<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 0..self.keys.len() {
            match op(self.current().to_string()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    warn!(attempt = attempt + 1, error = %e, "Rate limit hit, trying next key");
                    last_error = Some(e);
                    if attempt + 1 < self.keys.len() {
                        self.rotate();
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ResearchError::Config("empty key ring".to_string())))
    }
}
