//! Manager configuration.

use crate::thread_id::DEFAULT_ENTROPY_LEN;
use crate::token::Token;
use std::time::Duration;

/// Configuration accepted by the manager at construction.
///
/// Network and log store handles are injected separately; the config covers
/// the knobs.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Emit debug-level lifecycle logging.
    pub debug: bool,
    /// Signing secret for the token authority. `None` generates a random
    /// per-process secret (tokens won't survive a restart).
    pub token_secret: Option<Vec<u8>>,
    /// Token time-to-live. `None` means tokens never expire, the local
    /// process default; networked deployments should set a bound.
    pub token_ttl: Option<Duration>,
    /// Entropy length in bytes for thread IDs minted by this manager.
    pub entropy_len: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            token_secret: None,
            token_ttl: None,
            entropy_len: DEFAULT_ENTROPY_LEN,
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debug logging toggle.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the token authority's signing secret.
    #[must_use]
    pub fn with_token_secret(mut self, secret: Vec<u8>) -> Self {
        self.token_secret = Some(secret);
        self
    }

    /// Sets the token time-to-live.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Sets the thread ID entropy length.
    #[must_use]
    pub fn with_entropy_len(mut self, len: usize) -> Self {
        self.entropy_len = len;
        self
    }
}

/// Options for creating a new DB.
#[derive(Debug, Clone, Default)]
pub struct NewDbOptions {
    /// Token scoping the creation to a specific identity. Omitted, the
    /// process-default identity applies.
    pub token: Option<Token>,
}

impl NewDbOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes the creation to the identity embedded in the token.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert!(!config.debug);
        assert!(config.token_secret.is_none());
        assert!(config.token_ttl.is_none());
        assert_eq!(config.entropy_len, DEFAULT_ENTROPY_LEN);
    }

    #[test]
    fn builder_pattern() {
        let config = ManagerConfig::new()
            .with_debug(true)
            .with_token_secret(vec![1, 2, 3])
            .with_token_ttl(Duration::from_secs(60))
            .with_entropy_len(16);

        assert!(config.debug);
        assert_eq!(config.token_secret, Some(vec![1, 2, 3]));
        assert_eq!(config.token_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.entropy_len, 16);
    }
}
