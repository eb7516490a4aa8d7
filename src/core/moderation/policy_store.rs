// Policy store port - persistence contract for whitelist, blacklist and warnings.
//
// All membership operations are idempotent: adding a present item or removing
// an absent one is a no-op. Implementations live in infra.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// Backing store is unreachable or not configured. Callers fail open.
    #[error("Policy store unavailable: {0}")]
    StoreUnavailable(String),
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn add_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError>;

    async fn remove_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError>;

    /// True if any whitelisted domain appears anywhere in `text`.
    /// Matching ignores case: domains are stored lower-cased and compared
    /// against the lower-cased text.
    async fn is_domain_whitelisted(&self, text: &str) -> Result<bool, PolicyError>;

    async fn list_whitelist_domains(&self) -> Result<Vec<String>, PolicyError>;

    async fn add_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError>;

    async fn remove_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError>;

    async fn is_user_whitelisted(&self, user_id: u64) -> Result<bool, PolicyError>;

    async fn list_whitelist_users(&self) -> Result<Vec<u64>, PolicyError>;

    /// Words are stored lower-cased.
    async fn add_blacklist_word(&self, word: &str) -> Result<(), PolicyError>;

    async fn remove_blacklist_word(&self, word: &str) -> Result<(), PolicyError>;

    /// Blacklisted words in insertion order.
    async fn list_blacklist(&self) -> Result<Vec<String>, PolicyError>;

    async fn get_warning_count(&self, user_id: u64) -> Result<u32, PolicyError>;

    /// Atomically add one warning. Returns the new count.
    async fn increment_warning(&self, user_id: u64) -> Result<u32, PolicyError>;

    async fn reset_warnings(&self, user_id: u64) -> Result<(), PolicyError>;

    /// Add one warning and, if the new count reaches `limit`, reset the stored
    /// count to 0. Returns the post-increment count.
    ///
    /// Backends should override this so the two steps happen atomically;
    /// otherwise two concurrent strikes can both observe the limit.
    async fn record_strike(&self, user_id: u64, limit: u32) -> Result<u32, PolicyError> {
        let count = self.increment_warning(user_id).await?;
        if count >= limit {
            self.reset_warnings(user_id).await?;
        }
        Ok(count)
    }
}

/// Domains are matched case-insensitively, so they are normalised on the way in.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}
