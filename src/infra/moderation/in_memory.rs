// In-memory implementation of PolicyStore.
//
// Used in tests and as a drop-in when persistence is not wanted. Concurrency is
// handled by DashMap's per-shard locking, so no Mutex is needed.

use crate::core::moderation::{normalize_domain, normalize_word, PolicyError, PolicyStore};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct InMemoryPolicyStore {
    /// Maps domain -> insertion sequence
    domains: DashMap<String, u64>,
    users: DashSet<u64>,
    /// Maps word -> insertion sequence
    words: DashMap<String, u64>,
    warnings: DashMap<u64, u32>,
    sequence: AtomicU64,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            domains: DashMap::new(),
            users: DashSet::new(),
            words: DashMap::new(),
            warnings: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys of an insertion-ordered map, oldest first.
fn ordered_keys(map: &DashMap<String, u64>) -> Vec<String> {
    let mut entries: Vec<(u64, String)> = map
        .iter()
        .map(|entry| (*entry.value(), entry.key().clone()))
        .collect();
    entries.sort();
    entries.into_iter().map(|(_, key)| key).collect()
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn add_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError> {
        let seq = self.next_sequence();
        self.domains.entry(normalize_domain(domain)).or_insert(seq);
        Ok(())
    }

    async fn remove_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError> {
        self.domains.remove(&normalize_domain(domain));
        Ok(())
    }

    async fn is_domain_whitelisted(&self, text: &str) -> Result<bool, PolicyError> {
        let text = text.to_lowercase();
        Ok(self
            .domains
            .iter()
            .any(|entry| text.contains(entry.key().as_str())))
    }

    async fn list_whitelist_domains(&self) -> Result<Vec<String>, PolicyError> {
        Ok(ordered_keys(&self.domains))
    }

    async fn add_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError> {
        self.users.insert(user_id);
        Ok(())
    }

    async fn remove_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError> {
        self.users.remove(&user_id);
        Ok(())
    }

    async fn is_user_whitelisted(&self, user_id: u64) -> Result<bool, PolicyError> {
        Ok(self.users.contains(&user_id))
    }

    async fn list_whitelist_users(&self) -> Result<Vec<u64>, PolicyError> {
        let mut users: Vec<u64> = self.users.iter().map(|id| *id).collect();
        users.sort_unstable();
        Ok(users)
    }

    async fn add_blacklist_word(&self, word: &str) -> Result<(), PolicyError> {
        let seq = self.next_sequence();
        self.words.entry(normalize_word(word)).or_insert(seq);
        Ok(())
    }

    async fn remove_blacklist_word(&self, word: &str) -> Result<(), PolicyError> {
        self.words.remove(&normalize_word(word));
        Ok(())
    }

    async fn list_blacklist(&self) -> Result<Vec<String>, PolicyError> {
        Ok(ordered_keys(&self.words))
    }

    async fn get_warning_count(&self, user_id: u64) -> Result<u32, PolicyError> {
        Ok(self.warnings.get(&user_id).map(|count| *count).unwrap_or(0))
    }

    async fn increment_warning(&self, user_id: u64) -> Result<u32, PolicyError> {
        let mut count = self.warnings.entry(user_id).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    async fn reset_warnings(&self, user_id: u64) -> Result<(), PolicyError> {
        self.warnings.remove(&user_id);
        Ok(())
    }

    async fn record_strike(&self, user_id: u64, limit: u32) -> Result<u32, PolicyError> {
        // The entry guard holds the shard lock across increment and reset.
        let mut count = self.warnings.entry(user_id).or_insert(0);
        *count = count.saturating_add(1);
        let reached = *count;
        if reached >= limit {
            *count = 0;
        }
        Ok(reached)
    }
}
