// Membership cache for mention checks.
//
// Keyed by (chat_id, lower-cased handle). Entries older than the TTL are
// treated as missing. Staleness inside the TTL window is accepted.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct CachedMembership {
    is_member: bool,
    observed_at: Instant,
}

pub struct MemberCache {
    ttl: Duration,
    entries: DashMap<(i64, String), CachedMembership>,
}

impl MemberCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, chat_id: i64, handle: &str) -> Option<bool> {
        self.get_at(chat_id, handle, Instant::now())
    }

    pub fn insert(&self, chat_id: i64, handle: &str, is_member: bool) {
        self.insert_at(chat_id, handle, is_member, Instant::now());
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn key(chat_id: i64, handle: &str) -> (i64, String) {
        (chat_id, handle.to_lowercase())
    }

    fn get_at(&self, chat_id: i64, handle: &str, now: Instant) -> Option<bool> {
        let key = Self::key(chat_id, handle);
        let entry = *self.entries.get(&key)?;
        if now.saturating_duration_since(entry.observed_at) < self.ttl {
            Some(entry.is_member)
        } else {
            self.entries.remove(&key);
            None
        }
    }

    fn insert_at(&self, chat_id: i64, handle: &str, is_member: bool, now: Instant) {
        self.entries.insert(
            Self::key(chat_id, handle),
            CachedMembership {
                is_member,
                observed_at: now,
            },
        );
    }

    fn evict_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.observed_at) < self.ttl);
        before.saturating_sub(self.entries.len())
    }
}
