// Policy store used when no database is configured.
//
// Every call fails with StoreUnavailable: moderation fails open and admin
// commands report a database error instead of pretending to succeed.

use crate::core::moderation::{PolicyError, PolicyStore};
use async_trait::async_trait;

pub struct UnconfiguredPolicyStore;

fn not_configured<T>() -> Result<T, PolicyError> {
    Err(PolicyError::StoreUnavailable(
        "policy store is not configured".to_string(),
    ))
}

#[async_trait]
impl PolicyStore for UnconfiguredPolicyStore {
    async fn add_whitelist_domain(&self, _domain: &str) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn remove_whitelist_domain(&self, _domain: &str) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn is_domain_whitelisted(&self, _text: &str) -> Result<bool, PolicyError> {
        not_configured()
    }

    async fn list_whitelist_domains(&self) -> Result<Vec<String>, PolicyError> {
        not_configured()
    }

    async fn add_whitelist_user(&self, _user_id: u64) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn remove_whitelist_user(&self, _user_id: u64) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn is_user_whitelisted(&self, _user_id: u64) -> Result<bool, PolicyError> {
        not_configured()
    }

    async fn list_whitelist_users(&self) -> Result<Vec<u64>, PolicyError> {
        not_configured()
    }

    async fn add_blacklist_word(&self, _word: &str) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn remove_blacklist_word(&self, _word: &str) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn list_blacklist(&self) -> Result<Vec<String>, PolicyError> {
        not_configured()
    }

    async fn get_warning_count(&self, _user_id: u64) -> Result<u32, PolicyError> {
        not_configured()
    }

    async fn increment_warning(&self, _user_id: u64) -> Result<u32, PolicyError> {
        not_configured()
    }

    async fn reset_warnings(&self, _user_id: u64) -> Result<(), PolicyError> {
        not_configured()
    }

    async fn record_strike(&self, _user_id: u64, _limit: u32) -> Result<u32, PolicyError> {
        not_configured()
    }
}
