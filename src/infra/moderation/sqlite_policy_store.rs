// SQLite-backed policy store for persistent moderation data.
//
// Tables:
// - whitelist_domains: Domains whose links are allowed
// - whitelist_users: Users exempt from moderation
// - blacklist_words: Banned words, lower-cased
// - warnings: Per-user warning counters (global, not per chat)

use crate::core::moderation::{normalize_domain, normalize_word, PolicyError, PolicyStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub struct SqlitePolicyStore {
    pool: Pool<Sqlite>,
}

fn unavailable(e: sqlx::Error) -> PolicyError {
    PolicyError::StoreUnavailable(e.to_string())
}

impl SqlitePolicyStore {
    /// Open (creating if needed) the database at `database_url` and run migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // The parsed filename has the query string already stripped.
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), PolicyError> {
        // Ordered by insertion so listings and blacklist matching are stable.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS whitelist_domains (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS whitelist_users (
                user_id INTEGER PRIMARY KEY,
                added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blacklist_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                user_id INTEGER PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn add_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError> {
        sqlx::query("INSERT OR IGNORE INTO whitelist_domains (domain) VALUES (?)")
            .bind(normalize_domain(domain))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn remove_whitelist_domain(&self, domain: &str) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM whitelist_domains WHERE domain = ?")
            .bind(normalize_domain(domain))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn is_domain_whitelisted(&self, text: &str) -> Result<bool, PolicyError> {
        let hit: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM whitelist_domains WHERE instr(?, domain) > 0)",
        )
        .bind(text.to_lowercase())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(hit != 0)
    }

    async fn list_whitelist_domains(&self) -> Result<Vec<String>, PolicyError> {
        let rows = sqlx::query("SELECT domain FROM whitelist_domains ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows.iter().map(|row| row.get("domain")).collect())
    }

    async fn add_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError> {
        sqlx::query("INSERT OR IGNORE INTO whitelist_users (user_id) VALUES (?)")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn remove_whitelist_user(&self, user_id: u64) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM whitelist_users WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn is_user_whitelisted(&self, user_id: u64) -> Result<bool, PolicyError> {
        let row = sqlx::query("SELECT 1 FROM whitelist_users WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.is_some())
    }

    async fn list_whitelist_users(&self) -> Result<Vec<u64>, PolicyError> {
        let rows = sqlx::query("SELECT user_id FROM whitelist_users ORDER BY added_at, user_id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows
            .iter()
            .map(|row| row.get::<i64, _>("user_id") as u64)
            .collect())
    }

    async fn add_blacklist_word(&self, word: &str) -> Result<(), PolicyError> {
        sqlx::query("INSERT OR IGNORE INTO blacklist_words (word) VALUES (?)")
            .bind(normalize_word(word))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn remove_blacklist_word(&self, word: &str) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM blacklist_words WHERE word = ?")
            .bind(normalize_word(word))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn list_blacklist(&self) -> Result<Vec<String>, PolicyError> {
        let rows = sqlx::query("SELECT word FROM blacklist_words ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(rows.iter().map(|row| row.get("word")).collect())
    }

    async fn get_warning_count(&self, user_id: u64) -> Result<u32, PolicyError> {
        let row = sqlx::query("SELECT count FROM warnings WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(row.map(|r| r.get::<i64, _>("count") as u32).unwrap_or(0))
    }

    async fn increment_warning(&self, user_id: u64) -> Result<u32, PolicyError> {
        // Single upsert, so concurrent increments cannot lose updates.
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO warnings (user_id, count)
            VALUES (?, 1)
            ON CONFLICT(user_id) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(user_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(count as u32)
    }

    async fn reset_warnings(&self, user_id: u64) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM warnings WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn record_strike(&self, user_id: u64, limit: u32) -> Result<u32, PolicyError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO warnings (user_id, count)
            VALUES (?, 1)
            ON CONFLICT(user_id) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(user_id as i64)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;

        if count >= limit as i64 {
            sqlx::query("UPDATE warnings SET count = 0 WHERE user_id = ?")
                .bind(user_id as i64)
                .execute(&mut *tx)
                .await
                .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, SqlitePolicyStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.db");
        let store = SqlitePolicyStore::connect(path.to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_domain_whitelist_round_trip() {
        let (_dir, store) = temp_store().await;

        assert!(!store.is_domain_whitelisted("https://example.com/page").await.unwrap());

        store.add_whitelist_domain("Example.com").await.unwrap();
        store.add_whitelist_domain("example.com").await.unwrap();
        assert!(store.is_domain_whitelisted("see EXAMPLE.com/page").await.unwrap());
        assert_eq!(store.list_whitelist_domains().await.unwrap(), vec!["example.com"]);

        store.remove_whitelist_domain("example.com").await.unwrap();
        store.remove_whitelist_domain("example.com").await.unwrap();
        assert!(!store.is_domain_whitelisted("https://example.com/page").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_whitelist() {
        let (_dir, store) = temp_store().await;

        store.add_whitelist_user(42).await.unwrap();
        store.add_whitelist_user(42).await.unwrap();
        assert!(store.is_user_whitelisted(42).await.unwrap());
        assert_eq!(store.list_whitelist_users().await.unwrap(), vec![42]);

        store.remove_whitelist_user(42).await.unwrap();
        assert!(!store.is_user_whitelisted(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_blacklist_keeps_insertion_order_and_lowercases() {
        let (_dir, store) = temp_store().await;

        store.add_blacklist_word("Crypto").await.unwrap();
        store.add_blacklist_word("casino").await.unwrap();
        store.add_blacklist_word("CRYPTO").await.unwrap();
        assert_eq!(store.list_blacklist().await.unwrap(), vec!["crypto", "casino"]);

        store.remove_blacklist_word("CASINO").await.unwrap();
        assert_eq!(store.list_blacklist().await.unwrap(), vec!["crypto"]);
    }

    #[tokio::test]
    async fn test_warning_counters() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.get_warning_count(7).await.unwrap(), 0);
        assert_eq!(store.increment_warning(7).await.unwrap(), 1);
        assert_eq!(store.increment_warning(7).await.unwrap(), 2);
        assert_eq!(store.get_warning_count(7).await.unwrap(), 2);

        store.reset_warnings(7).await.unwrap();
        assert_eq!(store.get_warning_count(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_strike_resets_at_limit() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.record_strike(7, 3).await.unwrap(), 1);
        assert_eq!(store.record_strike(7, 3).await.unwrap(), 2);
        assert_eq!(store.record_strike(7, 3).await.unwrap(), 3);
        assert_eq!(store.get_warning_count(7).await.unwrap(), 0);
        assert_eq!(store.record_strike(7, 3).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("policy.db");
        let url = path.to_str().unwrap().to_string();

        {
            let store = SqlitePolicyStore::connect(&url).await.unwrap();
            store.add_blacklist_word("crypto").await.unwrap();
            store.increment_warning(1).await.unwrap();
        }

        let store = SqlitePolicyStore::connect(&url).await.unwrap();
        assert_eq!(store.list_blacklist().await.unwrap(), vec!["crypto"]);
        assert_eq!(store.get_warning_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_url_query_is_not_part_of_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/policy.db?mode=rwc", dir.path().display());

        let store = SqlitePolicyStore::connect(&url).await.unwrap();
        store.add_whitelist_user(1).await.unwrap();

        assert!(dir.path().join("policy.db").exists());
        assert!(!dir.path().join("policy.db?mode=rwc").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_strikes_never_skip_the_limit() {
        let (_dir, store) = temp_store().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..60 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.record_strike(77, 3).await }));
        }

        let mut mutes = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() >= 3 {
                mutes += 1;
            }
        }

        assert_eq!(mutes, 20);
        assert_eq!(store.get_warning_count(77).await.unwrap(), 0);
    }
}
