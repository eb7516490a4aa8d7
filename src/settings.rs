// Runtime settings, read from the environment (and a .env file if present).

use crate::core::moderation::ModerationConfig;
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    /// SQLite location. Without it the bot runs with an unconfigured store.
    pub database_url: Option<String>,
    pub port: u16,
    pub moderation: ModerationConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing BOT_TOKEN environment variable"))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let defaults = ModerationConfig::default();
        let log_channel_id: i64 = parse_or(&lookup, "LOG_CHANNEL_ID", 0)?;
        let mute_hours: u64 = parse_or(&lookup, "MUTE_HOURS", defaults.mute_duration_secs / 3600)?;
        let mute_duration_secs = mute_hours
            .checked_mul(3600)
            .ok_or_else(|| anyhow!("MUTE_HOURS is too large: {}", mute_hours))?;

        let moderation = ModerationConfig {
            warn_limit: parse_or(&lookup, "WARN_LIMIT", defaults.warn_limit)?,
            mute_duration_secs,
            max_mentions: parse_or(&lookup, "MAX_MENTIONS", defaults.max_mentions)?,
            member_cache_ttl_secs: parse_or(
                &lookup,
                "MEMBER_CACHE_TTL_SECS",
                defaults.member_cache_ttl_secs,
            )?,
            log_channel_id: (log_channel_id != 0).then_some(log_channel_id),
            ..defaults
        };
        if moderation.warn_limit == 0 {
            return Err(anyhow!("WARN_LIMIT must be at least 1"));
        }

        Ok(Self {
            bot_token,
            database_url,
            port: parse_or(&lookup, "PORT", 8080)?,
            moderation,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
