// Entry point of the link guard bot.
//
// **Architecture Overview:**
// - `core/` = Moderation rules and services (platform-agnostic)
// - `infra/` = Policy store implementations and the health endpoint
// - `telegram/` = Telegram adapters (platform calls, update routing)
//
// This file is the composition root: load settings, build the services,
// start the background tasks and run the dispatcher.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
mod settings;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

use crate::core::moderation::{
    ActionExecutor, ChatPlatform, CommandService, MemberCache, ModerationEngine, PolicyStore,
};
use crate::infra::health::run_health_server;
use crate::infra::moderation::{SqlitePolicyStore, UnconfiguredPolicyStore};
use crate::settings::Settings;
use crate::telegram::{schema, AppState, TelegramPlatform};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

const STARTUP_NOTICE: &str = "✅ Bot has restarted!\nI am now online and protecting your groups.";

/// Periodically drop expired membership lookups so the cache stays bounded.
fn spawn_cache_sweeper(cache: Arc<MemberCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cache.ttl().max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let evicted = cache.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = cache.len(), "Swept member cache");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        config = %serde_json::to_string(&settings.moderation)?,
        "Loaded moderation config"
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let store: Arc<dyn PolicyStore> = match &settings.database_url {
        Some(url) => Arc::new(
            SqlitePolicyStore::connect(url)
                .await
                .with_context(|| format!("Failed to open policy database at {}", url))?,
        ),
        None => {
            tracing::warn!(
                "DATABASE_URL is not set; moderation is disabled and admin commands will report database errors"
            );
            Arc::new(UnconfiguredPolicyStore)
        }
    };

    let bot = Bot::new(settings.bot_token.clone());
    let me = bot.get_me().await.context("Failed to reach the Telegram API")?;
    let bot_username = me.user.username.clone();

    let telegram = Arc::new(TelegramPlatform::new(bot.clone()));
    let platform: Arc<dyn ChatPlatform> = telegram.clone();

    let member_cache = Arc::new(MemberCache::new(Duration::from_secs(
        settings.moderation.member_cache_ttl_secs,
    )));
    let engine = Arc::new(ModerationEngine::new(
        store.clone(),
        platform.clone(),
        member_cache.clone(),
        settings.moderation.clone(),
    ));
    let executor = Arc::new(ActionExecutor::new(
        platform.clone(),
        settings.moderation.clone(),
    ));
    let commands = Arc::new(CommandService::new(
        store,
        platform.clone(),
        executor.clone(),
    ));

    tokio::spawn(run_health_server(settings.port));
    spawn_cache_sweeper(member_cache);

    executor.send_log(STARTUP_NOTICE).await;

    let state = Arc::new(AppState {
        directory: telegram,
        platform,
        engine,
        executor,
        commands,
        bot_username: bot_username.clone(),
    });

    tracing::info!(
        username = bot_username.as_deref().unwrap_or("unknown"),
        "Bot is running"
    );

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
