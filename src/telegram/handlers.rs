// Update routing: commands first, then moderation for group messages,
// and inline-button presses.

use super::convert::{callback_action, incoming_message, observed_users};
use super::platform::TelegramPlatform;
use crate::core::moderation::{
    ActionExecutor, ActionReport, AdminCommand, ChatPlatform, CommandOutcome, CommandService,
    IncomingMessage, ModerationEngine,
};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, warn};

/// Shared handles injected into every update handler.
pub struct AppState {
    /// Handle directory used to resolve @mentions.
    pub directory: Arc<TelegramPlatform>,
    pub platform: Arc<dyn ChatPlatform>,
    pub engine: Arc<ModerationEngine>,
    pub executor: Arc<ActionExecutor>,
    pub commands: Arc<CommandService>,
    /// The bot's own username, for `/cmd@bot` addressing.
    pub bot_username: Option<String>,
}

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Command,
    Clean,
    Moderated(ActionReport),
    Skipped,
}

impl AppState {
    pub async fn route_message(&self, message: &IncomingMessage) -> Routed {
        if let Some(user) = message.sender.user() {
            self.directory.remember_user(message.chat.id, user);
        }
        if let Some(target) = &message.reply_to {
            self.directory.remember_user(message.chat.id, target);
        }

        if let Some(command) = AdminCommand::parse(&message.text, self.bot_username.as_deref()) {
            if self.commands.execute(message, command).await == CommandOutcome::Handled {
                return Routed::Command;
            }
            // Non-admins don't get to smuggle links in through command syntax.
        }

        if message.chat.is_private {
            return Routed::Skipped;
        }

        let decision = self.engine.evaluate(message).await;
        if decision.is_ignore() {
            return Routed::Clean;
        }

        Routed::Moderated(self.executor.apply(message, &decision).await)
    }
}

async fn handle_message(state: Arc<AppState>, msg: Message) -> anyhow::Result<()> {
    for user in observed_users(&msg) {
        state.directory.remember_user(msg.chat.id.0, &user);
    }

    let Some(incoming) = incoming_message(&msg) else {
        return Ok(());
    };

    let routed = state.route_message(&incoming).await;
    debug!(
        chat_id = incoming.chat.id,
        message_id = incoming.message_id,
        outcome = ?routed,
        known_handles = state.directory.known_handles(),
        "Message routed"
    );
    Ok(())
}

async fn handle_callback_query(state: Arc<AppState>, query: CallbackQuery) -> anyhow::Result<()> {
    let Some(action) = callback_action(&query) else {
        return Ok(());
    };

    if state.commands.handle_callback(&action).await == CommandOutcome::Ignored {
        // Unknown buttons still get answered so the client stops spinning.
        if let Err(e) = state.platform.answer_callback(&action.id, "", false).await {
            warn!(error = %e, "Failed to answer callback");
        }
    }
    Ok(())
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query))
}
