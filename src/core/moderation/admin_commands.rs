// Admin command handlers - policy mutations gated by an admin check.
//
// Unauthorized use is dropped silently. The unmute button is the exception:
// pressing it without rights shows the presser an alert.

use super::action_executor::ActionExecutor;
use super::chat_platform::ChatPlatform;
use super::moderation_models::{
    CallbackAction, IncomingMessage, MemberPermissions, OutgoingMessage, SenderIdentity,
};
use super::policy_store::{normalize_domain, normalize_word, PolicyError, PolicyStore};
use std::sync::Arc;

const START_TEXT: &str = "👋 Hello! I am the Link Guard Bot.\n\n\
I keep your group clean by deleting links, banned words and mention spam sent by non-admins.\n\n\
My features:\n\
🔹 Delete text links, media captions and hidden links.\n\
🔹 Whitelist specific domains or users.\n\
🔹 Blacklist words.\n\
🔹 Warn users and mute them after repeated strikes.\n\
🔹 Log deleted messages to a channel.\n\n\
Add me to your group and promote me to admin!";

const UNMUTE_PREFIX: &str = "unmute_";

/// Admin check over a tagged sender: anonymous admins post as the chat itself,
/// everyone else needs an owner or administrator membership. Lookup failures
/// count as "not an admin".
pub async fn resolve_admin(
    platform: &dyn ChatPlatform,
    chat_id: i64,
    sender: &SenderIdentity,
) -> bool {
    match sender {
        SenderIdentity::SenderChat { .. } => sender.is_anonymous_admin_of(chat_id),
        SenderIdentity::RegularUser(user) => {
            match platform.get_chat_member(chat_id, user.id).await {
                Ok(status) => status.is_admin(),
                Err(e) => {
                    tracing::debug!(chat_id, user_id = user.id, error = %e, "Admin lookup failed");
                    false
                }
            }
        }
    }
}

/// Text commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Start,
    Ping,
    Whitelist(Option<String>),
    Unlist(Option<String>),
    Blacklist(Option<String>),
    Unblacklist(Option<String>),
    Unwarn,
    List,
}

impl AdminCommand {
    /// Parse `/command[@bot] [argument]`. Commands addressed to a different
    /// bot are not ours and return `None`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let (name, target) = match head.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (head, None),
        };

        if let (Some(target), Some(me)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(me) {
                return None;
            }
        }

        let arg = parts.next().map(str::to_string);
        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "ping" => Some(Self::Ping),
            "whitelist" => Some(Self::Whitelist(arg)),
            "unlist" => Some(Self::Unlist(arg)),
            "blacklist" => Some(Self::Blacklist(arg)),
            "unblacklist" => Some(Self::Unblacklist(arg)),
            "unwarn" => Some(Self::Unwarn),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(self, Self::Start | Self::Ping)
    }
}

/// Payload of the "unmute" inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmuteRequest {
    pub user_id: u64,
}

impl UnmuteRequest {
    pub fn callback_data(user_id: u64) -> String {
        format!("{}{}", UNMUTE_PREFIX, user_id)
    }

    pub fn parse(data: &str) -> Option<Self> {
        let user_id = data.strip_prefix(UNMUTE_PREFIX)?.parse().ok()?;
        Some(Self { user_id })
    }
}

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Not ours to answer: wrong chat type, unauthorized, or unknown payload.
    Ignored,
    Handled,
}

pub struct CommandService {
    store: Arc<dyn PolicyStore>,
    platform: Arc<dyn ChatPlatform>,
    executor: Arc<ActionExecutor>,
}

impl CommandService {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        platform: Arc<dyn ChatPlatform>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        Self {
            store,
            platform,
            executor,
        }
    }

    pub async fn execute(&self, message: &IncomingMessage, command: AdminCommand) -> CommandOutcome {
        let chat_id = message.chat.id;

        match command {
            AdminCommand::Start => {
                if !message.chat.is_private {
                    return CommandOutcome::Ignored;
                }
                self.executor
                    .send(OutgoingMessage::new(chat_id, START_TEXT))
                    .await;
                return CommandOutcome::Handled;
            }
            AdminCommand::Ping => {
                self.reply(message, "Pong! 🏓\nI am alive.").await;
                return CommandOutcome::Handled;
            }
            _ => {}
        }

        if command.requires_admin() {
            if message.chat.is_private {
                return CommandOutcome::Ignored;
            }
            if !resolve_admin(self.platform.as_ref(), chat_id, &message.sender).await {
                tracing::debug!(chat_id, ?command, "Ignoring admin command from non-admin");
                return CommandOutcome::Ignored;
            }
        }

        match command {
            AdminCommand::Whitelist(arg) => self.whitelist(message, arg).await,
            AdminCommand::Unlist(arg) => self.unlist(message, arg).await,
            AdminCommand::Blacklist(arg) => self.blacklist(message, arg).await,
            AdminCommand::Unblacklist(arg) => self.unblacklist(message, arg).await,
            AdminCommand::Unwarn => self.unwarn(message).await,
            AdminCommand::List => self.list(message).await,
            AdminCommand::Start | AdminCommand::Ping => {}
        }

        CommandOutcome::Handled
    }

    async fn whitelist(&self, message: &IncomingMessage, arg: Option<String>) {
        if let Some(target) = &message.reply_to {
            match self.store.add_whitelist_user(target.id).await {
                Ok(()) => {
                    self.confirm(
                        message,
                        format!(
                            "✅ User Whitelisted!\n{} has been added to the whitelist.\n\
                             They can now send links without being restricted.",
                            target.mention()
                        ),
                        format!("whitelisted user {} ({})", target.mention(), target.id),
                    )
                    .await
                }
                Err(e) => self.database_error(message, &e).await,
            }
            return;
        }

        let Some(domain) = arg.map(|d| normalize_domain(&d)).filter(|d| !d.is_empty()) else {
            self.reply(
                message,
                "Usage: /whitelist <domain> or reply to a user to whitelist them.",
            )
            .await;
            return;
        };

        match self.store.add_whitelist_domain(&domain).await {
            Ok(()) => {
                self.confirm(
                    message,
                    format!(
                        "✅ Domain Whitelisted!\nThe domain {} has been added to the whitelist.\n\
                         Links containing this domain will now be ignored.",
                        domain
                    ),
                    format!("whitelisted domain {}", domain),
                )
                .await
            }
            Err(e) => self.database_error(message, &e).await,
        }
    }

    async fn unlist(&self, message: &IncomingMessage, arg: Option<String>) {
        if let Some(target) = &message.reply_to {
            match self.store.remove_whitelist_user(target.id).await {
                Ok(()) => {
                    self.confirm(
                        message,
                        format!(
                            "✅ User Unlisted!\n{} has been removed from the whitelist.\n\
                             Their links will now be deleted.",
                            target.mention()
                        ),
                        format!("unlisted user {} ({})", target.mention(), target.id),
                    )
                    .await
                }
                Err(e) => self.database_error(message, &e).await,
            }
            return;
        }

        let Some(domain) = arg.map(|d| normalize_domain(&d)).filter(|d| !d.is_empty()) else {
            self.reply(
                message,
                "Usage: /unlist <domain> or reply to a user to remove them from the whitelist.",
            )
            .await;
            return;
        };

        match self.store.remove_whitelist_domain(&domain).await {
            Ok(()) => {
                self.confirm(
                    message,
                    format!(
                        "✅ Domain Unlisted!\nThe domain {} has been removed from the whitelist.\n\
                         Links containing this domain will now be deleted.",
                        domain
                    ),
                    format!("unlisted domain {}", domain),
                )
                .await
            }
            Err(e) => self.database_error(message, &e).await,
        }
    }

    async fn blacklist(&self, message: &IncomingMessage, arg: Option<String>) {
        let Some(word) = arg.map(|w| normalize_word(&w)).filter(|w| !w.is_empty()) else {
            self.reply(message, "Usage: /blacklist <word>").await;
            return;
        };

        match self.store.add_blacklist_word(&word).await {
            Ok(()) => {
                self.confirm(
                    message,
                    format!(
                        "✅ Word Blacklisted!\nMessages containing \"{}\" will now be deleted.",
                        word
                    ),
                    format!("blacklisted word {}", word),
                )
                .await
            }
            Err(e) => self.database_error(message, &e).await,
        }
    }

    async fn unblacklist(&self, message: &IncomingMessage, arg: Option<String>) {
        let Some(word) = arg.map(|w| normalize_word(&w)).filter(|w| !w.is_empty()) else {
            self.reply(message, "Usage: /unblacklist <word>").await;
            return;
        };

        match self.store.remove_blacklist_word(&word).await {
            Ok(()) => {
                self.confirm(
                    message,
                    format!(
                        "✅ Word Removed!\n\"{}\" is no longer blacklisted.",
                        word
                    ),
                    format!("unblacklisted word {}", word),
                )
                .await
            }
            Err(e) => self.database_error(message, &e).await,
        }
    }

    async fn unwarn(&self, message: &IncomingMessage) {
        let Some(target) = &message.reply_to else {
            self.reply(message, "Reply to a user to reset their warnings.")
                .await;
            return;
        };

        if let Err(e) = self.store.reset_warnings(target.id).await {
            self.reply(
                message,
                format!("❌ Database Error (Reset Warnings): {}", e),
            )
            .await;
            return;
        }

        // Fails when the user was never muted, which is fine.
        if let Err(e) = self
            .platform
            .restrict_member(message.chat.id, target.id, MemberPermissions::Default, None)
            .await
        {
            tracing::debug!(user_id = target.id, error = %e, "Unmute during unwarn failed");
        }

        self.confirm(
            message,
            format!(
                "✅ Warnings Reset!\nWarnings for {} have been cleared.\n\
                 They have been unmuted and can now send messages again.",
                target.mention()
            ),
            format!("reset warnings for {} ({})", target.mention(), target.id),
        )
        .await;
    }

    async fn list(&self, message: &IncomingMessage) {
        let listing = async {
            let domains = self.store.list_whitelist_domains().await?;
            let users = self.store.list_whitelist_users().await?;
            let words = self.store.list_blacklist().await?;
            Ok::<_, PolicyError>((domains, users, words))
        };

        match listing.await {
            Ok((domains, users, words)) => {
                let users: Vec<String> = users.iter().map(u64::to_string).collect();
                let text = format!(
                    "📋 Current Configuration\n\n\
                     Whitelisted domains: {}\n\
                     Whitelisted users: {}\n\
                     Blacklisted words: {}",
                    join_or_none(&domains),
                    join_or_none(&users),
                    join_or_none(&words)
                );
                self.executor
                    .send_transient(
                        OutgoingMessage::new(message.chat.id, text).reply_to(message.message_id),
                        self.executor.config().command_reply_ttl(),
                    )
                    .await;
            }
            Err(e) => self.database_error(message, &e).await,
        }
    }

    /// Handle an inline-button press. Only the unmute action exists.
    pub async fn handle_callback(&self, callback: &CallbackAction) -> CommandOutcome {
        let Some(request) = UnmuteRequest::parse(&callback.data) else {
            return CommandOutcome::Ignored;
        };
        let Some(notice) = callback.message else {
            self.answer(callback, "This button has expired.", true).await;
            return CommandOutcome::Handled;
        };
        let chat_id = notice.chat_id;

        let presser = SenderIdentity::RegularUser(callback.from.clone());
        if !resolve_admin(self.platform.as_ref(), chat_id, &presser).await {
            self.answer(callback, "❌ Only admins can unmute!", true).await;
            return CommandOutcome::Handled;
        }

        if let Err(e) = self
            .platform
            .restrict_member(chat_id, request.user_id, MemberPermissions::Default, None)
            .await
        {
            self.answer(callback, &format!("Failed to unmute: {}", e), true)
                .await;
            return CommandOutcome::Handled;
        }

        if let Err(e) = self.store.reset_warnings(request.user_id).await {
            self.answer(callback, &format!("Failed to unmute: {}", e), true)
                .await;
            return CommandOutcome::Handled;
        }

        let admin = callback.from.mention();
        match self
            .platform
            .edit_message(
                notice,
                &format!("✅ User unmuted by {}.\nWarnings have been reset.", admin),
            )
            .await
        {
            Ok(()) => {
                self.executor
                    .schedule_delete(notice, self.executor.config().command_reply_ttl());
            }
            Err(e) => tracing::warn!(chat_id, error = %e, "Failed to edit mute notice"),
        }
        self.answer(callback, "User unmuted.", false).await;

        self.executor
            .send_log(format!(
                "📝 {} unmuted user {} in chat {}",
                admin, request.user_id, chat_id
            ))
            .await;

        CommandOutcome::Handled
    }

    async fn answer(&self, callback: &CallbackAction, text: &str, show_alert: bool) {
        if let Err(e) = self
            .platform
            .answer_callback(&callback.id, text, show_alert)
            .await
        {
            tracing::warn!(error = %e, "Failed to answer callback");
        }
    }

    async fn reply(&self, message: &IncomingMessage, text: impl Into<String>) {
        self.executor
            .send(OutgoingMessage::new(message.chat.id, text).reply_to(message.message_id))
            .await;
    }

    /// Self-deleting confirmation plus an audit entry in the log channel.
    async fn confirm(&self, message: &IncomingMessage, text: String, audit: String) {
        self.executor
            .send_transient(
                OutgoingMessage::new(message.chat.id, text).reply_to(message.message_id),
                self.executor.config().command_reply_ttl(),
            )
            .await;

        let chat = message.chat.title.as_deref().unwrap_or("unknown chat");
        self.executor
            .send_log(format!(
                "📝 {} {} in {}",
                message.sender.mention(),
                audit,
                chat
            ))
            .await;
    }

    async fn database_error(&self, message: &IncomingMessage, error: &PolicyError) {
        tracing::error!(chat_id = message.chat.id, error = %error, "Admin command failed");
        self.reply(message, format!("❌ Database Error: {}", error))
            .await;
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
