// Action executor - turns moderation decisions into platform calls.
//
// Every platform call here is best-effort: failures are logged and reported
// in the returned ActionReport, never propagated. A failure on one message
// must not affect the next one.

use super::admin_commands::UnmuteRequest;
use super::chat_platform::{ChatPlatform, PlatformError};
use super::moderation_models::{
    Decision, IncomingMessage, InlineButton, MemberPermissions, MessageRef, ModerationConfig,
    OutgoingMessage, Violation,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Log entries are truncated to this many characters of message content.
const LOG_CONTENT_LIMIT: usize = 1000;

/// Which side effects of a decision actually happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub deleted: bool,
    pub logged: bool,
    pub notified: bool,
    /// `None` when no mute was requested.
    pub muted: Option<bool>,
}

pub struct ActionExecutor {
    platform: Arc<dyn ChatPlatform>,
    config: ModerationConfig,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn ChatPlatform>, config: ModerationConfig) -> Self {
        Self { platform, config }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Carry out a decision for `message`.
    pub async fn apply(&self, message: &IncomingMessage, decision: &Decision) -> ActionReport {
        let mut report = ActionReport::default();
        let Some(violation) = decision.violation() else {
            return report;
        };

        if let Err(e) = self.platform.delete_message(message.message_ref()).await {
            // Without delete rights there is no point warning anyone.
            tracing::warn!(
                chat_id = message.chat.id,
                message_id = message.message_id,
                reason = violation.reason(),
                error = %e,
                "Failed to delete message"
            );
            return report;
        }
        report.deleted = true;
        report.logged = self.log_deletion(message, violation).await;

        let chat_id = message.chat.id;
        let mention = message.sender.mention();

        match decision {
            Decision::Ignore => {}

            Decision::DeleteSilently { violation } => {
                if let Violation::ExcessMentions { .. } = violation {
                    let text = format!(
                        "⚠️ {}, too many mentions! A message may mention at most {} people.",
                        mention, self.config.max_mentions
                    );
                    report.notified = self
                        .send_transient(
                            OutgoingMessage::new(chat_id, text),
                            violation.notice_ttl(&self.config),
                        )
                        .await;
                }
            }

            Decision::DeleteAndWarn {
                violation,
                count,
                limit,
            } => {
                let text = format!(
                    "⚠️ {}, {}! (Warning {}/{})",
                    mention,
                    offense_phrase(violation),
                    count,
                    limit
                );
                report.notified = self
                    .send_transient(
                        OutgoingMessage::new(chat_id, text),
                        violation.notice_ttl(&self.config),
                    )
                    .await;
            }

            Decision::DeleteWarnAndMute {
                violation,
                count,
                limit,
                duration,
            } => {
                let Some(user) = message.sender.user() else {
                    return report;
                };

                let until = chrono::Duration::from_std(*duration)
                    .ok()
                    .map(|d| Utc::now() + d);

                match self
                    .platform
                    .restrict_member(chat_id, user.id, MemberPermissions::Muted, until)
                    .await
                {
                    Ok(()) => {
                        report.muted = Some(true);
                        let text = format!(
                            "🚫 {} has been muted for {} due to {}.",
                            mention,
                            format_duration(*duration),
                            mute_cause(violation)
                        );
                        let button = InlineButton {
                            label: "🔓 Unmute (Admin Only)".to_string(),
                            callback_data: UnmuteRequest::callback_data(user.id),
                        };
                        report.notified = self
                            .send(OutgoingMessage::new(chat_id, text).with_button(button))
                            .await
                            .is_some();
                    }
                    Err(e) => {
                        report.muted = Some(false);
                        tracing::error!(chat_id, user_id = user.id, error = %e, "Failed to mute user");
                        let text = format!(
                            "⚠️ {}, {}! (Warning {}/{})\nI tried to mute you but failed: {}",
                            mention,
                            offense_phrase(violation),
                            count,
                            limit,
                            e
                        );
                        report.notified = self
                            .send(OutgoingMessage::new(chat_id, text))
                            .await
                            .is_some();
                    }
                }
            }
        }

        report
    }

    /// Send a message, logging instead of failing.
    pub async fn send(&self, message: OutgoingMessage) -> Option<MessageRef> {
        let chat_id = message.chat_id;
        match self.platform.send_message(message).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "Failed to send message");
                None
            }
        }
    }

    /// Send a message that deletes itself after `ttl`.
    pub async fn send_transient(&self, message: OutgoingMessage, ttl: Duration) -> bool {
        match self.send(message).await {
            Some(sent) => {
                self.schedule_delete(sent, ttl);
                true
            }
            None => false,
        }
    }

    /// Post to the log channel, if one is configured.
    pub async fn send_log(&self, text: impl Into<String>) -> bool {
        let Some(log_channel_id) = self.config.log_channel_id else {
            return false;
        };
        self.send(OutgoingMessage::new(log_channel_id, text))
            .await
            .is_some()
    }

    /// Delete `message` after `delay` without blocking the caller.
    /// A message that is already gone is not an error.
    pub fn schedule_delete(&self, message: MessageRef, delay: Duration) -> JoinHandle<()> {
        let platform = Arc::clone(&self.platform);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match platform.delete_message(message).await {
                Ok(()) | Err(PlatformError::NotFound) => {}
                Err(e) => tracing::debug!(
                    chat_id = message.chat_id,
                    message_id = message.message_id,
                    error = %e,
                    "Scheduled delete failed"
                ),
            }
        })
    }

    async fn log_deletion(&self, message: &IncomingMessage, violation: &Violation) -> bool {
        if self.config.log_channel_id.is_none() {
            return false;
        }

        let user_id = message
            .sender
            .user()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let content: String = message.text.chars().take(LOG_CONTENT_LIMIT).collect();
        let text = format!(
            "🗑 Message Deleted ({})\nUser: {} ({})\nChat: {}\nContent: {}",
            violation.reason(),
            message.sender.mention(),
            user_id,
            message.chat.title.as_deref().unwrap_or("unknown"),
            content
        );

        self.send_log(text).await
    }
}

fn offense_phrase(violation: &Violation) -> &'static str {
    match violation {
        Violation::BannedWord { .. } => "that word is not allowed here",
        Violation::ExcessMentions { .. } => "too many mentions",
        Violation::ExternalMention { .. } => "mentioning people outside this group is not allowed",
        Violation::Link => "links are not allowed",
    }
}

fn mute_cause(violation: &Violation) -> &'static str {
    match violation {
        Violation::BannedWord { .. } => "repeated banned words",
        Violation::ExcessMentions { .. } | Violation::ExternalMention { .. } => "mention spam",
        Violation::Link => "excessive links",
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}m", secs / 60)
    }
}
