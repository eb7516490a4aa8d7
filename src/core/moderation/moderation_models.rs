// Moderation domain models - data structures for the link guard.
//
// These are pure domain types with no Telegram dependencies.
// The telegram layer converts updates into these and the executor
// converts decisions back into platform calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Handles that never count as "external" mentions.
pub const RESERVED_MENTIONS: [&str; 4] = ["everyone", "all", "admin", "admins"];

/// A chat the bot is moderating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRef {
    pub id: i64,
    pub title: Option<String>,
    pub is_private: bool,
}

/// A human user as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: String,
}

impl UserRef {
    /// How the user is addressed in notices. Plain text, no markup.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.first_name.clone(),
        }
    }
}

/// Who authored a message.
///
/// Telegram lets admins post "as the group", in which case there is no
/// user behind the message, only the chat it was sent on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderIdentity {
    RegularUser(UserRef),
    SenderChat { chat_id: i64 },
}

impl SenderIdentity {
    /// An anonymous admin posts on behalf of the chat itself.
    pub fn is_anonymous_admin_of(&self, chat_id: i64) -> bool {
        matches!(self, SenderIdentity::SenderChat { chat_id: sender } if *sender == chat_id)
    }

    pub fn user(&self) -> Option<&UserRef> {
        match self {
            SenderIdentity::RegularUser(user) => Some(user),
            SenderIdentity::SenderChat { .. } => None,
        }
    }

    pub fn mention(&self) -> String {
        match self {
            SenderIdentity::RegularUser(user) => user.mention(),
            SenderIdentity::SenderChat { chat_id } => format!("chat {}", chat_id),
        }
    }
}

/// Entity kinds the engine cares about. Everything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Url,
    TextLink,
    Mention,
    Other,
}

/// A formatting entity. Offsets and lengths are in UTF-16 code units,
/// the way Telegram reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntity {
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
}

/// Reference to a message that can later be deleted or edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// An inbound group message, reduced to the fields moderation uses.
/// For media messages `text` and `entities` carry the caption.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat: ChatRef,
    pub message_id: i32,
    pub sender: SenderIdentity,
    pub text: String,
    pub entities: Vec<MessageEntity>,
    /// Author of the message this one replies to, if any.
    pub reply_to: Option<UserRef>,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }
}

/// An inline-button press on one of the bot's messages.
#[derive(Debug, Clone)]
pub struct CallbackAction {
    pub id: String,
    pub from: UserRef,
    pub data: String,
    /// The bot message carrying the button. Missing when Telegram no longer
    /// has it available.
    pub message: Option<MessageRef>,
}

/// Why a message was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    BannedWord { word: String },
    ExcessMentions { count: usize },
    ExternalMention { handle: String },
    Link,
}

impl Violation {
    pub fn reason(&self) -> &'static str {
        match self {
            Violation::BannedWord { .. } => "banned word",
            Violation::ExcessMentions { .. } => "too many mentions",
            Violation::ExternalMention { .. } => "external mention spam",
            Violation::Link => "link",
        }
    }

    /// How long the warning notice stays up. Mention infractions get the
    /// short window, content infractions the long one.
    pub fn notice_ttl(&self, config: &ModerationConfig) -> Duration {
        match self {
            Violation::ExcessMentions { .. } | Violation::ExternalMention { .. } => {
                Duration::from_secs(config.mention_notice_ttl_secs)
            }
            Violation::BannedWord { .. } | Violation::Link => {
                Duration::from_secs(config.content_notice_ttl_secs)
            }
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// What the engine wants done with a message. Produced per message, never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Ignore,
    DeleteSilently {
        violation: Violation,
    },
    DeleteAndWarn {
        violation: Violation,
        count: u32,
        limit: u32,
    },
    DeleteWarnAndMute {
        violation: Violation,
        count: u32,
        limit: u32,
        duration: Duration,
    },
}

impl Decision {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Decision::Ignore => None,
            Decision::DeleteSilently { violation }
            | Decision::DeleteAndWarn { violation, .. }
            | Decision::DeleteWarnAndMute { violation, .. } => Some(violation),
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Decision::Ignore)
    }
}

/// Membership status returned by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
    NotFound,
    /// The platform has no way to resolve the handle right now.
    Unknown,
}

impl MemberStatus {
    pub fn is_admin(self) -> bool {
        matches!(self, MemberStatus::Owner | MemberStatus::Administrator)
    }

    pub fn is_present(self) -> bool {
        matches!(
            self,
            MemberStatus::Owner
                | MemberStatus::Administrator
                | MemberStatus::Member
                | MemberStatus::Restricted
        )
    }
}

/// Permission presets the executor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberPermissions {
    /// Cannot send anything.
    Muted,
    /// Regular member defaults: everything except changing chat info and pinning.
    Default,
}

/// A single inline button attached to a bot message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

/// A message the bot wants to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to: Option<i32>,
    pub button: Option<InlineButton>,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            button: None,
        }
    }

    pub fn reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_button(mut self, button: InlineButton) -> Self {
        self.button = Some(button);
        self
    }
}

/// Tunables for moderation behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Warnings before a mute
    pub warn_limit: u32,
    /// Mute length in seconds
    pub mute_duration_secs: u64,
    /// Maximum mentions allowed in a single message
    pub max_mentions: usize,
    /// Membership cache TTL in seconds
    pub member_cache_ttl_secs: u64,
    /// Warning notice lifetime for mention infractions
    pub mention_notice_ttl_secs: u64,
    /// Warning notice lifetime for link and word infractions
    pub content_notice_ttl_secs: u64,
    /// Lifetime of admin command confirmations
    pub command_reply_ttl_secs: u64,
    /// Chat that receives deletion and audit logs
    pub log_channel_id: Option<i64>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            warn_limit: 3,
            mute_duration_secs: 24 * 60 * 60,
            max_mentions: 5,
            member_cache_ttl_secs: 600,
            mention_notice_ttl_secs: 60,
            content_notice_ttl_secs: 300,
            command_reply_ttl_secs: 300,
            log_channel_id: None,
        }
    }
}

impl ModerationConfig {
    pub fn mute_duration(&self) -> Duration {
        Duration::from_secs(self.mute_duration_secs)
    }

    pub fn command_reply_ttl(&self) -> Duration {
        Duration::from_secs(self.command_reply_ttl_secs)
    }
}
