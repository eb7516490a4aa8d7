// ChatPlatform implementation over the Telegram Bot API.
//
// The Bot API cannot look a member up by @handle, so the adapter keeps a
// directory of handles it has seen in each chat and resolves through that.
// Handles it has never seen come back as Unknown, not as non-members.

use crate::core::moderation::{
    ChatPlatform, MemberPermissions, MemberStatus, MessageRef, OutgoingMessage, PlatformError,
    UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{
    ChatMemberKind, ChatPermissions, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ReplyParameters,
};
use teloxide::{ApiError, RequestError};

pub struct TelegramPlatform {
    bot: Bot,
    /// Maps (chat_id, lower-cased username) -> user id
    handles: DashMap<(i64, String), u64>,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            handles: DashMap::new(),
        }
    }

    /// Record a user seen in `chat_id` so later @mentions of them resolve.
    pub fn remember_user(&self, chat_id: i64, user: &UserRef) {
        if let Some(username) = &user.username {
            self.handles
                .insert((chat_id, username.to_lowercase()), user.id);
        }
    }

    pub fn known_handles(&self) -> usize {
        self.handles.len()
    }
}

fn map_error(e: RequestError) -> PlatformError {
    match e {
        RequestError::Api(
            ApiError::MessageToDeleteNotFound
            | ApiError::MessageToEditNotFound
            | ApiError::UserNotFound
            | ApiError::ChatNotFound,
        ) => PlatformError::NotFound,
        RequestError::Api(
            api @ (ApiError::NotEnoughRightsToRestrict | ApiError::MessageCantBeDeleted),
        ) => PlatformError::PermissionDenied(api.to_string()),
        other => PlatformError::CallFailed(other.to_string()),
    }
}

fn member_status(kind: &ChatMemberKind) -> MemberStatus {
    if kind.is_owner() {
        MemberStatus::Owner
    } else if kind.is_administrator() {
        MemberStatus::Administrator
    } else if kind.is_member() {
        MemberStatus::Member
    } else if kind.is_restricted() {
        MemberStatus::Restricted
    } else if kind.is_left() {
        MemberStatus::Left
    } else {
        MemberStatus::Banned
    }
}

fn permissions(permissions: MemberPermissions) -> ChatPermissions {
    match permissions {
        MemberPermissions::Muted => ChatPermissions::empty(),
        MemberPermissions::Default => ChatPermissions::all()
            .difference(ChatPermissions::CHANGE_INFO | ChatPermissions::PIN_MESSAGES),
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn get_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<MemberStatus, PlatformError> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .map_err(map_error)?;
        Ok(member_status(&member.kind))
    }

    async fn find_member_by_handle(
        &self,
        chat_id: i64,
        handle: &str,
    ) -> Result<MemberStatus, PlatformError> {
        let user_id = match self.handles.get(&(chat_id, handle.to_lowercase())) {
            Some(entry) => *entry,
            None => return Ok(MemberStatus::Unknown),
        };

        match self.get_chat_member(chat_id, user_id).await {
            Err(PlatformError::NotFound) => Ok(MemberStatus::NotFound),
            other => other,
        }
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), PlatformError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        perms: MemberPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), PlatformError> {
        let mut request =
            self.bot
                .restrict_chat_member(ChatId(chat_id), UserId(user_id), permissions(perms));
        if let Some(until) = until {
            request = request.until_date(until);
        }
        request.await.map_err(map_error)?;
        Ok(())
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageRef, PlatformError> {
        let mut request = self.bot.send_message(ChatId(message.chat_id), message.text);
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }
        if let Some(button) = message.button {
            request = request.reply_markup(InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback(button.label, button.callback_data),
            ]]));
        }

        let sent = request.await.map_err(map_error)?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), PlatformError> {
        self.bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), PlatformError> {
        self.bot
            .answer_callback_query(callback_id)
            .text(text)
            .show_alert(show_alert)
            .await
            .map_err(map_error)?;
        Ok(())
    }
}
