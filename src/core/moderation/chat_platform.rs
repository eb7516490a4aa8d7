// Chat platform port - the calls moderation makes against the messaging service.
//
// The telegram layer implements this over teloxide. Core code only ever sees
// these results, never transport errors.

use super::moderation_models::{
    MemberPermissions, MemberStatus, MessageRef, OutgoingMessage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform call failed: {0}")]
    CallFailed(String),

    /// The target (message, member) no longer exists.
    #[error("Target not found")]
    NotFound,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn get_chat_member(&self, chat_id: i64, user_id: u64)
        -> Result<MemberStatus, PlatformError>;

    /// Look up a member by `@handle` (without the `@`).
    async fn find_member_by_handle(
        &self,
        chat_id: i64,
        handle: &str,
    ) -> Result<MemberStatus, PlatformError>;

    async fn delete_message(&self, message: MessageRef) -> Result<(), PlatformError>;

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: MemberPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), PlatformError>;

    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageRef, PlatformError>;

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), PlatformError>;

    /// Answer an inline-button press. `show_alert` pops a dialog instead of a toast.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), PlatformError>;
}
