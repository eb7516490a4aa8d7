// Test double for the chat platform: answers lookups from preset tables and
// records every side-effecting call so tests can assert on them.

use super::chat_platform::{ChatPlatform, PlatformError};
use super::moderation_models::{
    MemberPermissions, MemberStatus, MessageRef, OutgoingMessage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Delete(MessageRef),
    Restrict {
        chat_id: i64,
        user_id: u64,
        permissions: MemberPermissions,
        timed: bool,
    },
    Send(OutgoingMessage),
    Edit(MessageRef, String),
    Answer {
        text: String,
        show_alert: bool,
    },
}

pub struct RecordingPlatform {
    members: DashMap<(i64, u64), MemberStatus>,
    handles: DashMap<(i64, String), MemberStatus>,
    calls: Mutex<Vec<PlatformCall>>,
    lookups_fail: AtomicBool,
    deletes_fail: AtomicBool,
    restricts_fail: AtomicBool,
    handle_lookups: AtomicUsize,
    next_message_id: AtomicI32,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            handles: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            lookups_fail: AtomicBool::new(false),
            deletes_fail: AtomicBool::new(false),
            restricts_fail: AtomicBool::new(false),
            handle_lookups: AtomicUsize::new(0),
            next_message_id: AtomicI32::new(1000),
        }
    }

    pub fn set_member(&self, chat_id: i64, user_id: u64, status: MemberStatus) {
        self.members.insert((chat_id, user_id), status);
    }

    pub fn set_handle(&self, chat_id: i64, handle: &str, status: MemberStatus) {
        self.handles.insert((chat_id, handle.to_lowercase()), status);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.lookups_fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.deletes_fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_restricts(&self, fail: bool) {
        self.restricts_fail.store(fail, Ordering::SeqCst);
    }

    pub fn handle_lookups(&self) -> usize {
        self.handle_lookups.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Delete(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn get_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<MemberStatus, PlatformError> {
        if self.lookups_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::CallFailed("lookup unavailable".to_string()));
        }
        Ok(self
            .members
            .get(&(chat_id, user_id))
            .map(|status| *status)
            .unwrap_or(MemberStatus::Member))
    }

    async fn find_member_by_handle(
        &self,
        chat_id: i64,
        handle: &str,
    ) -> Result<MemberStatus, PlatformError> {
        self.handle_lookups.fetch_add(1, Ordering::SeqCst);
        if self.lookups_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::CallFailed("lookup unavailable".to_string()));
        }
        Ok(self
            .handles
            .get(&(chat_id, handle.to_lowercase()))
            .map(|status| *status)
            .unwrap_or(MemberStatus::NotFound))
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), PlatformError> {
        self.record(PlatformCall::Delete(message));
        if self.deletes_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied(
                "not enough rights to delete".to_string(),
            ));
        }
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: MemberPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Restrict {
            chat_id,
            user_id,
            permissions,
            timed: until.is_some(),
        });
        if self.restricts_fail.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied(
                "not enough rights to restrict".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageRef, PlatformError> {
        let chat_id = message.chat_id;
        self.record(PlatformCall::Send(message));
        Ok(MessageRef {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::Edit(message, text.to_string()));
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Answer {
            text: text.to_string(),
            show_alert,
        });
        Ok(())
    }
}
