// Conversions from teloxide update types into the core moderation models.

use crate::core::moderation::{
    CallbackAction, ChatRef, EntityKind, IncomingMessage, MessageEntity, MessageRef,
    SenderIdentity, UserRef,
};
use teloxide::types::{CallbackQuery, Message, MessageEntityKind, User};

pub fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
    }
}

fn entity(entity: &teloxide::types::MessageEntity) -> MessageEntity {
    let kind = match entity.kind {
        MessageEntityKind::Url => EntityKind::Url,
        MessageEntityKind::TextLink { .. } => EntityKind::TextLink,
        MessageEntityKind::Mention => EntityKind::Mention,
        _ => EntityKind::Other,
    };
    MessageEntity {
        kind,
        offset: entity.offset,
        length: entity.length,
    }
}

/// Reduce a Telegram message to what moderation needs.
///
/// Media captions stand in for text. Returns None for messages with neither,
/// or with no identifiable sender.
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let (text, entities) = match msg.text() {
        Some(text) => (text, msg.entities()),
        None => (msg.caption()?, msg.caption_entities()),
    };

    let sender = match (&msg.sender_chat, &msg.from) {
        (Some(chat), _) => SenderIdentity::SenderChat { chat_id: chat.id.0 },
        (None, Some(user)) => SenderIdentity::RegularUser(user_ref(user)),
        (None, None) => return None,
    };

    Some(IncomingMessage {
        chat: ChatRef {
            id: msg.chat.id.0,
            title: msg.chat.title().map(str::to_string),
            is_private: msg.chat.is_private(),
        },
        message_id: msg.id.0,
        sender,
        text: text.to_string(),
        entities: entities
            .map(|list| list.iter().map(entity).collect())
            .unwrap_or_default(),
        reply_to: msg
            .reply_to_message()
            .and_then(|reply| reply.from.as_ref())
            .map(user_ref),
    })
}

/// Users a message reveals beyond its sender: new members and
/// text-mention targets. Fed into the handle directory.
pub fn observed_users(msg: &Message) -> Vec<UserRef> {
    let mut users: Vec<UserRef> = msg
        .new_chat_members()
        .map(|members| members.iter().map(user_ref).collect())
        .unwrap_or_default();

    let entities = msg.entities().or(msg.caption_entities()).unwrap_or_default();
    users.extend(entities.iter().filter_map(|entity| match &entity.kind {
        MessageEntityKind::TextMention { user } => Some(user_ref(user)),
        _ => None,
    }));
    users
}

pub fn callback_action(query: &CallbackQuery) -> Option<CallbackAction> {
    Some(CallbackAction {
        id: query.id.to_string(),
        from: user_ref(&query.from),
        data: query.data.clone()?,
        message: query.message.as_ref().map(|message| MessageRef {
            chat_id: message.chat().id.0,
            message_id: message.id().0,
        }),
    })
}
