// Core moderation module - link guard business logic.
// Following the same pattern as the other feature modules.

pub mod action_executor;
pub mod admin_commands;
pub mod chat_platform;
pub mod matchers;
pub mod member_cache;
pub mod moderation_models;
pub mod moderation_service;
pub mod policy_store;

#[cfg(test)]
pub mod testing;

pub use action_executor::*;
pub use admin_commands::*;
pub use chat_platform::*;
pub use member_cache::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use policy_store::*;
