// The core module contains all business logic.
// Platform and storage details stay behind the traits defined here.

#[path = "moderation/mod.rs"]
pub mod moderation;
