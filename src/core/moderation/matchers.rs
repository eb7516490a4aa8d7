// Pattern matchers - pure functions over message text and entities.

use super::moderation_models::{EntityKind, MessageEntity};
use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://\S+|www\.\S+)").expect("URL pattern is valid"));

/// True if the text contains a literal link or any entity is a link.
///
/// Entity checks matter for masked links, whose target never appears in the text.
pub fn detect_link(text: &str, entities: &[MessageEntity]) -> bool {
    URL_PATTERN.is_match(text)
        || entities
            .iter()
            .any(|e| matches!(e.kind, EntityKind::Url | EntityKind::TextLink))
}

/// Usernames referenced by mention entities, in order of appearance,
/// duplicates preserved, leading `@` stripped.
pub fn extract_mentions(text: &str, entities: &[MessageEntity]) -> Vec<String> {
    let utf16: Vec<u16> = text.encode_utf16().collect();

    entities
        .iter()
        .filter(|e| e.kind == EntityKind::Mention)
        .filter_map(|e| {
            let end = e.offset.checked_add(e.length)?;
            let slice = utf16.get(e.offset..end)?;
            let raw = String::from_utf16_lossy(slice);
            let handle = raw.trim_start_matches('@').to_string();
            (!handle.is_empty()).then_some(handle)
        })
        .collect()
}

/// First blacklist word contained in the text, compared case-insensitively.
/// Iterates `words` in the given order and stops at the first hit.
pub fn contains_blacklisted_word(text: &str, words: &[String]) -> Option<String> {
    let haystack = text.to_lowercase();
    words
        .iter()
        .find(|word| {
            let needle = word.to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
        .cloned()
}
