//! Retained Topics: normalization and segment rules shared by trie and store

pub const TOPIC_DELIMITER: char = '/';
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Canonical form used for every map key and trie traversal.
/// A topic without any delimiter gets one appended ("sensors" -> "sensors/").
pub fn normalize_topic(topic: &str) -> String {
    let trimmed = topic.trim();
    if trimmed.contains(TOPIC_DELIMITER) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, TOPIC_DELIMITER)
    }
}

/// Namespace key: first segment of the normalized topic.
pub fn namespace_of(topic: &str) -> String {
    let normalized = normalize_topic(topic);
    normalized
        .split(TOPIC_DELIMITER)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Splits on every delimiter, empty segments included.
pub fn segments(topic: &str) -> Vec<&str> {
    topic.split(TOPIC_DELIMITER).collect()
}
