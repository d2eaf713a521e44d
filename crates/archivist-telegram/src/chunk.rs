// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting notices to fit the Bot API message limit.

/// Longest text the Bot API accepts in one message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Splits `text` into pieces of at most `limit` characters, preferring to
/// break after a newline. Never splits inside a character.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        // Byte offset just past the `limit`-th character.
        let hard = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(i, _)| i);
        if hard == rest.len() {
            parts.push(rest.to_string());
            break;
        }
        let cut = rest[..hard]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(hard);
        parts.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn prefers_line_breaks() {
        let parts = split_message("aaaa\nbbbb\ncc", 6);
        assert_eq!(parts, vec!["aaaa\n", "bbbb\n", "cc"]);
    }

    #[test]
    fn hard_splits_long_lines() {
        let parts = split_message("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "🔔".repeat(5);
        let parts = split_message(&text, 2);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.concat(), text);
    }
}
