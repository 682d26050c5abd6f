//! Chunk layout helpers
//!
//! Physical key names, value splitting and the chunk-count encodings.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Result, StoreError};

const KEY_PREFIX: &str = "secure_";

// == Key Layout ==
/// `secure_{key}`: the unchunked value.
pub fn item_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// `secure_{key}_meta`: obfuscated chunk count.
pub fn meta_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}_meta")
}

/// `secure_{key}_chunk_{i}`
pub fn chunk_key(key: &str, index: usize) -> String {
    format!("{KEY_PREFIX}{key}_chunk_{index}")
}

/// `secure_{key}_chunks`: plain-text chunk count written by older releases
/// into the general backend.
pub fn legacy_marker_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}_chunks")
}

// == Splitting ==
/// Splits `value` into slices of at most `max` bytes.
///
/// Splits never land inside a UTF-8 code point, so a slice may come out a few
/// bytes short of `max`. ASCII input yields exactly `ceil(len / max)` slices.
pub fn split_chunks(value: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::with_capacity(value.len() / max.max(1) + 1);
    let mut rest = value;

    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // max is smaller than the next code point
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }

    chunks
}

// == Chunk Count Encoding ==
/// Encodes a chunk count for the meta entry: the decimal string, base64'd.
pub fn encode_chunk_count(count: usize) -> String {
    STANDARD.encode(count.to_string())
}

/// Reverses [`encode_chunk_count`]. A zero count is rejected since meta only
/// exists for chunked values.
pub fn decode_chunk_count(raw: &str) -> Result<usize> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| StoreError::Corrupted(format!("chunk metadata is not base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| StoreError::Corrupted("chunk metadata is not UTF-8".to_string()))?;

    parse_count(&text)
}

/// Parses the plain decimal count found in a legacy marker.
pub fn parse_legacy_count(raw: &str) -> Result<usize> {
    parse_count(raw)
}

fn parse_count(text: &str) -> Result<usize> {
    match text.trim().parse::<usize>() {
        Ok(0) => Err(StoreError::Corrupted("chunk count is zero".to_string())),
        Ok(count) => Ok(count),
        Err(_) => Err(StoreError::Corrupted(format!(
            "chunk count '{}' is not a number",
            text.trim()
        ))),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(item_key("token"), "secure_token");
        assert_eq!(meta_key("token"), "secure_token_meta");
        assert_eq!(chunk_key("token", 3), "secure_token_chunk_3");
        assert_eq!(legacy_marker_key("token"), "secure_token_chunks");
    }

    #[test]
    fn test_split_exact_multiple() {
        let value = "a".repeat(4096);
        let chunks = split_chunks(&value, 2048);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 2048));
    }

    #[test]
    fn test_split_short_tail() {
        let value = "b".repeat(5000);
        let chunks = split_chunks(&value, 2048);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 5000 - 2 * 2048);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_chunks("", 2048).is_empty());
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        // 'é' is two bytes; a 3-byte limit must not cut one in half
        let value = "éééé";
        let chunks = split_chunks(value, 3);
        assert_eq!(chunks, vec!["é", "é", "é", "é"]);
        assert_eq!(chunks.concat(), value);
    }

    #[test]
    fn test_split_limit_below_code_point() {
        let value = "😀x";
        let chunks = split_chunks(value, 1);
        assert_eq!(chunks, vec!["😀", "x"]);
    }

    #[test]
    fn test_count_is_not_cleartext() {
        let encoded = encode_chunk_count(3);
        assert_ne!(encoded, "3");
        assert_eq!(encoded, "Mw==");
        assert_eq!(decode_chunk_count(&encoded).unwrap(), 3);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_chunk_count("%%%"),
            Err(StoreError::Corrupted(_))
        ));
        // valid base64 of "abc"
        assert!(matches!(
            decode_chunk_count("YWJj"),
            Err(StoreError::Corrupted(_))
        ));
        // valid base64 of "0"
        assert!(matches!(
            decode_chunk_count("MA=="),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn test_parse_legacy_count() {
        assert_eq!(parse_legacy_count("2").unwrap(), 2);
        assert_eq!(parse_legacy_count(" 12\n").unwrap(), 12);
        assert!(parse_legacy_count("two").is_err());
    }
}
