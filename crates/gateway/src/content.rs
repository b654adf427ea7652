//! Response shape filtering.

use serde_json::Value;

const BINARY_TYPE_PREFIXES: [&str; 3] = ["image/", "video/", "audio/"];

/// True for content types the gateway refuses to relay.
pub fn is_binary(content_type: &str) -> bool {
    let lower = content_type.trim().to_ascii_lowercase();
    BINARY_TYPE_PREFIXES.iter().any(|p| lower.starts_with(p))
        || lower.starts_with("application/octet-stream")
}

/// Decodes a relayed body: JSON when it parses, otherwise the text itself.
pub fn decode_body(bytes: &[u8]) -> Value {
    let text = String::from_utf8_lossy(bytes);
    serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
}
