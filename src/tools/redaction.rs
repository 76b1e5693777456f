//! Scrubbing of credentials and wallet secrets from tool parameters before
//! they reach the logs, and bounding of remote response bodies quoted in
//! logs and error messages.

use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";

/// Keys whose values are always hidden, compared case-insensitively.
const SECRET_KEYS: &[&str] = &[
    "authorization",
    "x-api-key",
    "api_key",
    "apikey",
    "pinata_api_key",
    "pinata_secret_api_key",
    "privatekey",
    "private_key",
    "mnemonic",
    "seed",
    "seedphrase",
    "seed_phrase",
    "password",
];

/// Fragments that mark a key as sensitive wherever they appear in it.
const SECRET_FRAGMENTS: &[&str] = &["secret", "token", "password", "credential"];

fn is_secret_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SECRET_KEYS.contains(&lower.as_str()) || SECRET_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// A bare 32-byte hex string (`0x` + 64 hex digits) is how wallet private
/// keys travel. Transaction hashes share the shape, so they are hidden too.
fn looks_like_private_key(value: &str) -> bool {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

fn scrub(value: &mut Value) {
    match value {
        Value::Object(map) => scrub_object(map),
        Value::Array(items) => items.iter_mut().for_each(scrub),
        Value::String(s) if looks_like_private_key(s) => *s = REDACTED.to_string(),
        _ => {}
    }
}

fn scrub_object(map: &mut Map<String, Value>) {
    for (key, val) in map.iter_mut() {
        if is_secret_key(key) {
            *val = Value::String(REDACTED.to_string());
        } else {
            scrub(val);
        }
    }
}

/// Copy of `value` with secrets replaced by `[REDACTED]`.
pub fn redact_sensitive_json(value: &Value) -> Value {
    let mut cloned = value.clone();
    scrub(&mut cloned);
    cloned
}

/// Cut `text` to at most `limit` bytes on a char boundary, noting the
/// original size when anything was dropped.
pub fn truncate_body(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} bytes total]", &text[..end], text.len())
}

#[cfg(test)]
mod tests {
    use super::{redact_sensitive_json, truncate_body};

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(10);
        let out = truncate_body(&long, 5);
        assert_eq!(out, "éé... [truncated, 20 bytes total]");
        assert_eq!(truncate_body("short", 5), "short");
    }

    #[test]
    fn hides_wallet_secrets() {
        let input = serde_json::json!({
            "to": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
            "privateKey": "abc",
            "mnemonic": "test test test",
            "value": "0.1"
        });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["privateKey"], "[REDACTED]");
        assert_eq!(out["mnemonic"], "[REDACTED]");
        assert_eq!(out["to"], "0x742d35Cc6634C0532925a3b844Bc454e4438f44e");
        assert_eq!(out["value"], "0.1");
    }

    #[test]
    fn hides_raw_hex_keys_anywhere() {
        let key = format!("0x{}", "ab".repeat(32));
        let input = serde_json::json!({ "args": [key, "plain"] });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["args"][0], "[REDACTED]");
        assert_eq!(out["args"][1], "plain");
    }

    #[test]
    fn hides_nested_credentials() {
        let input = serde_json::json!({
            "headers": {"pinata_secret_api_key": "s", "Accept": "*/*"},
            "auth": [{"accessToken": "t"}]
        });
        let out = redact_sensitive_json(&input);
        assert_eq!(out["headers"]["pinata_secret_api_key"], "[REDACTED]");
        assert_eq!(out["headers"]["Accept"], "*/*");
        assert_eq!(out["auth"][0]["accessToken"], "[REDACTED]");
    }
}
