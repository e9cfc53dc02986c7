//! Lenient decoding of model output that is supposed to be JSON.

use std::env;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub const DEBUG_ENV: &str = "LISTING_GUARD_DEBUG";

/// Decode a model reply, tolerating code fences, raw newlines inside strings,
/// truncated objects and JSON5 syntax.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let payload = extract_json_payload(raw);
    if let Ok(value) = serde_json::from_str::<T>(&payload) {
        return Ok(value);
    }

    let sanitized = sanitize_json_strings(&payload);
    if sanitized != payload {
        if let Ok(value) = serde_json::from_str::<T>(&sanitized) {
            return Ok(value);
        }
    }

    let value: serde_json::Value = json5::from_str(&sanitized).map_err(|err| {
        debug_log_payload(raw);
        anyhow::anyhow!("model output is not valid JSON: {err}")
    })?;
    serde_json::from_value(value).context("model output did not match the expected schema")
}

pub(crate) fn extract_json_payload(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(stripped) = strip_code_fence(trimmed) {
        return stripped;
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start > 0 && end > start => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

fn strip_code_fence(input: &str) -> Option<String> {
    let mut trimmed = input.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    trimmed = trimmed.trim_start_matches("```");
    trimmed = trimmed.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if let Some(rest) = trimmed.strip_prefix("json") {
        trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    }
    let end = trimmed.rfind("```").unwrap_or(trimmed.len());
    Some(trimmed[..end].trim().to_string())
}

/// Escape raw newlines inside string literals and close anything left open.
pub(crate) fn sanitize_json_strings(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escape = false;

    for ch in payload.chars() {
        if !in_string {
            result.push(ch);
            in_string = ch == '"';
            continue;
        }
        if escape {
            result.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                result.push(ch);
                escape = true;
            }
            '"' => {
                result.push(ch);
                in_string = false;
            }
            '\n' => result.push_str("\\n"),
            '\r' => {}
            _ => result.push(ch),
        }
    }

    if in_string {
        result.push('"');
    }

    let count = |needle: char| result.chars().filter(|&c| c == needle).count();
    let missing_brackets = count('[').saturating_sub(count(']'));
    let missing_braces = count('{').saturating_sub(count('}'));
    result.extend(std::iter::repeat(']').take(missing_brackets));
    result.extend(std::iter::repeat('}').take(missing_braces));
    result
}

pub(crate) fn debug_log_payload(payload: &str) {
    if debug_enabled() {
        tracing::warn!(payload, "raw model payload");
    }
}

fn debug_enabled() -> bool {
    matches!(env::var(DEBUG_ENV), Ok(val) if !val.is_empty() && val != "0")
}

pub(crate) fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}
