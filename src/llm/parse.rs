//! Defensive extraction of structured JSON from model output
//!
//! Model responses are untrusted free text even in JSON mode. Every parse
//! walks the same ladder: strict parse, then markdown-fence stripping, then
//! first-`{`-to-last-`}` extraction, then mechanical repair, then a clean
//! failure with a preview of what was received.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

/// Strip markdown code fences from a response.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if trimmed.starts_with("```json") {
        trimmed.strip_prefix("```json").unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed.strip_prefix("```").unwrap_or(trimmed)
    } else {
        trimmed
    };
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// Extract the outermost fragment between `open` and `close`.
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Repair the JSON defects models actually produce: trailing commas, smart
/// quotes, stray control characters.
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    fixed = fixed.replace('\u{201C}', "\"");
    fixed = fixed.replace('\u{201D}', "\"");
    fixed = fixed.replace('\u{2018}', "'");
    fixed = fixed.replace('\u{2019}', "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Parse a JSON object of type `T` out of raw model output.
///
/// `context_hint` names the call site in diagnostics ("fix generation",
/// "code review").
pub fn parse_structured<T: DeserializeOwned>(response: &str, context_hint: &str) -> Result<T> {
    // Strict parse first: in JSON mode this is the common case.
    if let Ok(parsed) = serde_json::from_str::<T>(response.trim()) {
        return Ok(parsed);
    }

    let unfenced = strip_markdown_fences(response);
    if let Ok(parsed) = serde_json::from_str::<T>(unfenced) {
        return Ok(parsed);
    }

    let fragment = extract_json_fragment(unfenced, '{', '}')
        .ok_or_else(|| anyhow!("no JSON object found in {context_hint} response"))?;

    match serde_json::from_str::<T>(fragment) {
        Ok(parsed) => Ok(parsed),
        Err(initial_error) => {
            let repaired = fix_json_issues(fragment);
            serde_json::from_str::<T>(&repaired).map_err(|_| {
                anyhow!(
                    "{} response was not parseable ({}). Preview: {}",
                    context_hint,
                    initial_error,
                    truncate_str(fragment, 200)
                )
            })
        }
    }
}

/// Truncate a string for diagnostics (Unicode-safe).
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    if s.chars().count() <= max_chars {
        s
    } else {
        let byte_idx = s
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        &s[..byte_idx]
    }
}

/// Truncate long text for prompt safety, keeping beginning and end.
pub fn truncate_middle(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars / 2).collect();
        let tail_rev: String = content.chars().rev().take(max_chars / 2).collect();
        let tail: String = tail_rev.chars().rev().collect();
        format!("{}\n\n... [truncated] ...\n\n{}", head, tail)
    }
}
