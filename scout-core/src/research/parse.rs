//! Parsing of structured model output.
//!
//! Models are asked for JSON but routinely wrap it in code fences or prose.
//! `ModelAnswer` makes the loose contract explicit: callers get either a
//! parsed value or the raw text, and decide locally whether an unparseable
//! answer is a soft failure or grounds for a fallback.

use serde::de::DeserializeOwned;

/// Outcome of parsing a model's structured answer.
#[derive(Debug)]
pub enum ModelAnswer<T> {
    Valid(T),
    Invalid { raw: String },
}

impl<T> ModelAnswer<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ModelAnswer::Valid(value) => Some(value),
            ModelAnswer::Invalid { .. } => None,
        }
    }
}

/// Parse a model answer that should contain a JSON value of type `T`.
///
/// Tries the whole text first, then the content of the first code fence, then
/// the first balanced `{...}` or `[...]` span.
pub fn parse_answer<T: DeserializeOwned>(text: &str) -> ModelAnswer<T> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return ModelAnswer::Valid(value);
    }

    if let Some(fenced) = extract_fenced(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(fenced) {
            return ModelAnswer::Valid(value);
        }
    }

    if let Some(span) = extract_balanced(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(span) {
            return ModelAnswer::Valid(value);
        }
    }

    ModelAnswer::Invalid {
        raw: text.to_string(),
    }
}

/// Content of the first ``` code fence, with an optional language tag.
fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First balanced top-level JSON object or array in the text.
fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = text.as_bytes()[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b if !in_string && *b == open => depth += 1,
            b if !in_string && *b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
