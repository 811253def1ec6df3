//! Request input validation and sanitization.

/// Maximum length for a product prompt.
pub const MAX_PROMPT_LENGTH: usize = 5_000;

/// Maximum length for a pasted brief or script.
pub const MAX_DOCUMENT_LENGTH: usize = 20_000;

/// Longest animatic a request may ask for.
pub const MAX_ANIMATIC_DURATION_SECS: u32 = 120;

/// Strip control characters, keeping newlines and tabs.
pub fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Validate a required text field: non-empty after sanitization, bounded.
pub fn require_text(field: &str, value: &str, max_len: usize) -> Result<String, String> {
    let text = sanitize_text(value);
    if text.is_empty() {
        return Err(format!("'{field}' must not be empty"));
    }
    if text.len() > max_len {
        return Err(format!("'{field}' exceeds maximum length of {max_len} characters"));
    }
    Ok(text)
}

/// Validate an optional text field; absent and blank both map to `None`.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, String> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let text = sanitize_text(raw);
            if text.is_empty() {
                return Ok(None);
            }
            if text.len() > max_len {
                return Err(format!(
                    "'{field}' exceeds maximum length of {max_len} characters"
                ));
            }
            Ok(Some(text))
        }
    }
}

/// Validate a `W:H` aspect ratio string.
pub fn validate_aspect_ratio(value: &str) -> Result<(), String> {
    let mut parts = value.split(':');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(w), Some(h), None)
            if !w.is_empty() && !h.is_empty()
                && w.chars().all(|c| c.is_ascii_digit())
                && h.chars().all(|c| c.is_ascii_digit())
    );
    if valid {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid aspect ratio (expected W:H)"))
    }
}

/// Validate a requested animatic duration.
pub fn validate_duration_secs(value: u32) -> Result<(), String> {
    if value == 0 || value > MAX_ANIMATIC_DURATION_SECS {
        return Err(format!(
            "duration_seconds must be between 1 and {MAX_ANIMATIC_DURATION_SECS}"
        ));
    }
    Ok(())
}
