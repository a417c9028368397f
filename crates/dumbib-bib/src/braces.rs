use crate::FieldError;

/// Return the text strictly inside the first `{...}` group of `text`,
/// skipping over nested brace pairs.
///
/// ```
/// use dumbib_bib::extract_text_in_braces;
/// assert_eq!(extract_text_in_braces("prefix{a{b}c}suffix").unwrap(), "a{b}c");
/// ```
pub fn extract_text_in_braces(text: &str) -> Result<&str, FieldError> {
    let open = text
        .find('{')
        .ok_or_else(|| FieldError::MalformedBraces("no opening brace".to_string()))?;
    let inner = &text[open + 1..];

    let mut depth = 1usize;
    for (i, ch) in inner.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&inner[..i]);
                }
            }
            _ => {}
        }
    }

    Err(FieldError::MalformedBraces(format!(
        "{} unclosed brace(s) after '{}'",
        depth,
        snippet(&text[open..])
    )))
}

/// First few characters of `text`, for error messages.
fn snippet(text: &str) -> String {
    const MAX: usize = 40;
    let mut s: String = text.chars().take(MAX).collect();
    if text.chars().count() > MAX {
        s.push_str("...");
    }
    s
}
