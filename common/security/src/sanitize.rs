//! Input sanitization for user-supplied text destined for storage or HTML-free
//! rendering. The cleaners are deliberately destructive: anything that looks
//! like markup, a script scheme or an escape-sequence leader is removed rather
//! than encoded.

pub const DEFAULT_MAX_TEXT_LEN: usize = 1000;

const MAX_ID_LEN: usize = 100;

/// Scheme/attribute fragments removed case-insensitively from sanitized text.
const BANNED_FRAGMENTS: &[&str] = &["javascript:", "data:", "vbscript:", "\\x", "\\u"];

/// Sanitize a free-text field.
///
/// Strips control characters and zero-width code points, removes the HTML
/// metacharacters `< > " ' \` &`, strips script-scheme and `on*=` handler
/// fragments, trims surrounding whitespace and truncates to `max_len`
/// characters. Removal loops until the text is stable so fragments cannot be
/// reassembled from their own debris.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let mut out: String = input
        .chars()
        .filter(|c| !c.is_control() && !is_zero_width(*c))
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`' | '&'))
        .collect();

    loop {
        let before = out.len();
        for fragment in BANNED_FRAGMENTS {
            out = remove_fragment_ci(&out, fragment);
        }
        out = remove_event_handlers(&out);
        if out.len() == before {
            break;
        }
    }

    let trimmed = out.trim();
    trimmed.chars().take(max_len).collect()
}

/// Validate an opaque identifier: 1..=100 characters from `[A-Za-z0-9_-]`.
pub fn validate_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Escape a value bound for a spreadsheet cell. Values starting with `=`, `+`,
/// `-` or `@` are interpreted as formulas by spreadsheet engines; a leading
/// apostrophe forces them back to literal text.
pub fn escape_cell(value: &str) -> String {
    match value.chars().next() {
        Some('=') | Some('+') | Some('-') | Some('@') => format!("'{value}"),
        _ => value.to_string(),
    }
}

fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

/// Remove every case-insensitive occurrence of `fragment` from `text`.
/// ASCII lowercasing keeps byte offsets aligned with the original.
fn remove_fragment_ci(text: &str, fragment: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let needle = fragment.to_ascii_lowercase();
    if !lower.contains(&needle) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut rest_lower = lower.as_str();
    while let Some(pos) = rest_lower.find(&needle) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
        rest_lower = &rest_lower[pos + needle.len()..];
    }
    out.push_str(rest);
    out
}

/// Remove `on<word>=` inline-handler fragments (`onclick=`, `onload=`, ...).
fn remove_event_handlers(text: &str) -> String {
    let bytes = text.as_bytes();
    let lower = text.to_ascii_lowercase();
    let lower_bytes = lower.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if lower_bytes[i..].starts_with(b"on") {
            let mut j = i + 2;
            while j < bytes.len() && lower_bytes[j].is_ascii_alphanumeric() {
                j += 1;
            }
            if j > i + 2 && j < bytes.len() && bytes[j] == b'=' {
                i = j + 1;
                continue;
            }
        }
        // Safe: we only advance on ASCII matches, so `i` stays on a char boundary.
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}
