pub mod redact;
pub mod sanitize;
pub mod urlcheck;

pub use redact::redact_meta;
pub use sanitize::{escape_cell, sanitize_text, validate_id, DEFAULT_MAX_TEXT_LEN};
pub use urlcheck::{is_url, MAX_URL_LEN};
