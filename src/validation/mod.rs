//! Response body checks: structural queries and content regexes.

pub mod content;
pub mod structural;

pub use content::validate_content_regex;
pub use structural::{validate_structure, QueryOutcome, QueryStrategy};
