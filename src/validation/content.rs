use crate::document::Document;
use regex::RegexBuilder;
use tracing::warn;

/// True if `pattern` matches anywhere in the pretty-printed document.
///
/// `.` also matches line breaks. A missing document, an empty serialization
/// or a pattern that does not compile all count as "no match".
pub fn validate_content_regex(doc: Option<&Document>, pattern: &str) -> bool {
    let Some(doc) = doc else {
        return false;
    };
    let text = doc.prettify();
    if text.is_empty() {
        return false;
    }

    match RegexBuilder::new(pattern).dot_matches_new_line(true).build() {
        Ok(re) => re.is_match(&text),
        Err(e) => {
            warn!("Invalid validation regex '{}': {}", pattern, e);
            false
        }
    }
}
