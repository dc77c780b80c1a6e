//! Tracking-code extraction from free-form chat text.

use std::sync::OnceLock;

use regex::Regex;

/// 2-5 letters followed by 6-12 digits, e.g. `MSKU1234567` or `AWB123456789`.
///
/// The regex crate has no look-ahead, so the trailing guard is consumed as a
/// plain character after capture group 1: the digit run may not be followed
/// by a 13th digit. The letter run may start anywhere, even mid-word.
const TRACKING_CODE_PATTERN: &str = r"([A-Za-z]{2,5}[0-9]{6,12})(?:[^0-9]|$)";

fn tracking_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TRACKING_CODE_PATTERN).expect("valid regex"))
}

/// Find the first tracking code in `text`, upper-cased.
///
/// Later candidates in the same text are ignored.
pub fn extract_tracking_code(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let caps = tracking_regex().captures(text)?;
    caps.get(1).map(|m| m.as_str().to_ascii_uppercase())
}
