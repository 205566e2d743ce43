use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TERM_RE: Regex = Regex::new(r"[a-z0-9]+").expect("valid regex");
}

/// Tokenize text into terms: lowercase, then take maximal runs of ASCII
/// letters and digits. Every other character separates terms.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    TERM_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}
