//! Fact-name filter compilation.
//!
//! Requests restrict returned facts with glob patterns:
//!
//! - `**` matches any run of characters
//! - `*` matches any run of characters other than `/`
//! - `?` matches one character other than `/`
//!
//! Everything else is literal. Patterns match anywhere in the fact name, so
//! `/kythe/loc/**` covers both location facts and `**/node/kind` covers the
//! node kind fact.

use regex::Regex;

/// Compile each filter glob into its matcher.
pub fn compile_filters(filters: &[String]) -> Vec<Regex> {
    filters.iter().map(|f| compile_filter(f)).collect()
}

/// Whether any compiled matcher accepts `name`.
///
/// An empty pattern list matches nothing; callers that treat "no filter" as
/// "accept all" guard on the filter list before calling this.
pub fn matches_any(name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(name))
}

fn compile_filter(pattern: &str) -> Regex {
    let mut re = String::new();
    let mut rest = pattern;
    while let Some(op) = rest.find(['*', '?']) {
        re.push_str(&regex::escape(&rest[..op]));
        if rest[op..].starts_with("**") {
            re.push_str(".*");
            rest = &rest[op + 2..];
        } else if rest[op..].starts_with('*') {
            re.push_str("[^/]*");
            rest = &rest[op + 1..];
        } else {
            re.push_str("[^/]");
            rest = &rest[op + 1..];
        }
    }
    re.push_str(&regex::escape(rest));
    // Escaped literals joined with fixed operator classes always form a
    // valid expression.
    Regex::new(&re).expect("compiled filter glob")
}
