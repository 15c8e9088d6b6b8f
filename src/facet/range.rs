//! Range facet grammar.
//!
//! Facet selections on numeric and date fields arrive as
//! `RANGE(<start>, <end>, upper=<bound>)` text. The engine's query language
//! wants bracket syntax, with the closing bracket encoding whether the upper
//! bound is part of the range.

use regex::Regex;
use std::sync::OnceLock;

static RANGE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn range_pattern() -> &'static Regex {
    RANGE_PATTERN.get_or_init(|| {
        Regex::new(r"^RANGE\((.*),\s?(.*),\s?upper=(\w*)\)$").unwrap()
    })
}

/// Rewrite a range facet value into bracket syntax.
///
/// `upper=inclusive` closes with `]`, `upper=exclusive` with `}`. Anything
/// that is not a range, or carries an unknown bound type, passes through
/// unchanged.
pub fn rewrite(value: &str) -> String {
    if let Some(caps) = range_pattern().captures(value) {
        let lower = &caps[1];
        let upper = &caps[2];
        match &caps[3] {
            "exclusive" => return format!("[{} TO {}}}", lower, upper),
            "inclusive" => return format!("[{} TO {}]", lower, upper),
            _ => {}
        }
    }
    value.to_string()
}
