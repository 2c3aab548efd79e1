//! Identifier validation shared by entity, relation and config code.
//!
//! Set names, aliases and property names all follow the same shape:
//! `[A-Za-z_][A-Za-z0-9_]*`. Qualified property names join two of them with a dot
//! (`source.name`); a `*` property selects every property of the qualifier.
//!
//! ```
//! use relgraph::utils::identifier::{is_identifier, split_qualified};
//!
//! assert!(is_identifier("group_members"));
//! assert!(!is_identifier("9lives"));
//! assert_eq!(split_qualified("source.name"), (Some("source"), "name"));
//! assert_eq!(split_qualified("name"), (None, "name"));
//! ```

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Split `qualifier.property` at the first dot
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((qualifier, property)) => (Some(qualifier), property),
        None => (None, name),
    }
}

/// Count `?` placeholders in a condition template
pub fn count_placeholders(template: &str) -> usize {
    let mut count = 0;
    let mut in_literal = false;
    for ch in template.chars() {
        match ch {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}
