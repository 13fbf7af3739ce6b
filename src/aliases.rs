//! Alias generation for cached object titles.
//!
//! Aliases are lowercase lookup keys derived mechanically from a display
//! title. Generation is a pure function: the same title always yields the
//! same aliases in the same order.

use crate::types::normalize;

/// Trailing words that are commonly dropped when people refer to an object
/// by name ("Tasks Database" -> "tasks").
pub const STRIPPABLE_SUFFIXES: &[&str] = &["database", "db", "table", "list", "tracker", "log"];

/// Derives the alias set for a display title.
///
/// The normalized title always comes first. Then, in order: the title with a
/// common suffix word stripped, naive singular/plural variants of that
/// stripped form, and acronyms of multi-word forms. The plural heuristic is
/// purely mechanical ("status" yields "statu").
pub fn generate_aliases(title: &str) -> Vec<String> {
    let normalized = normalize(title);
    let mut aliases = Vec::new();
    if normalized.is_empty() {
        return aliases;
    }

    push_unique(&mut aliases, normalized.clone());

    let stripped = strip_suffix(&normalized);
    push_unique(&mut aliases, stripped.clone());

    if let Some(variant) = plural_variant(&stripped) {
        push_unique(&mut aliases, variant);
    }

    if let Some(acronym) = acronym(&normalized) {
        push_unique(&mut aliases, acronym);
    }
    if stripped != normalized {
        if let Some(acronym) = acronym(&stripped) {
            push_unique(&mut aliases, acronym);
        }
    }

    aliases
}

/// Drops a trailing suffix word when the title has more than one token.
fn strip_suffix(normalized: &str) -> String {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() && STRIPPABLE_SUFFIXES.contains(last) => {
            rest.join(" ")
        }
        _ => normalized.to_string(),
    }
}

fn plural_variant(s: &str) -> Option<String> {
    if let Some(singular) = s.strip_suffix('s') {
        let singular = singular.trim_end();
        if singular.is_empty() {
            None
        } else {
            Some(singular.to_string())
        }
    } else {
        Some(format!("{s}s"))
    }
}

fn acronym(s: &str) -> Option<String> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let acronym: String = tokens.iter().filter_map(|t| t.chars().next()).collect();
    if acronym.chars().count() >= 2 {
        Some(acronym)
    } else {
        None
    }
}

fn push_unique(aliases: &mut Vec<String>, alias: String) {
    if !alias.is_empty() && !aliases.contains(&alias) {
        aliases.push(alias);
    }
}
