use regex::Regex;
use serde_yaml::Value as Yaml;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use crate::core::EngineError;

/// Placeholder syntax: `@name` or `@{name}` with a lowercase identifier, so
/// the sigil never collides with ordinary punctuation in file paths. `@@` is
/// a literal `@`.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:@|\{([a-z][_a-z0-9]*)\}|([a-z][_a-z0-9]*))").expect("valid regex")
});

fn capture_name<'a>(caps: &regex::Captures<'a>) -> Option<&'a str> {
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Names of all placeholders appearing in a string leaf.
#[must_use]
pub fn required_keywords(leaf: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(leaf)
        .filter_map(|caps| capture_name(&caps).map(String::from))
        .collect()
}

/// Substitute every placeholder from the keyword map, producing a fully
/// concrete string. A placeholder with no matching keyword is fatal.
pub fn substitute(leaf: &str, keywords: &HashMap<String, String>) -> Result<String, EngineError> {
    let mut out = String::with_capacity(leaf.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(leaf) {
        let m = caps.get(0).expect("whole match");
        out.push_str(&leaf[last..m.start()]);
        last = m.end();
        match capture_name(&caps) {
            None => out.push('@'), // the @@ escape
            Some(name) => {
                let value = keywords.get(name).ok_or_else(|| {
                    EngineError::UnresolvedPlaceholder {
                        keyword: name.to_string(),
                        leaf: leaf.to_string(),
                    }
                })?;
                out.push_str(value);
            }
        }
    }
    out.push_str(&leaf[last..]);
    Ok(out)
}

/// Substitute placeholders in every string leaf of the configuration tree.
/// Runs after the expression pass; substituted text is never re-classified,
/// so no second-order substitution can occur.
pub fn substitute_templates(
    node: &mut Yaml,
    keywords: &HashMap<String, String>,
) -> Result<(), EngineError> {
    match node {
        Yaml::String(s) => {
            if PLACEHOLDER_RE.is_match(s) {
                let concrete = substitute(s, keywords)?;
                log::debug!("template '{s}' -> '{concrete}'");
                *s = concrete;
            }
        }
        Yaml::Sequence(seq) => {
            for item in seq.iter_mut() {
                substitute_templates(item, keywords)?;
            }
        }
        Yaml::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_templates(v, keywords)?;
            }
        }
        _ => {}
    }
    Ok(())
}
