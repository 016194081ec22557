use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::alpha1,
    combinator::{opt, recognize},
    sequence::{pair, preceded},
    IResult,
};
use crate::executor::aggregate;

/// Outcome of classifying a string leaf against the deferred-expression
/// grammar. Anything that does not match is ordinary literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredExpr {
    /// The bare word `None`/`null`: the leaf resolves to a YAML null.
    Null,
    /// A reference to a registered aggregation function; the leaf resolves
    /// to its bracketed marker form, e.g. `<agg sum>`.
    Aggregation(String),
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn null_literal(input: &str) -> IResult<&str, &str> {
    alt((tag("None"), tag("null")))(input)
}

fn aggregation_ref(input: &str) -> IResult<&str, &str> {
    preceded(opt(tag("np.")), identifier)(input)
}

/// Decide whether a leaf encodes a deferred expression. The grammar is
/// closed: a null literal, or a registered aggregation name with an optional
/// `np.` prefix. The whole leaf must match; unknown identifiers and partial
/// matches are literal text, decided without any evaluation.
#[must_use]
pub fn classify(leaf: &str) -> Option<DeferredExpr> {
    if let Ok((rest, _)) = null_literal(leaf) {
        if rest.is_empty() {
            return Some(DeferredExpr::Null);
        }
    }
    if let Ok((rest, name)) = aggregation_ref(leaf) {
        if rest.is_empty() && aggregate::is_registered(name) {
            return Some(DeferredExpr::Aggregation(name.to_string()));
        }
    }
    None
}

impl DeferredExpr {
    /// The replacement value recorded by the walker.
    #[must_use]
    pub fn resolved(&self) -> serde_yaml::Value {
        match self {
            Self::Null => serde_yaml::Value::Null,
            Self::Aggregation(name) => {
                serde_yaml::Value::String(aggregate::marker(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_literals() {
        assert_eq!(classify("None"), Some(DeferredExpr::Null));
        assert_eq!(classify("null"), Some(DeferredExpr::Null));
        assert_eq!(classify("NoneAtAll"), None);
    }

    #[test]
    fn test_registered_aggregations() {
        assert_eq!(
            classify("np.sum"),
            Some(DeferredExpr::Aggregation("sum".to_string()))
        );
        assert_eq!(
            classify("count_nulls"),
            Some(DeferredExpr::Aggregation("count_nulls".to_string()))
        );
    }

    #[test]
    fn test_unknown_names_are_literal() {
        assert_eq!(classify("np.median"), None);
        assert_eq!(classify("summary"), None);
        assert_eq!(classify("C:/path/to/file.csv"), None);
    }

    #[test]
    fn test_markers_are_not_reclassified() {
        assert_eq!(classify("<agg sum>"), None);
    }

    #[test]
    fn test_resolved_forms() {
        assert_eq!(
            DeferredExpr::Aggregation("sum".to_string()).resolved(),
            serde_yaml::Value::String("<agg sum>".to_string())
        );
        assert_eq!(DeferredExpr::Null.resolved(), serde_yaml::Value::Null);
    }
}
