/// Filter condition parsing and evaluation.
///
/// A condition string carries its operator as a fixed prefix, tried in
/// order: `<=`, `>=`, `=`, `<`, `>`. The operand is trimmed and parsed as a
/// float; failure to parse is a fatal configuration error. A string with no
/// operator prefix is a categorical equality test.
use nom::{branch::alt, bytes::complete::tag, IResult};
use crate::core::{EngineError, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    LessOrEqual(f64),
    GreaterOrEqual(f64),
    EqualNumber(f64),
    LessThan(f64),
    GreaterThan(f64),
    EqualText(String),
    MemberOf(Vec<String>),
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((tag("<="), tag(">="), tag("="), tag("<"), tag(">")))(input)
}

fn parse_operand(operand: &str) -> Result<f64, EngineError> {
    operand
        .trim()
        .parse::<f64>()
        .map_err(|_| EngineError::BadOperand(operand.to_string()))
}

/// Parse a condition string into a typed predicate.
pub fn parse_condition(input: &str) -> Result<Predicate, EngineError> {
    match operator(input) {
        Ok((operand, op)) => {
            let n = parse_operand(operand)?;
            Ok(match op {
                "<=" => Predicate::LessOrEqual(n),
                ">=" => Predicate::GreaterOrEqual(n),
                "=" => Predicate::EqualNumber(n),
                "<" => Predicate::LessThan(n),
                _ => Predicate::GreaterThan(n),
            })
        }
        Err(_) => Ok(Predicate::EqualText(input.to_string())),
    }
}

impl Predicate {
    /// Evaluate against one cell. Numeric predicates never match
    /// non-numeric cells; categorical predicates never match non-text cells.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::LessOrEqual(n) => value.as_f64().is_some_and(|v| v <= *n),
            Self::GreaterOrEqual(n) => value.as_f64().is_some_and(|v| v >= *n),
            Self::EqualNumber(n) => value.as_f64().is_some_and(|v| v == *n),
            Self::LessThan(n) => value.as_f64().is_some_and(|v| v < *n),
            Self::GreaterThan(n) => value.as_f64().is_some_and(|v| v > *n),
            Self::EqualText(s) => value.as_text() == Some(s.as_str()),
            Self::MemberOf(set) => value
                .as_text()
                .is_some_and(|v| set.iter().any(|s| s == v)),
        }
    }
}
