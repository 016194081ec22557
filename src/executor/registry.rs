/// Operator registry and dispatch.
///
/// A transformation step names a stage (`query` or `calculate`); each stage
/// has a fixed allow-list of operator names. Keys outside the allow-list are
/// removed before execution and the step continues — a deliberate
/// compatibility behavior, logged so it is visible.
///
/// Dispatch is a static table from operator name to a typed handler; unknown
/// names cannot reach a handler by construction.
use log::warn;
use serde_yaml::Value as Yaml;
use crate::core::{ContainerStore, EngineError, Value};
use super::aggregate::{self, AggFn};
use super::calculate::CalcOps;
use super::conditions::{parse_condition, Predicate};
use super::query::{CrosstabSpec, QueryOps, TabularEngine as _, TextMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Query,
    Calculate,
}

const QUERY_OPERATORS: &[&str] = &[
    "crosstab",
    "filter",
    "select",
    "deselect",
    "groupby",
    "startswith",
    "endswith",
    "contains",
    "append",
    "top",
    "bottom",
];

const CALCULATE_OPERATORS: &[&str] = &[
    "difference",
    "absolute_difference",
    "percentage_difference",
    "absolute_percentage_difference",
    "summation",
];

impl Stage {
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "query" => Some(Self::Query),
            "calculate" => Some(Self::Calculate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Calculate => "calculate",
        }
    }

    #[must_use]
    pub const fn allowed_operators(self) -> &'static [&'static str] {
        match self {
            Self::Query => QUERY_OPERATORS,
            Self::Calculate => CALCULATE_OPERATORS,
        }
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Remove every key not on the stage's allow-list. The step itself
    /// survives; only unrecognized operators are dropped.
    pub fn filter_operators(stage: Stage, step: &mut serde_yaml::Mapping) {
        let allowed = stage.allowed_operators();
        let dropped: Vec<Yaml> = step
            .keys()
            .filter(|k| !k.as_str().is_some_and(|name| allowed.contains(&name)))
            .cloned()
            .collect();
        for key in dropped {
            warn!(
                "operator '{}' is not defined for stage '{}', dropped",
                key.as_str().unwrap_or("<non-string>"),
                stage.key()
            );
            step.remove(&key);
        }
    }

    /// Execute one `{operator: params}` entry against the store, with the
    /// resolved input and output containers injected.
    pub fn execute(
        store: &mut ContainerStore,
        stage: Stage,
        operator: &str,
        params: &Yaml,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        match stage {
            Stage::Query => Self::execute_query(store, operator, params, input, output),
            Stage::Calculate => Self::execute_calculate(store, operator, params, input, output),
        }
    }

    fn execute_query(
        store: &mut ContainerStore,
        operator: &str,
        params: &Yaml,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        match operator {
            "select" => QueryOps::select(store, &positional_list(params, "columns")?, input, output),
            "deselect" => {
                QueryOps::deselect(store, &positional_list(params, "columns")?, input, output)
            }
            "filter" => QueryOps::filter(store, &condition_params(params)?, input, output),
            "startswith" => QueryOps::match_text(
                store,
                TextMatch::StartsWith,
                &pattern_params(params)?,
                input,
                output,
            ),
            "endswith" => QueryOps::match_text(
                store,
                TextMatch::EndsWith,
                &pattern_params(params)?,
                input,
                output,
            ),
            "contains" => QueryOps::match_text(
                store,
                TextMatch::Contains,
                &pattern_params(params)?,
                input,
                output,
            ),
            "top" => {
                let (by, n) = sort_params(params)?;
                QueryOps.top(store, &by, n, input, output)
            }
            "bottom" => {
                let (by, n) = sort_params(params)?;
                QueryOps.bottom(store, &by, n, input, output)
            }
            "append" => {
                QueryOps::append(store, &positional_list(params, "containers_to_append")?, output)
            }
            "groupby" => {
                let map = mapping_params(params, "groupby")?;
                let by = required_list(map, "by", "groupby")?;
                let values = required_list(map, "values", "groupby")?;
                let reference = required_str(map, "aggregation", "groupby")?;
                let (_, agg) = resolve_aggregation(&reference)?;
                QueryOps::groupby(store, &by, &values, agg, input, output)
            }
            "crosstab" => {
                let spec = crosstab_params(params)?;
                QueryOps::crosstab(store, &spec, input, output)
            }
            other => {
                // unreachable after allow-list filtering; preserved as a drop
                warn!("query operator '{other}' has no handler, dropped");
                Ok(())
            }
        }
    }

    fn execute_calculate(
        store: &mut ContainerStore,
        operator: &str,
        params: &Yaml,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let map = mapping_params(params, operator)?;
        let name = required_str(map, "name", operator)?;
        let columns = required_list(map, "columns", operator)?;
        match operator {
            "summation" => CalcOps::summation(store, &name, &columns, input, output),
            "difference" => CalcOps::difference(store, &name, &columns, input, output),
            "absolute_difference" => {
                CalcOps::absolute_difference(store, &name, &columns, input, output)
            }
            "percentage_difference" => {
                CalcOps::percentage_difference(store, &name, &columns, input, output)
            }
            "absolute_percentage_difference" => {
                CalcOps::absolute_percentage_difference(store, &name, &columns, input, output)
            }
            other => {
                warn!("calculate operator '{other}' has no handler, dropped");
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// parameter extraction

fn as_string(v: &Yaml) -> Option<String> {
    v.as_str().map(String::from)
}

/// A name or a list of names.
fn as_string_list(v: &Yaml) -> Option<Vec<String>> {
    match v {
        Yaml::String(s) => Some(vec![s.clone()]),
        Yaml::Sequence(seq) => seq.iter().map(as_string).collect(),
        _ => None,
    }
}

/// Payloads that may arrive positionally (a bare name or list) or as a
/// mapping carrying the named key.
fn positional_list(params: &Yaml, key: &str) -> Result<Vec<String>, EngineError> {
    if let Some(list) = as_string_list(params) {
        return Ok(list);
    }
    if let Yaml::Mapping(map) = params {
        if let Some(list) = map.get(key).and_then(as_string_list) {
            return Ok(list);
        }
    }
    Err(EngineError::Config(format!(
        "expected a name, a list of names, or a mapping with '{key}'"
    )))
}

fn mapping_params<'a>(
    params: &'a Yaml,
    operator: &str,
) -> Result<&'a serde_yaml::Mapping, EngineError> {
    params
        .as_mapping()
        .ok_or_else(|| EngineError::Config(format!("'{operator}' parameters must be a mapping")))
}

fn required_str(
    map: &serde_yaml::Mapping,
    key: &str,
    operator: &str,
) -> Result<String, EngineError> {
    map.get(key).and_then(as_string).ok_or_else(|| {
        EngineError::Config(format!("'{operator}' requires a string '{key}' parameter"))
    })
}

fn required_list(
    map: &serde_yaml::Mapping,
    key: &str,
    operator: &str,
) -> Result<Vec<String>, EngineError> {
    map.get(key).and_then(as_string_list).ok_or_else(|| {
        EngineError::Config(format!("'{operator}' requires a '{key}' parameter"))
    })
}

fn resolve_aggregation(reference: &str) -> Result<(&'static str, AggFn), EngineError> {
    aggregate::resolve(reference)
        .ok_or_else(|| EngineError::Config(format!("unknown aggregation '{reference}'")))
}

/// `{column: condition}` entries, combined with AND in declaration order.
/// A sequence payload is a category-membership test; anything that is
/// neither string nor sequence is dropped.
fn condition_params(params: &Yaml) -> Result<Vec<(String, Predicate)>, EngineError> {
    let map = mapping_params(params, "filter")?;
    let mut conditions = Vec::new();
    for (k, v) in map {
        let Some(column) = k.as_str() else {
            warn!("filter key {k:?} is not a column name, dropped");
            continue;
        };
        match v {
            Yaml::String(cond) => conditions.push((column.to_string(), parse_condition(cond)?)),
            Yaml::Sequence(_) => {
                let Some(levels) = as_string_list(v) else {
                    warn!("filter on '{column}': non-string category levels, dropped");
                    continue;
                };
                conditions.push((column.to_string(), Predicate::MemberOf(levels)));
            }
            _ => warn!("filter on '{column}': unrecognized condition type, dropped"),
        }
    }
    Ok(conditions)
}

/// `{column: pattern}` entries for the string-matching operators.
fn pattern_params(params: &Yaml) -> Result<Vec<(String, String)>, EngineError> {
    let map = mapping_params(params, "string match")?;
    let mut patterns = Vec::new();
    for (k, v) in map {
        let (Some(column), Some(pattern)) = (k.as_str(), v.as_str()) else {
            warn!("string match entry {k:?} is not column: pattern, dropped");
            continue;
        };
        patterns.push((column.to_string(), pattern.to_string()));
    }
    Ok(patterns)
}

fn sort_params(params: &Yaml) -> Result<(Vec<String>, usize), EngineError> {
    let map = mapping_params(params, "top/bottom")?;
    let by = required_list(map, "by", "top/bottom")?;
    let n = match map.get("n") {
        None => 10,
        Some(v) => v.as_u64().ok_or_else(|| {
            EngineError::Config("top/bottom 'n' must be a non-negative integer".to_string())
        })? as usize,
    };
    Ok((by, n))
}

fn yaml_scalar_to_value(v: &Yaml) -> Option<Value> {
    match v {
        Yaml::Null => Some(Value::Null),
        Yaml::Bool(b) => Some(Value::Boolean(*b)),
        Yaml::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real)),
        Yaml::String(s) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

fn crosstab_params(params: &Yaml) -> Result<CrosstabSpec, EngineError> {
    let map = mapping_params(params, "crosstab")?;
    let values = required_str(map, "values", "crosstab")?;
    let index = required_list(map, "index", "crosstab")?;
    let columns = required_str(map, "columns", "crosstab")?;

    let (aggfuncs, list_style) = match map.get("aggfunc") {
        // pivot default
        None => (vec![resolve_aggregation("mean")?], false),
        Some(Yaml::String(reference)) => (vec![resolve_aggregation(reference)?], false),
        Some(Yaml::Sequence(seq)) => {
            let funcs = seq
                .iter()
                .map(|v| {
                    as_string(v)
                        .ok_or_else(|| {
                            EngineError::Config("crosstab 'aggfunc' list must hold names".to_string())
                        })
                        .and_then(|s| resolve_aggregation(&s))
                })
                .collect::<Result<Vec<_>, _>>()?;
            (funcs, true)
        }
        Some(_) => {
            return Err(EngineError::Config(
                "crosstab 'aggfunc' must be a name or a list of names".to_string(),
            ))
        }
    };

    let margins = match map.get("margins") {
        None => true,
        Some(v) => v.as_bool().ok_or_else(|| {
            EngineError::Config("crosstab 'margins' must be a boolean".to_string())
        })?,
    };
    let margins_name = match map.get("margins_name") {
        None => "Total".to_string(),
        Some(v) => as_string(v).ok_or_else(|| {
            EngineError::Config("crosstab 'margins_name' must be a string".to_string())
        })?,
    };
    let fill_value = match map.get("fill_value") {
        None => Value::Integer(0),
        Some(v) => yaml_scalar_to_value(v).ok_or_else(|| {
            EngineError::Config("crosstab 'fill_value' must be a scalar".to_string())
        })?,
    };

    Ok(CrosstabSpec {
        values,
        index,
        columns,
        aggfuncs,
        list_style,
        margins,
        margins_name,
        fill_value,
    })
}
