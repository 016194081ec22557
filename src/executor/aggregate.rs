use crate::core::Value;

/// An aggregation folds a column slice into one cell.
pub type AggFn = fn(&[Value]) -> Value;

/// Closed registry of aggregation functions a configuration may reference.
const REGISTRY: &[(&str, AggFn)] = &[
    ("sum", agg_sum),
    ("count", agg_count),
    ("mean", agg_mean),
    ("min", agg_min),
    ("max", agg_max),
    ("count_nulls", agg_count_nulls),
    ("range", agg_range),
];

#[must_use]
pub fn is_registered(name: &str) -> bool {
    REGISTRY.iter().any(|(n, _)| *n == name)
}

/// Bracketed marker form the config walker rewrites references into.
#[must_use]
pub fn marker(name: &str) -> String {
    format!("<agg {name}>")
}

/// Look up an aggregation by bare name, `np.`-prefixed name, or marker form.
#[must_use]
pub fn resolve(reference: &str) -> Option<(&'static str, AggFn)> {
    let name = reference
        .strip_prefix("<agg ")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(reference);
    let name = name.strip_prefix("np.").unwrap_or(name);
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, f)| (*n, *f))
}

fn numerics(values: &[Value]) -> impl Iterator<Item = f64> + '_ {
    values.iter().filter_map(Value::as_f64)
}

fn all_integer(values: &[Value]) -> bool {
    values
        .iter()
        .filter(|v| !v.is_null())
        .all(|v| matches!(v, Value::Integer(_)))
}

fn agg_sum(values: &[Value]) -> Value {
    let total: f64 = numerics(values).sum();
    if all_integer(values) {
        Value::Integer(total as i64)
    } else {
        Value::Real(total)
    }
}

// row count, nulls included
fn agg_count(values: &[Value]) -> Value {
    Value::Integer(values.len() as i64)
}

fn agg_count_nulls(values: &[Value]) -> Value {
    Value::Integer(values.iter().filter(|v| v.is_null()).count() as i64)
}

fn agg_mean(values: &[Value]) -> Value {
    let nums: Vec<f64> = numerics(values).collect();
    if nums.is_empty() {
        return Value::Null;
    }
    Value::Real(nums.iter().sum::<f64>() / nums.len() as f64)
}

fn agg_min(values: &[Value]) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .min_by(|a, b| a.cmp_for_sort(b))
        .cloned()
        .unwrap_or(Value::Null)
}

fn agg_max(values: &[Value]) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .max_by(|a, b| a.cmp_for_sort(b))
        .cloned()
        .unwrap_or(Value::Null)
}

fn agg_range(values: &[Value]) -> Value {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let mut seen = false;
    for n in numerics(values) {
        seen = true;
        lo = lo.min(n);
        hi = hi.max(n);
    }
    if !seen {
        return Value::Null;
    }
    if all_integer(values) {
        Value::Integer((hi - lo) as i64)
    } else {
        Value::Real(hi - lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Integer(v)).collect()
    }

    #[test]
    fn test_resolve_accepts_all_spellings() {
        assert!(resolve("sum").is_some());
        assert!(resolve("np.sum").is_some());
        assert!(resolve("<agg sum>").is_some());
        assert!(resolve("median").is_none());
    }

    #[test]
    fn test_sum_keeps_integer_kind() {
        assert_eq!(agg_sum(&ints(&[1, 2, 3])), Value::Integer(6));
        assert_eq!(
            agg_sum(&[Value::Integer(1), Value::Real(0.5)]),
            Value::Real(1.5)
        );
    }

    #[test]
    fn test_sum_skips_nulls() {
        assert_eq!(
            agg_sum(&[Value::Integer(1), Value::Null, Value::Integer(2)]),
            Value::Integer(3)
        );
    }

    #[test]
    fn test_count_includes_nulls() {
        let vals = [Value::Integer(1), Value::Null, Value::Null];
        assert_eq!(agg_count(&vals), Value::Integer(3));
        assert_eq!(agg_count_nulls(&vals), Value::Integer(2));
    }

    #[test]
    fn test_mean() {
        assert_eq!(agg_mean(&ints(&[2, 4])), Value::Real(3.0));
        assert_eq!(agg_mean(&[Value::Null]), Value::Null);
    }

    #[test]
    fn test_min_max_over_text() {
        let vals = [
            Value::Text("beta".to_string()),
            Value::Text("alpha".to_string()),
        ];
        assert_eq!(agg_min(&vals), Value::Text("alpha".to_string()));
        assert_eq!(agg_max(&vals), Value::Text("beta".to_string()));
    }

    #[test]
    fn test_range() {
        assert_eq!(agg_range(&ints(&[3, 9, 5])), Value::Integer(6));
        assert_eq!(agg_range(&[]), Value::Null);
    }
}
