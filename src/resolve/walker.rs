use log::debug;
use serde_yaml::Value as Yaml;
use super::expr;

/// One step of a path into the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{k}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

fn format_path(path: &[PathStep]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Traverse the tree and collect every leaf that the deferred-expression
/// grammar resolves, together with its exact path. Mutation happens in a
/// separate pass so traversal never iterates a structure it is rewriting.
#[must_use]
pub fn collect_resolutions(root: &Yaml) -> Vec<(Vec<PathStep>, Yaml)> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut out);
    out
}

fn walk(node: &Yaml, path: &mut Vec<PathStep>, out: &mut Vec<(Vec<PathStep>, Yaml)>) {
    match node {
        Yaml::Mapping(map) => {
            for (k, v) in map {
                let Some(key) = k.as_str() else {
                    debug!("non-string key at {} skipped", format_path(path));
                    continue;
                };
                path.push(PathStep::Key(key.to_string()));
                visit(v, path, out);
                path.pop();
            }
        }
        Yaml::Sequence(seq) => {
            for (i, v) in seq.iter().enumerate() {
                path.push(PathStep::Index(i));
                visit(v, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn visit(node: &Yaml, path: &mut Vec<PathStep>, out: &mut Vec<(Vec<PathStep>, Yaml)>) {
    match node {
        Yaml::String(s) => {
            if let Some(resolution) = expr::classify(s) {
                debug!("{} <- {}", format_path(path), s);
                out.push((path.clone(), resolution.resolved()));
            }
        }
        // nested mappings and sequence-of-mapping entries recurse; integer
        // leaves and empty mappings pass through unchanged
        Yaml::Mapping(_) | Yaml::Sequence(_) => walk(node, path, out),
        _ => {}
    }
}

fn node_at_mut<'a>(root: &'a mut Yaml, path: &[PathStep]) -> Option<&'a mut Yaml> {
    let mut node = root;
    for step in path {
        node = match step {
            PathStep::Key(k) => node.as_mapping_mut()?.get_mut(k.as_str())?,
            PathStep::Index(i) => node.as_sequence_mut()?.get_mut(*i)?,
        };
    }
    Some(node)
}

/// Rewrite the tree at each recorded path.
pub fn apply_resolutions(root: &mut Yaml, resolutions: Vec<(Vec<PathStep>, Yaml)>) {
    for (path, replacement) in resolutions {
        if let Some(slot) = node_at_mut(root, &path) {
            *slot = replacement;
        }
    }
}

/// The full expression pass: collect, then rewrite.
pub fn resolve_expressions(root: &mut Yaml) {
    let resolutions = collect_resolutions(root);
    apply_resolutions(root, resolutions);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Yaml {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_resolves_aggregation_leaf_in_mapping() {
        let mut doc = parse("query:\n  groupby:\n    aggregation: np.sum\n");
        resolve_expressions(&mut doc);
        assert_eq!(
            doc["query"]["groupby"]["aggregation"],
            Yaml::String("<agg sum>".to_string())
        );
    }

    #[test]
    fn test_resolves_none_to_yaml_null() {
        let mut doc = parse("crosstab:\n  columns: None\n");
        resolve_expressions(&mut doc);
        assert_eq!(doc["crosstab"]["columns"], Yaml::Null);
    }

    #[test]
    fn test_sequence_of_mappings_recurses() {
        let mut doc = parse("+transformation:\n  - query:\n      aggfunc: np.count\n");
        resolve_expressions(&mut doc);
        assert_eq!(
            doc["+transformation"][0]["query"]["aggfunc"],
            Yaml::String("<agg count>".to_string())
        );
    }

    #[test]
    fn test_sequence_of_strings() {
        let mut doc = parse("aggfunc:\n  - np.sum\n  - np.count\n  - literal text\n");
        resolve_expressions(&mut doc);
        assert_eq!(doc["aggfunc"][0], Yaml::String("<agg sum>".to_string()));
        assert_eq!(doc["aggfunc"][1], Yaml::String("<agg count>".to_string()));
        assert_eq!(doc["aggfunc"][2], Yaml::String("literal text".to_string()));
    }

    #[test]
    fn test_literals_and_integers_untouched() {
        let text = "filter:\n  amount: '<=5'\n  n: 10\n  note: keep as is\n";
        let mut doc = parse(text);
        let before = doc.clone();
        resolve_expressions(&mut doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_pass_is_idempotent() {
        let mut doc = parse("a:\n  agg: np.sum\n  empty: {}\n  n: 3\n");
        resolve_expressions(&mut doc);
        let once = doc.clone();
        resolve_expressions(&mut doc);
        assert_eq!(doc, once);
    }

    #[test]
    fn test_collect_reports_paths() {
        let doc = parse("steps:\n  - calc:\n      f: np.mean\n");
        let resolutions = collect_resolutions(&doc);
        assert_eq!(resolutions.len(), 1);
        let (path, value) = &resolutions[0];
        assert_eq!(
            path,
            &vec![
                PathStep::Key("steps".to_string()),
                PathStep::Index(0),
                PathStep::Key("calc".to_string()),
                PathStep::Key("f".to_string()),
            ]
        );
        assert_eq!(value, &Yaml::String("<agg mean>".to_string()));
    }
}
