/// Query-stage operators executed against the container store.
///
/// Every operator reads its input container, builds a fresh result, then
/// writes it through `ContainerStore::set`. When input and output name the
/// same container this is an in-place replacement; when they diverge the
/// input is never touched.
use log::{debug, warn};
use std::cmp::Ordering;
use crate::core::{Column, ContainerStore, DataType, EngineError, Frame, Row, Value};
use super::aggregate::AggFn;
use super::conditions::Predicate;

pub struct QueryOps;

/// Capability contract every engine must satisfy: ranking rows from either
/// end of a sort order.
pub trait TabularEngine {
    /// Largest n rows by the sort keys (first key is primary).
    fn top(
        &self,
        store: &mut ContainerStore,
        by: &[String],
        n: usize,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError>;

    /// Smallest n rows by the sort keys.
    fn bottom(
        &self,
        store: &mut ContainerStore,
        by: &[String],
        n: usize,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError>;
}

impl TabularEngine for QueryOps {
    fn top(
        &self,
        store: &mut ContainerStore,
        by: &[String],
        n: usize,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let result = store.get(input)?.sort_by(by, false)?.head(n);
        store.set(output, result);
        Ok(())
    }

    fn bottom(
        &self,
        store: &mut ContainerStore,
        by: &[String],
        n: usize,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let result = store.get(input)?.sort_by(by, true)?.head(n);
        store.set(output, result);
        Ok(())
    }
}

/// String-matching flavor shared by startswith/endswith/contains.
#[derive(Debug, Clone, Copy)]
pub enum TextMatch {
    StartsWith,
    EndsWith,
    Contains,
}

impl TextMatch {
    fn matches(self, cell: &Value, pattern: &str) -> bool {
        cell.as_text().is_some_and(|s| match self {
            Self::StartsWith => s.starts_with(pattern),
            Self::EndsWith => s.ends_with(pattern),
            Self::Contains => s.contains(pattern),
        })
    }
}

/// Pivot parameters, resolved from configuration by the dispatcher.
pub struct CrosstabSpec {
    pub values: String,
    pub index: Vec<String>,
    pub columns: String,
    /// Resolved aggregations in declaration order.
    pub aggfuncs: Vec<(&'static str, AggFn)>,
    /// True when the configuration supplied a list of functions; controls
    /// the column-label scheme.
    pub list_style: bool,
    pub margins: bool,
    pub margins_name: String,
    pub fill_value: Value,
}

fn tuple_cmp(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.cmp_for_sort(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn infer_type(cells: &[Value]) -> DataType {
    let filled: Vec<&Value> = cells.iter().filter(|v| !v.is_null()).collect();
    if filled.iter().all(|v| matches!(v, Value::Integer(_))) && !filled.is_empty() {
        DataType::Integer
    } else if filled.iter().all(|v| v.as_f64().is_some()) && !filled.is_empty() {
        DataType::Real
    } else if filled.iter().all(|v| matches!(v, Value::Boolean(_))) && !filled.is_empty() {
        DataType::Boolean
    } else {
        DataType::Text
    }
}

impl QueryOps {
    /// Keep the named columns only.
    pub fn select(
        store: &mut ContainerStore,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let projected = store.get(input)?.project(columns)?;
        store.set(output, projected);
        Ok(())
    }

    /// Drop the named columns.
    pub fn deselect(
        store: &mut ContainerStore,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let remaining = store.get(input)?.drop_columns(columns)?;
        store.set(output, remaining);
        Ok(())
    }

    /// Row filter: all column conditions must hold (logical AND, applied in
    /// declaration order). Retained rows keep their input order.
    pub fn filter(
        store: &mut ContainerStore,
        conditions: &[(String, Predicate)],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let frame = store.get(input)?;
        let indices: Vec<usize> = conditions
            .iter()
            .map(|(col, pred)| {
                debug!("filtering '{col}' by {pred:?}");
                frame.column_index_or_err(col)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kept = frame.retain(|row| {
            indices
                .iter()
                .zip(conditions)
                .all(|(&i, (_, pred))| pred.matches(&row.values[i]))
        });
        store.set(output, kept);
        Ok(())
    }

    /// startswith / endswith / contains over text cells; non-text cells
    /// never match. Multiple column patterns are ANDed.
    pub fn match_text(
        store: &mut ContainerStore,
        matcher: TextMatch,
        conditions: &[(String, String)],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let frame = store.get(input)?;
        let indices: Vec<usize> = conditions
            .iter()
            .map(|(col, pattern)| {
                debug!("filtering '{col}' with {matcher:?} '{pattern}'");
                frame.column_index_or_err(col)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kept = frame.retain(|row| {
            indices
                .iter()
                .zip(conditions)
                .all(|(&i, (_, pattern))| matcher.matches(&row.values[i], pattern))
        });
        store.set(output, kept);
        Ok(())
    }

    /// Concatenate the named containers onto the output container, which
    /// must already exist with content. Unknown source names are skipped.
    pub fn append(
        store: &mut ContainerStore,
        sources: &[String],
        output: &str,
    ) -> Result<(), EngineError> {
        for name in sources {
            let Ok(frame) = store.get(name).map(Frame::clone) else {
                warn!("container '{name}' not in the store, skipped");
                continue;
            };
            store.append(output, &frame)?;
        }
        Ok(())
    }

    /// Partition rows by key columns and aggregate each value column per
    /// group. Groups appear in first-appearance order.
    pub fn groupby(
        store: &mut ContainerStore,
        by: &[String],
        values: &[String],
        agg: AggFn,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let frame = store.get(input)?.clone();
        let by_idx: Vec<usize> = by
            .iter()
            .map(|c| frame.column_index_or_err(c))
            .collect::<Result<Vec<_>, _>>()?;
        let val_idx: Vec<usize> = values
            .iter()
            .map(|c| frame.column_index_or_err(c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut keys: Vec<Vec<Value>> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (ri, row) in frame.rows.iter().enumerate() {
            let key: Vec<Value> = by_idx.iter().map(|&i| row.values[i].clone()).collect();
            match keys
                .iter()
                .position(|k| tuple_cmp(k, &key) == Ordering::Equal)
            {
                Some(g) => groups[g].push(ri),
                None => {
                    keys.push(key);
                    groups.push(vec![ri]);
                }
            }
        }

        let mut value_cells: Vec<Vec<Value>> = vec![Vec::new(); val_idx.len()];
        let mut rows = Vec::with_capacity(keys.len());
        for (key, group) in keys.iter().zip(&groups) {
            let mut row = key.clone();
            for (vi, &col) in val_idx.iter().enumerate() {
                let slice: Vec<Value> = group
                    .iter()
                    .map(|&ri| frame.rows[ri].values[col].clone())
                    .collect();
                let cell = agg(&slice);
                value_cells[vi].push(cell.clone());
                row.push(cell);
            }
            rows.push(Row::new(row));
        }

        let mut columns: Vec<Column> =
            by_idx.iter().map(|&i| frame.columns[i].clone()).collect();
        for (vi, name) in values.iter().enumerate() {
            columns.push(Column::new(name.clone(), infer_type(&value_cells[vi])));
        }
        store.set(output, Frame { columns, rows });
        Ok(())
    }

    /// Two-dimensional pivot of one value column by index rows and category
    /// columns, with optional grand-total margins. Index keys and category
    /// labels are sorted; margins come last. Cells for combinations with no
    /// source rows (and null aggregation results) take the fill value.
    pub fn crosstab(
        store: &mut ContainerStore,
        spec: &CrosstabSpec,
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        let frame = store.get(input)?.clone();
        let idx_cols: Vec<usize> = spec
            .index
            .iter()
            .map(|c| frame.column_index_or_err(c))
            .collect::<Result<Vec<_>, _>>()?;
        let cat_col = frame.column_index_or_err(&spec.columns)?;
        let val_col = frame.column_index_or_err(&spec.values)?;

        let mut keys: Vec<Vec<Value>> = frame
            .rows
            .iter()
            .map(|r| idx_cols.iter().map(|&i| r.values[i].clone()).collect())
            .collect();
        keys.sort_by(|a, b| tuple_cmp(a, b));
        keys.dedup_by(|a, b| tuple_cmp(a, b) == Ordering::Equal);

        let mut cats: Vec<Value> = frame.rows.iter().map(|r| r.values[cat_col].clone()).collect();
        cats.sort_by(Value::cmp_for_sort);
        cats.dedup_by(|a, b| a.cmp_for_sort(b) == Ordering::Equal);

        // (label, aggregation, category filter) per output value column;
        // None category = the margins column over all categories
        let mut specs: Vec<(String, AggFn, Option<Value>)> = Vec::new();
        for (func_name, func) in &spec.aggfuncs {
            for cat in &cats {
                let label = if spec.list_style {
                    format!("{func_name} {cat}")
                } else {
                    format!("{cat} {func_name}")
                };
                specs.push((label, *func, Some(cat.clone())));
            }
            if spec.margins {
                let label = if spec.list_style {
                    format!("{} {}", func_name, spec.margins_name)
                } else {
                    format!("{} {}", spec.margins_name, func_name)
                };
                specs.push((label, *func, None));
            }
        }

        let aggregate_cell = |rows: &[&Row]| -> Vec<Value> {
            rows.iter().map(|r| r.values[val_col].clone()).collect()
        };
        let fill = |cell: Value| -> Value {
            if cell.is_null() {
                spec.fill_value.clone()
            } else {
                cell
            }
        };

        let mut rows = Vec::with_capacity(keys.len() + 1);
        for key in &keys {
            let key_rows: Vec<&Row> = frame
                .rows
                .iter()
                .filter(|r| {
                    let row_key: Vec<Value> =
                        idx_cols.iter().map(|&i| r.values[i].clone()).collect();
                    tuple_cmp(&row_key, key) == Ordering::Equal
                })
                .collect();

            let mut row = key.clone();
            for (_, func, cat) in &specs {
                let matching: Vec<&Row> = match cat {
                    Some(c) => key_rows
                        .iter()
                        .filter(|r| r.values[cat_col].cmp_for_sort(c) == Ordering::Equal)
                        .copied()
                        .collect(),
                    None => key_rows.clone(),
                };
                let cell = if matching.is_empty() {
                    spec.fill_value.clone()
                } else {
                    fill(func(&aggregate_cell(&matching)))
                };
                row.push(cell);
            }
            rows.push(Row::new(row));
        }

        if spec.margins {
            let all_rows: Vec<&Row> = frame.rows.iter().collect();
            let mut row = Vec::with_capacity(idx_cols.len() + specs.len());
            row.push(Value::Text(spec.margins_name.clone()));
            for _ in 1..idx_cols.len() {
                row.push(Value::Null);
            }
            for (_, func, cat) in &specs {
                let matching: Vec<&Row> = match cat {
                    Some(c) => all_rows
                        .iter()
                        .filter(|r| r.values[cat_col].cmp_for_sort(c) == Ordering::Equal)
                        .copied()
                        .collect(),
                    None => all_rows.clone(),
                };
                let cell = if matching.is_empty() {
                    spec.fill_value.clone()
                } else {
                    fill(func(&aggregate_cell(&matching)))
                };
                row.push(cell);
            }
            rows.push(Row::new(row));
        }

        let mut columns: Vec<Column> = idx_cols
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let mut c = frame.columns[i].clone();
                if spec.margins && pos == 0 {
                    // margin row injects a text label into the first key column
                    c.data_type = DataType::Text;
                }
                c
            })
            .collect();
        for (ci, (label, _, _)) in specs.iter().enumerate() {
            let cells: Vec<Value> = rows
                .iter()
                .map(|r| r.values[idx_cols.len() + ci].clone())
                .collect();
            columns.push(Column::new(label.clone(), infer_type(&cells)));
        }

        store.set(output, Frame { columns, rows });
        Ok(())
    }
}
