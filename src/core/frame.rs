use comfy_table::{Cell, Table as ComfyTable, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};
use super::column::Column;
use super::data_type::DataType;
use super::error::EngineError;
use super::row::Row;
use super::value::Value;

/// The tabular dataset held by a container: an ordered sequence of rows over
/// named, typed columns. Columns may be added, removed, or replaced; rows may
/// shrink through filtering or grow through appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Frame {
    #[must_use]
    pub const fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_index_or_err(&self, name: &str) -> Result<usize, EngineError> {
        self.column_index(name)
            .ok_or_else(|| EngineError::ColumnNotFound(name.to_string()))
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), EngineError> {
        if row.values.len() != self.columns.len() {
            return Err(EngineError::Config(format!(
                "row has {} values, frame has {} columns",
                row.values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Keep only the named columns, in the order given.
    pub fn project(&self, names: &[String]) -> Result<Self, EngineError> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| self.column_index_or_err(n))
            .collect::<Result<Vec<_>, _>>()?;

        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| Row::new(indices.iter().map(|&i| r.values[i].clone()).collect()))
            .collect();
        Ok(Self { columns, rows })
    }

    /// Drop the named columns, keeping the rest in their current order.
    pub fn drop_columns(&self, names: &[String]) -> Result<Self, EngineError> {
        for n in names {
            self.column_index_or_err(n)?;
        }
        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !names.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        self.project(&keep)
    }

    /// New frame holding the rows for which `pred` returns true, in their
    /// original order.
    #[must_use]
    pub fn retain<F>(&self, pred: F) -> Self
    where
        F: Fn(&Row) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| pred(r)).cloned().collect(),
        }
    }

    /// Stable composite sort: the first named column is the primary key.
    pub fn sort_by(&self, keys: &[String], ascending: bool) -> Result<Self, EngineError> {
        let indices: Vec<usize> = keys
            .iter()
            .map(|k| self.column_index_or_err(k))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let mut ord = std::cmp::Ordering::Equal;
            for &i in &indices {
                ord = a.values[i].cmp_for_sort(&b.values[i]);
                if ord != std::cmp::Ordering::Equal {
                    break;
                }
            }
            if ascending { ord } else { ord.reverse() }
        });
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Append the rows of `other`, aligning columns by name. Columns present
    /// only in `other` are added with Null backfill; cells missing from
    /// `other` become Null. Columns that disagree on type degrade to Text.
    pub fn append_frame(&mut self, other: &Self) {
        for col in &other.columns {
            match self.column_index(&col.name) {
                Some(i) => {
                    if self.columns[i].data_type != col.data_type {
                        self.columns[i].data_type = DataType::Text;
                    }
                }
                None => {
                    self.columns.push(col.clone());
                    for row in &mut self.rows {
                        row.values.push(Value::Null);
                    }
                }
            }
        }
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(&c.name))
            .collect();
        for row in &other.rows {
            let values = mapping
                .iter()
                .map(|idx| idx.map_or(Value::Null, |i| row.values[i].clone()))
                .collect();
            self.rows.push(Row::new(values));
        }
    }

    /// Add a column holding the same value in every row, replacing any
    /// existing column of that name.
    pub fn add_constant_column(&mut self, name: &str, value: Value) {
        let data_type = match &value {
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Real,
            Value::Boolean(_) => DataType::Boolean,
            _ => DataType::Text,
        };
        let n = self.rows.len();
        self.set_column(name, vec![value; n], data_type);
    }

    /// Add or replace a named column. `values` must match the row count.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>, data_type: DataType) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(i) => {
                self.columns[i].data_type = data_type;
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.values[i] = v;
                }
            }
            None => {
                self.columns.push(Column::new(name, data_type));
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.values.push(v);
                }
            }
        }
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<Value>, EngineError> {
        let i = self.column_index_or_err(name)?;
        Ok(self.rows.iter().map(|r| r.values[i].clone()).collect())
    }

    /// Rough heap footprint, for the memory report.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let cell_overhead = std::mem::size_of::<Value>();
        let mut total = 0;
        for row in &self.rows {
            for v in &row.values {
                total += cell_overhead;
                if let Value::Text(s) = v {
                    total += s.len();
                }
            }
        }
        total
    }

    /// Render the first `n` rows for diagnostics.
    #[must_use]
    pub fn preview(&self, n: usize) -> String {
        let mut table = ComfyTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(self.columns.iter().map(|c| Cell::new(&c.name)));
        for row in self.rows.iter().take(n) {
            table.add_row(row.values.iter().map(|v| Cell::new(v.to_string())));
        }
        format!("{}\n({} of {} rows)", table, n.min(self.rows.len()), self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame() -> Frame {
        let mut frame = Frame::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Text),
            Column::new("score", DataType::Real),
        ]);
        frame
            .push_row(Row::new(vec![
                Value::Integer(1),
                Value::Text("alpha".to_string()),
                Value::Real(3.5),
            ]))
            .unwrap();
        frame
            .push_row(Row::new(vec![
                Value::Integer(2),
                Value::Text("beta".to_string()),
                Value::Real(1.0),
            ]))
            .unwrap();
        frame
            .push_row(Row::new(vec![
                Value::Integer(3),
                Value::Text("gamma".to_string()),
                Value::Real(2.25),
            ]))
            .unwrap();
        frame
    }

    #[test]
    fn test_project_keeps_order_and_copies() {
        let frame = create_test_frame();
        let projected = frame.project(&["score".to_string(), "id".to_string()]).unwrap();
        assert_eq!(projected.columns.len(), 2);
        assert_eq!(projected.columns[0].name, "score");
        assert_eq!(projected.rows[0].values[0], Value::Real(3.5));
        assert_eq!(projected.rows[0].values[1], Value::Integer(1));
        // original untouched
        assert_eq!(frame.columns.len(), 3);
    }

    #[test]
    fn test_project_unknown_column() {
        let frame = create_test_frame();
        assert!(matches!(
            frame.project(&["missing".to_string()]),
            Err(EngineError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_drop_columns() {
        let frame = create_test_frame();
        let dropped = frame.drop_columns(&["name".to_string()]).unwrap();
        assert_eq!(dropped.columns.len(), 2);
        assert!(dropped.column_index("name").is_none());
    }

    #[test]
    fn test_sort_descending_then_head() {
        let frame = create_test_frame();
        let sorted = frame.sort_by(&["score".to_string()], false).unwrap();
        let top2 = sorted.head(2);
        assert_eq!(top2.rows.len(), 2);
        assert_eq!(top2.rows[0].values[2], Value::Real(3.5));
        assert_eq!(top2.rows[1].values[2], Value::Real(2.25));
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut frame = Frame::new(vec![
            Column::new("k", DataType::Integer),
            Column::new("tag", DataType::Text),
        ]);
        for (k, tag) in [(1, "first"), (1, "second"), (0, "third")] {
            frame
                .push_row(Row::new(vec![
                    Value::Integer(k),
                    Value::Text(tag.to_string()),
                ]))
                .unwrap();
        }
        let sorted = frame.sort_by(&["k".to_string()], true).unwrap();
        assert_eq!(sorted.rows[0].values[1], Value::Text("third".to_string()));
        assert_eq!(sorted.rows[1].values[1], Value::Text("first".to_string()));
        assert_eq!(sorted.rows[2].values[1], Value::Text("second".to_string()));
    }

    #[test]
    fn test_append_aligns_by_name() {
        let mut target = create_test_frame();
        let mut other = Frame::new(vec![
            Column::new("name", DataType::Text),
            Column::new("extra", DataType::Integer),
        ]);
        other
            .push_row(Row::new(vec![
                Value::Text("delta".to_string()),
                Value::Integer(9),
            ]))
            .unwrap();

        target.append_frame(&other);
        assert_eq!(target.rows.len(), 4);
        assert_eq!(target.columns.len(), 4);
        // pre-existing rows got Null in the new column
        assert_eq!(target.rows[0].values[3], Value::Null);
        // appended row got Null in columns it does not carry
        assert_eq!(target.rows[3].values[0], Value::Null);
        assert_eq!(target.rows[3].values[1], Value::Text("delta".to_string()));
        assert_eq!(target.rows[3].values[3], Value::Integer(9));
    }

    #[test]
    fn test_set_column_replaces_existing() {
        let mut frame = create_test_frame();
        frame.set_column(
            "score",
            vec![Value::Integer(0), Value::Integer(0), Value::Integer(0)],
            DataType::Integer,
        );
        assert_eq!(frame.columns.len(), 3);
        assert_eq!(frame.rows[1].values[2], Value::Integer(0));
    }

    #[test]
    fn test_add_constant_column() {
        let mut frame = create_test_frame();
        frame.add_constant_column("region", Value::Text("emea".to_string()));
        assert_eq!(frame.columns.len(), 4);
        for row in &frame.rows {
            assert_eq!(row.values[3], Value::Text("emea".to_string()));
        }
    }

    #[test]
    fn test_retain_preserves_order() {
        let frame = create_test_frame();
        let kept = frame.retain(|r| r.values[0].as_f64().is_some_and(|v| v >= 2.0));
        assert_eq!(kept.rows.len(), 2);
        assert_eq!(kept.rows[0].values[0], Value::Integer(2));
        assert_eq!(kept.rows[1].values[0], Value::Integer(3));
    }
}
