/// Calculate-stage operators: column arithmetic producing a new named
/// column on the output container.
///
/// Cells go through the f64 coercion layer; nulls and non-numeric cells
/// become NaN and propagate IEEE-style. Division by zero yields infinity
/// rather than an error.
use log::debug;
use crate::core::{ContainerStore, DataType, EngineError, Value};

pub struct CalcOps;

#[derive(Debug, Clone, Copy)]
enum FoldOp {
    Add,
    Sub,
}

fn cell_as_f64(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

impl CalcOps {
    fn fold(
        store: &mut ContainerStore,
        op: FoldOp,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
        absolute: bool,
    ) -> Result<(), EngineError> {
        if columns.len() < 2 {
            return Err(EngineError::Config(format!(
                "'{name}': column arithmetic needs at least two columns"
            )));
        }
        let mut frame = store.get(input)?.clone();
        let indices: Vec<usize> = columns
            .iter()
            .map(|c| frame.column_index_or_err(c))
            .collect::<Result<Vec<_>, _>>()?;

        let joiner = match op {
            FoldOp::Add => " + ",
            FoldOp::Sub => " - ",
        };
        debug!("computing '{}' on '{}' <- {}", name, output, columns.join(joiner));

        let cells: Vec<Value> = frame
            .rows
            .iter()
            .map(|row| {
                let mut acc = cell_as_f64(&row.values[indices[0]]);
                for &i in &indices[1..] {
                    let v = cell_as_f64(&row.values[i]);
                    acc = match op {
                        FoldOp::Add => acc + v,
                        FoldOp::Sub => acc - v,
                    };
                }
                Value::Real(if absolute { acc.abs() } else { acc })
            })
            .collect();

        frame.set_column(name, cells, DataType::Real);
        store.set(output, frame);
        Ok(())
    }

    /// X1 + X2 + ... left to right.
    pub fn summation(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        Self::fold(store, FoldOp::Add, name, columns, input, output, false)
    }

    /// X1 - X2 - ... left to right.
    pub fn difference(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        Self::fold(store, FoldOp::Sub, name, columns, input, output, false)
    }

    /// |X1 - X2 - ...|
    pub fn absolute_difference(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        Self::fold(store, FoldOp::Sub, name, columns, input, output, true)
    }

    /// (X - Y) / Y over exactly two columns.
    pub fn percentage_difference(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        Self::ratio(store, name, columns, input, output, false)
    }

    /// |(X - Y) / Y|
    pub fn absolute_percentage_difference(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
    ) -> Result<(), EngineError> {
        Self::ratio(store, name, columns, input, output, true)
    }

    fn ratio(
        store: &mut ContainerStore,
        name: &str,
        columns: &[String],
        input: &str,
        output: &str,
        absolute: bool,
    ) -> Result<(), EngineError> {
        if columns.len() != 2 {
            return Err(EngineError::Config(
                "percentage_difference takes exactly two columns".to_string(),
            ));
        }
        let mut frame = store.get(input)?.clone();
        let a = frame.column_index_or_err(&columns[0])?;
        let b = frame.column_index_or_err(&columns[1])?;

        let cells: Vec<Value> = frame
            .rows
            .iter()
            .map(|row| {
                let x = cell_as_f64(&row.values[a]);
                let y = cell_as_f64(&row.values[b]);
                let ratio = (x - y) / y;
                Value::Real(if absolute { ratio.abs() } else { ratio })
            })
            .collect();

        frame.set_column(name, cells, DataType::Real);
        store.set(output, frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Frame, Row};

    fn create_test_store(rows: &[(f64, f64, f64)]) -> ContainerStore {
        let mut frame = Frame::new(vec![
            Column::new("a", DataType::Real),
            Column::new("b", DataType::Real),
            Column::new("c", DataType::Real),
        ]);
        for &(a, b, c) in rows {
            frame
                .push_row(Row::new(vec![
                    Value::Real(a),
                    Value::Real(b),
                    Value::Real(c),
                ]))
                .unwrap();
        }
        let mut store = ContainerStore::new();
        store.set("primary", frame);
        store
    }

    fn column(store: &ContainerStore, container: &str, name: &str) -> Vec<f64> {
        store
            .get(container)
            .unwrap()
            .column_values(name)
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_summation_three_columns() {
        let mut store = create_test_store(&[(1.0, 2.0, 3.0), (10.0, 20.0, 30.0)]);
        CalcOps::summation(
            &mut store,
            "total",
            &["a".to_string(), "b".to_string(), "c".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        assert_eq!(column(&store, "out", "total"), vec![6.0, 60.0]);
    }

    #[test]
    fn test_summation_is_left_associative() {
        let mut store = create_test_store(&[(1.5, 2.5, 4.0)]);
        CalcOps::summation(
            &mut store,
            "ab",
            &["a".to_string(), "b".to_string()],
            "primary",
            "step1",
        )
        .unwrap();
        CalcOps::summation(
            &mut store,
            "abc",
            &["ab".to_string(), "c".to_string()],
            "step1",
            "step2",
        )
        .unwrap();

        let mut direct = create_test_store(&[(1.5, 2.5, 4.0)]);
        CalcOps::summation(
            &mut direct,
            "abc",
            &["a".to_string(), "b".to_string(), "c".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        assert_eq!(column(&store, "step2", "abc"), column(&direct, "out", "abc"));
    }

    #[test]
    fn test_difference_folds_left_to_right() {
        let mut store = create_test_store(&[(10.0, 3.0, 2.0)]);
        CalcOps::difference(
            &mut store,
            "d",
            &["a".to_string(), "b".to_string(), "c".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        assert_eq!(column(&store, "out", "d"), vec![5.0]);
    }

    #[test]
    fn test_absolute_difference() {
        let mut store = create_test_store(&[(3.0, 10.0, 0.0)]);
        CalcOps::absolute_difference(
            &mut store,
            "d",
            &["a".to_string(), "b".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        assert_eq!(column(&store, "out", "d"), vec![7.0]);
    }

    #[test]
    fn test_percentage_difference_matches_difference_over_denominator() {
        let mut store = create_test_store(&[(12.0, 10.0, 0.0), (5.0, 4.0, 0.0)]);
        CalcOps::percentage_difference(
            &mut store,
            "pct",
            &["a".to_string(), "b".to_string()],
            "primary",
            "out",
        )
        .unwrap();

        let mut manual = create_test_store(&[(12.0, 10.0, 0.0), (5.0, 4.0, 0.0)]);
        CalcOps::difference(
            &mut manual,
            "diff",
            &["a".to_string(), "b".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        let diffs = column(&manual, "out", "diff");
        let denoms = column(&manual, "out", "b");
        let expected: Vec<f64> = diffs.iter().zip(&denoms).map(|(d, y)| d / y).collect();
        assert_eq!(column(&store, "out", "pct"), expected);
    }

    #[test]
    fn test_percentage_difference_by_zero_is_infinite() {
        let mut store = create_test_store(&[(5.0, 0.0, 0.0)]);
        CalcOps::percentage_difference(
            &mut store,
            "pct",
            &["a".to_string(), "b".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        assert_eq!(column(&store, "out", "pct"), vec![f64::INFINITY]);
    }

    #[test]
    fn test_percentage_difference_requires_two_columns() {
        let mut store = create_test_store(&[(1.0, 2.0, 3.0)]);
        let err = CalcOps::percentage_difference(
            &mut store,
            "pct",
            &["a".to_string(), "b".to_string(), "c".to_string()],
            "primary",
            "out",
        );
        assert!(matches!(err, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_fold_requires_two_columns() {
        let mut store = create_test_store(&[(1.0, 2.0, 3.0)]);
        let err = CalcOps::summation(&mut store, "s", &["a".to_string()], "primary", "out");
        assert!(matches!(err, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_null_cells_propagate_nan() {
        let mut frame = Frame::new(vec![
            Column::new("a", DataType::Real),
            Column::new("b", DataType::Real),
        ]);
        frame
            .push_row(Row::new(vec![Value::Real(1.0), Value::Null]))
            .unwrap();
        let mut store = ContainerStore::new();
        store.set("primary", frame);
        CalcOps::summation(
            &mut store,
            "s",
            &["a".to_string(), "b".to_string()],
            "primary",
            "out",
        )
        .unwrap();
        let cells = store.get("out").unwrap().column_values("s").unwrap();
        assert!(matches!(cells[0], Value::Real(v) if v.is_nan()));
    }
}
