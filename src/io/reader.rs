/// Flat-file readers feeding the extraction phase.
///
/// A reader advertises the parameter keys it accepts so the extraction layer
/// can split a source descriptor into reader parameters and pipeline extras.
use serde_yaml::{Mapping, Value as Yaml};
use std::fs;
use std::path::Path;
use crate::core::{Column, DataType, EngineError, Frame, Row, Value};

pub trait SourceReader {
    /// Parameter keys this reader understands; everything else in a source
    /// descriptor is a pipeline-level extra.
    fn accepted_keys(&self) -> &'static [&'static str];

    fn read(&self, params: &Mapping) -> Result<Frame, EngineError>;
}

/// Pick a reader from the descriptor kind. The kind key must carry a
/// substring identifying the source family.
pub fn reader_for(kind: &str) -> Option<Box<dyn SourceReader>> {
    if kind.contains("csv") {
        Some(Box::new(DelimitedReader))
    } else if kind.contains("excel") {
        Some(Box::new(SpreadsheetReader))
    } else {
        None
    }
}

/// Delimited text files. Parameters mirror the usual flat-file knobs:
/// `filepath` (required), `sep`, `header` (row index, null for none),
/// `skiprows`, `skipfooter`, `usecols`, `na_values`, `names`.
pub struct DelimitedReader;

impl SourceReader for DelimitedReader {
    fn accepted_keys(&self) -> &'static [&'static str] {
        &[
            "filepath",
            "sep",
            "header",
            "skiprows",
            "skipfooter",
            "usecols",
            "na_values",
            "names",
        ]
    }

    fn read(&self, params: &Mapping) -> Result<Frame, EngineError> {
        let filepath = params
            .get("filepath")
            .and_then(Yaml::as_str)
            .ok_or_else(|| EngineError::Config("reader needs a 'filepath'".to_string()))?;
        let sep = params
            .get("sep")
            .and_then(Yaml::as_str)
            .and_then(|s| s.chars().next())
            .unwrap_or(',');
        let header = match params.get("header") {
            None => Some(0),
            Some(Yaml::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| {
                EngineError::Config("'header' must be a row index or null".to_string())
            })? as usize),
        };
        let skiprows = opt_usize(params, "skiprows")?.unwrap_or(0);
        let skipfooter = opt_usize(params, "skipfooter")?.unwrap_or(0);
        let usecols = params.get("usecols").and_then(string_list);
        let na_values = params.get("na_values").and_then(string_list).unwrap_or_default();
        let names = params.get("names").and_then(string_list);

        read_delimited(
            Path::new(filepath),
            sep,
            header,
            skiprows,
            skipfooter,
            usecols.as_deref(),
            &na_values,
            names.as_deref(),
        )
    }
}

/// Spreadsheet workbooks are a recognized source kind, but no codec is
/// wired in; reading one fails the run.
pub struct SpreadsheetReader;

impl SourceReader for SpreadsheetReader {
    fn accepted_keys(&self) -> &'static [&'static str] {
        &["filepath", "sheet_name", "header", "skiprows", "skipfooter", "names"]
    }

    fn read(&self, params: &Mapping) -> Result<Frame, EngineError> {
        let filepath = params
            .get("filepath")
            .and_then(Yaml::as_str)
            .unwrap_or("<missing filepath>");
        Err(EngineError::UnsupportedSource(format!(
            "spreadsheet '{filepath}'"
        )))
    }
}

fn opt_usize(params: &Mapping, key: &str) -> Result<Option<usize>, EngineError> {
    match params.get(key) {
        None | Some(Yaml::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                EngineError::Config(format!("'{key}' must be a non-negative integer"))
            }),
    }
}

fn string_list(v: &Yaml) -> Option<Vec<String>> {
    match v {
        Yaml::String(s) => Some(vec![s.clone()]),
        Yaml::Sequence(seq) => seq
            .iter()
            .map(|x| x.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

/// Split one line on the separator, honoring double quotes with `""`
/// escapes.
fn split_line(line: &str, sep: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.is_empty() {
            quoted = true;
        } else if c == sep {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}

fn infer_column_type(cells: &[Option<&str>]) -> DataType {
    let filled: Vec<&str> = cells.iter().filter_map(|c| *c).collect();
    if filled.is_empty() {
        return DataType::Text;
    }
    if filled.iter().all(|s| s.trim().parse::<i64>().is_ok()) {
        DataType::Integer
    } else if filled.iter().all(|s| s.trim().parse::<f64>().is_ok()) {
        DataType::Real
    } else if filled.iter().all(|s| matches!(*s, "true" | "false" | "True" | "False")) {
        DataType::Boolean
    } else {
        DataType::Text
    }
}

fn cell_value(raw: Option<&str>, data_type: DataType) -> Value {
    let Some(s) = raw else {
        return Value::Null;
    };
    match data_type {
        DataType::Integer => s
            .trim()
            .parse::<i64>()
            .map_or(Value::Null, Value::Integer),
        DataType::Real => s.trim().parse::<f64>().map_or(Value::Null, Value::Real),
        DataType::Boolean => match s {
            "true" | "True" => Value::Boolean(true),
            "false" | "False" => Value::Boolean(false),
            _ => Value::Null,
        },
        DataType::Text => Value::Text(s.to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
fn read_delimited(
    path: &Path,
    sep: char,
    header: Option<usize>,
    skiprows: usize,
    skipfooter: usize,
    usecols: Option<&[String]>,
    na_values: &[String],
    names: Option<&[String]>,
) -> Result<Frame, EngineError> {
    let text = fs::read_to_string(path)?;
    let mut lines: Vec<&str> = text.lines().skip(skiprows).collect();
    lines.truncate(lines.len().saturating_sub(skipfooter));

    let (column_names, data_lines): (Vec<String>, &[&str]) = match header {
        Some(h) => {
            let header_line = lines.get(h).ok_or_else(|| {
                EngineError::Config(format!("header row {h} beyond end of {}", path.display()))
            })?;
            let parsed = split_line(header_line, sep);
            (parsed, &lines[h + 1..])
        }
        None => {
            let width = lines.first().map_or(0, |l| split_line(l, sep).len());
            ((0..width).map(|i| format!("col{i}")).collect(), &lines[..])
        }
    };

    let column_names: Vec<String> = match names {
        Some(given) => {
            if given.len() != column_names.len() {
                return Err(EngineError::Config(format!(
                    "'names' gives {} columns, file has {}",
                    given.len(),
                    column_names.len()
                )));
            }
            given.to_vec()
        }
        None => column_names,
    };

    // raw cells, with empties and na_values as missing
    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::with_capacity(data_lines.len());
    for line in data_lines {
        if line.is_empty() {
            continue;
        }
        let fields = split_line(line, sep);
        let row: Vec<Option<String>> = (0..column_names.len())
            .map(|i| match fields.get(i) {
                None => None,
                Some(f) if f.is_empty() || na_values.iter().any(|na| na == f) => None,
                Some(f) => Some(f.clone()),
            })
            .collect();
        raw_rows.push(row);
    }

    let keep: Vec<usize> = match usecols {
        None => (0..column_names.len()).collect(),
        Some(wanted) => wanted
            .iter()
            .map(|w| {
                column_names
                    .iter()
                    .position(|c| c == w)
                    .ok_or_else(|| EngineError::ColumnNotFound(w.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut columns = Vec::with_capacity(keep.len());
    let mut types = Vec::with_capacity(keep.len());
    for &i in &keep {
        let cells: Vec<Option<&str>> = raw_rows.iter().map(|r| r[i].as_deref()).collect();
        let data_type = infer_column_type(&cells);
        columns.push(Column::new(column_names[i].clone(), data_type));
        types.push(data_type);
    }

    let mut frame = Frame::new(columns);
    for raw in &raw_rows {
        let values = keep
            .iter()
            .zip(&types)
            .map(|(&i, &t)| cell_value(raw[i].as_deref(), t))
            .collect();
        frame.push_row(Row::new(values))?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn params(pairs: &[(&str, Yaml)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| (Yaml::String((*k).to_string()), v.clone()))
            .collect()
    }

    #[test]
    fn test_read_basic_csv() {
        let file = write_source("id,name,score\n1,alpha,3.5\n2,beta,1.0\n");
        let p = params(&[("filepath", Yaml::String(
            file.path().to_string_lossy().into_owned(),
        ))]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.columns.len(), 3);
        assert_eq!(frame.columns[0].data_type, DataType::Integer);
        assert_eq!(frame.columns[1].data_type, DataType::Text);
        assert_eq!(frame.columns[2].data_type, DataType::Real);
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[1].values[1], Value::Text("beta".to_string()));
    }

    #[test]
    fn test_custom_separator_and_footer() {
        let file = write_source("a|b\n1|2\n3|4\ntrailer line\n");
        let p = params(&[
            ("filepath", Yaml::String(file.path().to_string_lossy().into_owned())),
            ("sep", Yaml::String("|".to_string())),
            ("skipfooter", Yaml::Number(1.into())),
        ]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[1].values[0], Value::Integer(3));
    }

    #[test]
    fn test_skiprows_before_header() {
        let file = write_source("junk\na,b\n1,2\n");
        let p = params(&[
            ("filepath", Yaml::String(file.path().to_string_lossy().into_owned())),
            ("skiprows", Yaml::Number(1.into())),
        ]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.columns[0].name, "a");
        assert_eq!(frame.rows.len(), 1);
    }

    #[test]
    fn test_na_values_and_empties_become_null() {
        let file = write_source("v\nNA\n\n7\n");
        let p = params(&[
            ("filepath", Yaml::String(file.path().to_string_lossy().into_owned())),
            ("na_values", Yaml::Sequence(vec![Yaml::String("NA".to_string())])),
        ]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].values[0], Value::Null);
        assert_eq!(frame.rows[1].values[0], Value::Integer(7));
    }

    #[test]
    fn test_usecols_projects() {
        let file = write_source("a,b,c\n1,2,3\n");
        let p = params(&[
            ("filepath", Yaml::String(file.path().to_string_lossy().into_owned())),
            (
                "usecols",
                Yaml::Sequence(vec![
                    Yaml::String("c".to_string()),
                    Yaml::String("a".to_string()),
                ]),
            ),
        ]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.columns[0].name, "c");
        assert_eq!(frame.columns[1].name, "a");
    }

    #[test]
    fn test_quoted_fields() {
        let file = write_source("a,b\n\"x, y\",\"he said \"\"hi\"\"\"\n");
        let p = params(&[("filepath", Yaml::String(
            file.path().to_string_lossy().into_owned(),
        ))]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.rows[0].values[0], Value::Text("x, y".to_string()));
        assert_eq!(
            frame.rows[0].values[1],
            Value::Text("he said \"hi\"".to_string())
        );
    }

    #[test]
    fn test_names_override() {
        let file = write_source("a,b\n1,2\n");
        let p = params(&[
            ("filepath", Yaml::String(file.path().to_string_lossy().into_owned())),
            (
                "names",
                Yaml::Sequence(vec![
                    Yaml::String("left".to_string()),
                    Yaml::String("right".to_string()),
                ]),
            ),
        ]);
        let frame = DelimitedReader.read(&p).unwrap();
        assert_eq!(frame.columns[0].name, "left");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let p = params(&[("filepath", Yaml::String("/no/such/file.csv".to_string()))]);
        assert!(matches!(
            DelimitedReader.read(&p),
            Err(EngineError::Io(_))
        ));
    }

    #[test]
    fn test_spreadsheet_kind_is_recognized_but_unsupported() {
        assert!(reader_for("config_excel").is_some());
        let p = params(&[("filepath", Yaml::String("book.xlsx".to_string()))]);
        assert!(matches!(
            SpreadsheetReader.read(&p),
            Err(EngineError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_none() {
        assert!(reader_for("config_parquet").is_none());
    }
}
