/// Persists the final container set: one delimited sheet file per container,
/// keyed by container name, under a destination directory.
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use crate::core::{ContainerStore, EngineError, Frame, Value};

pub struct WorkbookWriter {
    dest: PathBuf,
}

impl WorkbookWriter {
    #[must_use]
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    /// Write every filled container; placeholders are skipped with a
    /// diagnostic.
    pub fn write_store(&self, store: &ContainerStore) -> Result<(), EngineError> {
        fs::create_dir_all(&self.dest)?;
        for (name, frame) in store.iter() {
            match frame {
                Some(f) => {
                    info!("writing sheet '{name}'...");
                    log::debug!("{}", f.preview(5));
                    self.write_sheet(name, f)?;
                }
                None => warn!("nothing to write for container '{name}'"),
            }
        }
        Ok(())
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.dest.join(format!("{name}.csv"))
    }

    fn write_sheet(&self, name: &str, frame: &Frame) -> Result<(), EngineError> {
        let mut file = fs::File::create(self.sheet_path(name))?;
        let header: Vec<String> = frame
            .columns
            .iter()
            .map(|c| escape_field(&c.name))
            .collect();
        writeln!(file, "{}", header.join(","))?;
        for row in &frame.rows {
            let cells: Vec<String> = row.values.iter().map(render_cell).collect();
            writeln!(file, "{}", cells.join(","))?;
        }
        Ok(())
    }
}

/// Non-finite numbers and nulls render empty; floats carry seven decimals.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => {
            if r.is_finite() {
                format!("{r:.7}")
            } else {
                String::new()
            }
        }
        Value::Text(s) => escape_field(s),
        Value::Boolean(b) => b.to_string(),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
