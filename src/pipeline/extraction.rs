/// Extraction phase: populate the initial containers from declared sources.
use log::{debug, info, warn};
use serde_yaml::{Mapping, Sequence, Value as Yaml};
use crate::core::{ContainerStore, EngineError, Frame, Value, PRIMARY_CONTAINER};
use crate::io::reader::{reader_for, SourceReader};

pub struct ExtractionPhase;

impl ExtractionPhase {
    /// Process each source descriptor in declaration order. A descriptor is
    /// a single-key mapping whose key names the source kind and whose value
    /// holds reader parameters plus the pipeline extras `append` and
    /// `dummycol`.
    pub fn run(descriptors: &Sequence, store: &mut ContainerStore) -> Result<(), EngineError> {
        for descriptor in descriptors {
            let Some(entry) = descriptor.as_mapping() else {
                warn!("extraction entry is not a mapping, skipped");
                continue;
            };
            for (kind_key, params) in entry {
                let Some(kind) = kind_key.as_str() else {
                    warn!("extraction kind {kind_key:?} is not a string, skipped");
                    continue;
                };
                let Some(reader) = reader_for(kind) else {
                    warn!("source kind '{kind}' not recognized, skipped");
                    continue;
                };
                let params = params.as_mapping().ok_or_else(|| {
                    EngineError::Config(format!("source '{kind}' parameters must be a mapping"))
                })?;
                Self::load_source(reader.as_ref(), params, store)?;
            }
        }
        Ok(())
    }

    fn load_source(
        reader: &dyn SourceReader,
        params: &Mapping,
        store: &mut ContainerStore,
    ) -> Result<(), EngineError> {
        let (relevant, extras) = split_params(reader.accepted_keys(), params);
        debug!("reader params: {relevant:?}");
        debug!("extra params: {extras:?}");

        let mut frame = reader.read(&relevant)?;
        frame = prettify_column_names(frame);

        match extras.get("dummycol") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::Mapping(dummycol)) => {
                for (col, val) in dummycol {
                    let (Some(name), Some(value)) = (col.as_str(), scalar_value(val)) else {
                        warn!("dummycol entry {col:?} is not name: scalar, skipped");
                        continue;
                    };
                    frame.add_constant_column(name, value);
                }
            }
            Some(_) => {
                return Err(EngineError::Config(
                    "'dummycol' must be a mapping of column: constant".to_string(),
                ))
            }
        }

        let target = match extras.get("append") {
            None | Some(Yaml::Null) => PRIMARY_CONTAINER.to_string(),
            Some(v) => v.as_str().map(String::from).ok_or_else(|| {
                EngineError::Config("'append' must name a container".to_string())
            })?,
        };

        store.ensure(&target);
        info!(
            "loaded {} rows x {} cols into container '{}'",
            frame.rows.len(),
            frame.columns.len(),
            target
        );
        debug!("{}", frame.preview(5));
        store.merge(&target, frame);
        Ok(())
    }
}

/// Split a source descriptor into the parameters the reader accepts and the
/// pipeline-level extras.
fn split_params(accepted: &[&str], params: &Mapping) -> (Mapping, Mapping) {
    let mut relevant = Mapping::new();
    let mut extras = Mapping::new();
    for (k, v) in params {
        let is_relevant = k.as_str().is_some_and(|name| accepted.contains(&name));
        if is_relevant {
            relevant.insert(k.clone(), v.clone());
        } else {
            extras.insert(k.clone(), v.clone());
        }
    }
    (relevant, extras)
}

fn scalar_value(v: &Yaml) -> Option<Value> {
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

/// Collapse R-export column names: surrounding dots trimmed, runs of dots
/// become single spaces.
fn prettify_column_names(mut frame: Frame) -> Frame {
    for column in &mut frame.columns {
        let cleaned = column
            .name
            .trim_matches('.')
            .replace("...", " ")
            .replace("..", " ")
            .replace('.', " ");
        if cleaned != column.name {
            debug!("column '{}' renamed to '{}'", column.name, cleaned);
            column.name = cleaned;
        }
    }
    frame
}
