/// Transformation phase: execute declared steps in order against the store.
use log::{info, warn};
use serde_yaml::{Sequence, Value as Yaml};
use crate::core::{ContainerStore, EngineError};
use crate::executor::{Dispatcher, Stage};

pub struct TransformationPhase;

impl TransformationPhase {
    /// Each step is a single-key mapping with key `query` or `calculate`.
    /// Zero or more than one recognized stage key is a fatal configuration
    /// error. Inside a step, operators run in declaration order and each
    /// sub-step reads from the previous sub-step's output container.
    pub fn run(steps: &Sequence, store: &mut ContainerStore) -> Result<(), EngineError> {
        for step in steps {
            let entry = step.as_mapping().ok_or_else(|| {
                EngineError::Config("transformation step must be a mapping".to_string())
            })?;

            let recognized: Vec<(Stage, &Yaml)> = entry
                .iter()
                .filter_map(|(k, v)| {
                    k.as_str().and_then(Stage::from_key).map(|stage| (stage, v))
                })
                .collect();
            let [(stage, body)] = recognized.as_slice() else {
                return Err(EngineError::Config(format!(
                    "step must have exactly one of 'query'/'calculate', found {}",
                    recognized.len()
                )));
            };
            let stage = *stage;
            info!("processing {}...", stage.key());

            let mut body = body
                .as_mapping()
                .ok_or_else(|| {
                    EngineError::Config(format!("'{}' body must be a mapping", stage.key()))
                })?
                .clone();

            let input = pop_container_key(&mut body, "data", stage)?;
            let output = pop_container_key(&mut body, "output", stage)?;

            Dispatcher::filter_operators(stage, &mut body);

            // create the output container if this step diverges the flow
            store.ensure(&output);

            let mut current_input = input;
            for (op_key, params) in &body {
                let Some(operator) = op_key.as_str() else {
                    warn!("operator key {op_key:?} is not a string, dropped");
                    continue;
                };
                info!("performing {operator} on '{current_input}' -> '{output}'");
                Dispatcher::execute(store, stage, operator, params, &current_input, &output)?;
                // subsequent sub-steps work from the output container
                current_input.clone_from(&output);
            }
        }
        Ok(())
    }
}

fn pop_container_key(
    body: &mut serde_yaml::Mapping,
    key: &str,
    stage: Stage,
) -> Result<String, EngineError> {
    match body.remove(key) {
        None => Err(EngineError::Config(format!(
            "'{}' step is missing '{key}'",
            stage.key()
        ))),
        Some(v) => v.as_str().map(String::from).ok_or_else(|| {
            EngineError::Config(format!("'{key}' must name a container"))
        }),
    }
}
