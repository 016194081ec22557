/// Pipeline sequencing: extraction fully completes before any
/// transformation step runs, and everything is strictly sequential over one
/// mutable container store.
pub mod extraction;
pub mod transformation;

use log::info;
use serde_yaml::Value as Yaml;
use crate::core::{ContainerStore, EngineError};
pub use extraction::ExtractionPhase;
pub use transformation::TransformationPhase;

pub const EXTRACTION_KEY: &str = "+extraction";
pub const TRANSFORMATION_KEY: &str = "+transformation";

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Interpret a fully resolved configuration tree against the store.
    pub fn run(doc: &Yaml, store: &mut ContainerStore) -> Result<(), EngineError> {
        if let Some(descriptors) = doc.get(EXTRACTION_KEY) {
            let descriptors = descriptors.as_sequence().ok_or_else(|| {
                EngineError::Config(format!("'{EXTRACTION_KEY}' must be a sequence"))
            })?;
            info!("starting [{EXTRACTION_KEY}]");
            ExtractionPhase::run(descriptors, store)?;
            info!("finished [{EXTRACTION_KEY}]");
        }
        if let Some(steps) = doc.get(TRANSFORMATION_KEY) {
            let steps = steps.as_sequence().ok_or_else(|| {
                EngineError::Config(format!("'{TRANSFORMATION_KEY}' must be a sequence"))
            })?;
            info!("starting [{TRANSFORMATION_KEY}]");
            TransformationPhase::run(steps, store)?;
            info!("finished [{TRANSFORMATION_KEY}]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_phases_is_a_no_op() {
        let doc: Yaml = serde_yaml::from_str("unrelated: 1\n").unwrap();
        let mut store = ContainerStore::new();
        PipelineExecutor::run(&doc, &mut store).unwrap();
        assert!(store.get("primary").is_err());
    }

    #[test]
    fn test_non_sequence_phase_is_fatal() {
        let doc: Yaml = serde_yaml::from_str("+transformation: not a list\n").unwrap();
        let mut store = ContainerStore::new();
        assert!(matches!(
            PipelineExecutor::run(&doc, &mut store),
            Err(EngineError::Config(_))
        ));
    }
}
