use log::{debug, info};
use std::collections::HashMap;
use super::error::EngineError;
use super::frame::Frame;

/// Owns the mapping from container name to dataset. A name can be present as
/// a placeholder (declared but never filled), which readers treat the same as
/// absent content. Insertion order is tracked so that writer output and
/// reports are deterministic.
#[derive(Debug, Default)]
pub struct ContainerStore {
    slots: HashMap<String, Option<Frame>>,
    order: Vec<String>,
}

pub const PRIMARY_CONTAINER: &str = "primary";

impl ContainerStore {
    /// A fresh store with the default `primary` placeholder declared.
    #[must_use]
    pub fn new() -> Self {
        let mut store = Self::default();
        store.ensure(PRIMARY_CONTAINER);
        store
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Content of a container. Absent names and unfilled placeholders are
    /// both errors: an operator's input must exist with content.
    pub fn get(&self, name: &str) -> Result<&Frame, EngineError> {
        match self.slots.get(name) {
            None => Err(EngineError::ContainerNotFound(name.to_string())),
            Some(None) => Err(EngineError::ContainerEmpty(name.to_string())),
            Some(Some(frame)) => Ok(frame),
        }
    }

    pub fn set(&mut self, name: &str, frame: Frame) {
        if !self.slots.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.slots.insert(name.to_string(), Some(frame));
    }

    /// Declare a container, creating an empty placeholder if absent.
    pub fn ensure(&mut self, name: &str) {
        if !self.slots.contains_key(name) {
            self.order.push(name.to_string());
            self.slots.insert(name.to_string(), None);
        }
    }

    /// Concatenate rows of `frame` onto an existing, filled container.
    pub fn append(&mut self, target: &str, frame: &Frame) -> Result<(), EngineError> {
        match self.slots.get_mut(target) {
            None => Err(EngineError::ContainerNotFound(target.to_string())),
            Some(None) => Err(EngineError::ContainerEmpty(target.to_string())),
            Some(Some(existing)) => {
                existing.append_frame(frame);
                Ok(())
            }
        }
    }

    /// Extraction-side merge: fill a placeholder, or append onto existing
    /// content. Declares the name if it was never referenced before.
    pub fn merge(&mut self, name: &str, frame: Frame) {
        if !self.slots.contains_key(name) {
            self.order.push(name.to_string());
        }
        match self.slots.entry(name.to_string()).or_insert(None) {
            slot @ None => {
                debug!("filling empty container '{name}'");
                *slot = Some(frame);
            }
            Some(existing) => {
                debug!("appending to filled container '{name}'");
                existing.append_frame(&frame);
            }
        }
    }

    /// Container names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// (name, content) pairs in declaration order; placeholders yield None.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Frame>)> {
        self.order
            .iter()
            .map(|n| (n.as_str(), self.slots[n].as_ref()))
    }

    /// Log the dimensions and estimated footprint of every container.
    pub fn memory_report(&self) {
        let mut total = 0usize;
        for (name, frame) in self.iter() {
            match frame {
                Some(f) => {
                    let bytes = f.estimated_bytes();
                    total += bytes;
                    info!(
                        "container '{}': {} rows x {} cols, ~{:.2} Mb",
                        name,
                        f.rows.len(),
                        f.columns.len(),
                        bytes as f64 / (1 << 20) as f64
                    );
                }
                None => info!("container '{name}': empty placeholder"),
            }
        }
        info!("container store total: ~{:.2} Mb", total as f64 / (1 << 20) as f64);
    }
}
