// flowrig/src/registry.rs

//! Where the executor looks up flow definitions and units.
//!
//! The engine only reads from a registry. Registries are injected into the
//! executor, so tests and embedders can each build their own.

use crate::core::unit::Unit;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

pub trait FlowRegistry: Send + Sync {
  /// Expression text of `flow_id`.
  fn flow_definition(&self, flow_id: &str) -> Option<String>;

  fn unit(&self, unit_id: &str) -> Option<Arc<dyn Unit>>;
}

/// Thread-safe, in-process registry.
#[derive(Default)]
pub struct InMemoryRegistry {
  flows: RwLock<HashMap<String, String>>,
  units: RwLock<HashMap<String, Arc<dyn Unit>>>,
}

impl InMemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers or replaces a flow. Returns the previous definition.
  pub fn register_flow(&self, flow_id: impl Into<String>, expression: impl Into<String>) -> Option<String> {
    let flow_id = flow_id.into();
    event!(Level::DEBUG, flow_id = %flow_id, "Registering flow.");
    self.flows.write().insert(flow_id, expression.into())
  }

  /// Registers `unit` under its own name.
  pub fn register_unit<U: Unit + 'static>(&self, unit: U) -> Option<Arc<dyn Unit>> {
    let unit: Arc<dyn Unit> = Arc::new(unit);
    let unit_id = unit.name().to_string();
    self.register_shared_unit(unit_id, unit)
  }

  /// Registers a shared unit under an explicit id, which may differ from its name.
  pub fn register_shared_unit(&self, unit_id: impl Into<String>, unit: Arc<dyn Unit>) -> Option<Arc<dyn Unit>> {
    let unit_id = unit_id.into();
    event!(Level::DEBUG, unit_id = %unit_id, kind = unit.kind(), "Registering unit.");
    self.units.write().insert(unit_id, unit)
  }

  pub fn remove_flow(&self, flow_id: &str) -> Option<String> {
    self.flows.write().remove(flow_id)
  }

  pub fn remove_unit(&self, unit_id: &str) -> Option<Arc<dyn Unit>> {
    self.units.write().remove(unit_id)
  }

  pub fn has_flow(&self, flow_id: &str) -> bool {
    self.flows.read().contains_key(flow_id)
  }

  pub fn has_unit(&self, unit_id: &str) -> bool {
    self.units.read().contains_key(unit_id)
  }

  /// Sorted.
  pub fn flow_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.flows.read().keys().cloned().collect();
    ids.sort();
    ids
  }

  /// Sorted.
  pub fn unit_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.units.read().keys().cloned().collect();
    ids.sort();
    ids
  }

  pub fn flow_count(&self) -> usize {
    self.flows.read().len()
  }

  pub fn unit_count(&self) -> usize {
    self.units.read().len()
  }

  /// Drops every flow and unit.
  pub fn clear(&self) {
    self.flows.write().clear();
    self.units.write().clear();
  }
}

impl FlowRegistry for InMemoryRegistry {
  fn flow_definition(&self, flow_id: &str) -> Option<String> {
    self.flows.read().get(flow_id).cloned()
  }

  fn unit(&self, unit_id: &str) -> Option<Arc<dyn Unit>> {
    self.units.read().get(unit_id).cloned()
  }
}

impl std::fmt::Debug for InMemoryRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InMemoryRegistry")
      .field("flows", &self.flow_ids())
      .field("units", &self.unit_ids())
      .finish()
  }
}
