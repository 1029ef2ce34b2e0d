// flowrig/src/plan/cache.rs

use crate::error::ParseError;
use crate::expr::parse;
use crate::plan::compile::compile;
use crate::plan::definition::ExecutionPlan;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

/// One compiled plan per distinct expression text.
///
/// Plans carry no run state, so a cached plan is shared by every run of
/// every flow whose definition has the same text.
#[derive(Debug, Default)]
pub struct PlanCache {
  plans: RwLock<HashMap<String, Arc<ExecutionPlan>>>,
}

impl PlanCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the cached plan for `expression`, compiling it on first use.
  /// Expressions that fail to parse are not cached.
  pub fn get_or_compile(&self, expression: &str) -> Result<Arc<ExecutionPlan>, ParseError> {
    if let Some(plan) = self.plans.read().get(expression) {
      return Ok(Arc::clone(plan));
    }

    let plan = Arc::new(compile(&parse(expression)?));
    event!(Level::DEBUG, expression, units = plan.len(), "Cached newly compiled plan.");
    // Two racing compilations produce equal plans; keep whichever landed first.
    let mut plans = self.plans.write();
    Ok(Arc::clone(plans.entry(expression.to_string()).or_insert(plan)))
  }

  pub fn get(&self, expression: &str) -> Option<Arc<ExecutionPlan>> {
    self.plans.read().get(expression).cloned()
  }

  pub fn len(&self) -> usize {
    self.plans.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.plans.read().is_empty()
  }

  pub fn clear(&self) {
    self.plans.write().clear();
  }
}
