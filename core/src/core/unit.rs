// flowrig/src/core/unit.rs

//! The `Unit` trait implemented by user processing steps, and the
//! `UnitContext` the engine hands to each lifecycle call.

use crate::core::context::{downcast_context, FlowContext};
use crate::core::scope::{fork_key, routing_key, RunScope, STOP_SIGNAL};
use crate::error::FlowError;
use crate::plan::{FALSE_LABEL, TRUE_LABEL};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A named processing step.
///
/// Lifecycle per execution: `before_run` -> `run` -> `after_run`. An error
/// from any of the three fails the unit, after which `on_error` is called
/// best-effort; its own error is logged and dropped.
#[async_trait]
pub trait Unit: Send + Sync {
  fn name(&self) -> &str;

  /// Type tag that listener registrations filter on.
  fn kind(&self) -> &str {
    self.name()
  }

  /// Lets the run keep walking past this unit's failure.
  fn continue_on_error(&self) -> bool {
    false
  }

  async fn before_run(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
    Ok(())
  }

  async fn run(&self, ctx: &UnitContext) -> anyhow::Result<()>;

  async fn after_run(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
    Ok(())
  }

  async fn on_error(&self, _ctx: &UnitContext, _error: &FlowError) -> anyhow::Result<()> {
    Ok(())
  }
}

/// What a unit sees of the run it is part of.
#[derive(Clone)]
pub struct UnitContext {
  unit_id: String,
  scope: RunScope,
  context: Arc<dyn FlowContext>,
}

impl UnitContext {
  pub(crate) fn new(unit_id: impl Into<String>, scope: RunScope, context: Arc<dyn FlowContext>) -> Self {
    Self {
      unit_id: unit_id.into(),
      scope,
      context,
    }
  }

  /// Registry id the unit was executed under.
  pub fn unit_id(&self) -> &str {
    &self.unit_id
  }

  pub fn scope(&self) -> &RunScope {
    &self.scope
  }

  pub fn context(&self) -> &Arc<dyn FlowContext> {
    &self.context
  }

  /// The caller's context as its concrete type.
  pub fn context_as<T: FlowContext + 'static>(&self) -> Option<&T> {
    downcast_context::<T>(self.context.as_ref())
  }

  pub fn request_id(&self) -> Option<u64> {
    self.context.request_id()
  }

  pub fn data<T: std::any::Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
    self.scope.get(key)
  }

  pub fn set_data<T: std::any::Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
    self.scope.set(key, value);
  }

  /// Asks the interpreter to continue at `target`: a condition label or a unit id.
  pub fn route_to(&self, target: impl Into<String>) {
    self.scope.set(routing_key(&self.unit_id), target.into());
  }

  /// Picks the `"true"` or `"false"` arm of the conditional this unit routes.
  pub fn route(&self, condition: bool) {
    self.route_to(if condition { TRUE_LABEL } else { FALSE_LABEL });
  }

  /// Ends the current walk after this unit; the run keeps its success state.
  pub fn stop_flow(&self) {
    self.route_to(STOP_SIGNAL);
  }

  /// Forks the listed units in parallel right after this unit.
  pub fn fork_to<I, S>(&self, branches: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let branches: Vec<String> = branches.into_iter().map(Into::into).collect();
    self.scope.set(fork_key(&self.unit_id), branches);
  }

  /// Branch ids of the parallel group that just joined.
  pub fn completed_branches(&self) -> Vec<String> {
    self.scope.completed_branches()
  }
}

impl std::fmt::Debug for UnitContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UnitContext")
      .field("unit_id", &self.unit_id)
      .field("scope_id", &self.scope.id())
      .field("request_id", &self.context.request_id())
      .finish()
  }
}

/// Async closure run as a unit's `run` hook.
pub type UnitHandler =
  Box<dyn Fn(UnitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// A unit built from a closure, for units with nothing but a `run` body.
pub struct FnUnit {
  name: String,
  kind: Option<String>,
  continue_on_error: bool,
  handler: UnitHandler,
}

impl FnUnit {
  pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
  where
    F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    Self {
      name: name.into(),
      kind: None,
      continue_on_error: false,
      handler: Box::new(move |ctx| Box::pin(handler(ctx))),
    }
  }

  pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
    self.kind = Some(kind.into());
    self
  }

  pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
    self.continue_on_error = continue_on_error;
    self
  }
}

#[async_trait]
impl Unit for FnUnit {
  fn name(&self) -> &str {
    &self.name
  }

  fn kind(&self) -> &str {
    self.kind.as_deref().unwrap_or(&self.name)
  }

  fn continue_on_error(&self) -> bool {
    self.continue_on_error
  }

  async fn run(&self, ctx: &UnitContext) -> anyhow::Result<()> {
    (self.handler)(ctx.clone()).await
  }
}
