// flowrig/src/core/control.rs

//! Outcome of a flow run.

use crate::core::context::{downcast_context, FlowContext};
use crate::core::scope::RunScope;
use crate::error::FlowError;
use std::sync::Arc;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  /// The walk reached the end of the plan with no failure recorded.
  Completed,
  /// A unit raised the stop signal; everything before it succeeded.
  Stopped,
  /// At least one unit failed, or the run could not start.
  Failed,
}

/// What the caller gets back from every entry point. Failures are captured
/// here instead of being returned as `Err`.
pub struct RunResult {
  status: RunStatus,
  error: Option<FlowError>,
  executed: Vec<String>,
  scope: RunScope,
  context: Arc<dyn FlowContext>,
}

impl RunResult {
  pub(crate) fn new(
    status: RunStatus,
    error: Option<FlowError>,
    executed: Vec<String>,
    scope: RunScope,
    context: Arc<dyn FlowContext>,
  ) -> Self {
    Self {
      status,
      error,
      executed,
      scope,
      context,
    }
  }

  pub(crate) fn failed(error: FlowError, scope: RunScope, context: Arc<dyn FlowContext>) -> Self {
    Self::new(RunStatus::Failed, Some(error), Vec::new(), scope, context)
  }

  /// `true` for `Completed` and `Stopped`.
  pub fn is_success(&self) -> bool {
    self.status != RunStatus::Failed
  }

  pub fn status(&self) -> RunStatus {
    self.status
  }

  /// Display text of the terminal error.
  pub fn message(&self) -> Option<String> {
    self.error.as_ref().map(|e| e.to_string())
  }

  pub fn error(&self) -> Option<&FlowError> {
    self.error.as_ref()
  }

  pub fn into_error(self) -> Option<FlowError> {
    self.error
  }

  /// Unit names in the order their `before_run` succeeded.
  pub fn executed_units(&self) -> &[String] {
    &self.executed
  }

  pub fn scope(&self) -> &RunScope {
    &self.scope
  }

  pub fn context(&self) -> &Arc<dyn FlowContext> {
    &self.context
  }

  pub fn context_as<T: FlowContext + 'static>(&self) -> Option<&T> {
    downcast_context::<T>(self.context.as_ref())
  }

  pub fn duration(&self) -> chrono::Duration {
    self.scope.duration()
  }
}

impl std::fmt::Debug for RunResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunResult")
      .field("status", &self.status)
      .field("error", &self.error)
      .field("executed", &self.executed)
      .field("scope_id", &self.scope.id())
      .field("request_id", &self.context.request_id())
      .finish()
  }
}
