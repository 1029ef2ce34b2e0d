// flowrig/src/core/context.rs

//! The caller-supplied `FlowContext` handed to every unit of a run.
//!
//! The engine only ever reads the continuation policy from a context; the
//! payload belongs to the caller and its units. Units recover the concrete
//! type with `UnitContext::context_as::<T>()`.

use crate::core::context_data::ContextData;
use std::any::Any;

/// Type-erasure helper so a `dyn FlowContext` can be downcast.
pub trait AsAny {
  fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// User-defined context passed by the caller into a flow run.
pub trait FlowContext: AsAny + Send + Sync {
  /// Caller-assigned request identifier, used for log correlation.
  fn request_id(&self) -> Option<u64> {
    None
  }

  /// When `true`, the run keeps walking after a unit fails.
  /// The failure is still the run's terminal result.
  fn continue_on_error(&self) -> bool {
    false
  }
}

/// Downcasts a type-erased context to its concrete type.
pub(crate) fn downcast_context<T: FlowContext + 'static>(ctx: &dyn FlowContext) -> Option<&T> {
  ctx.as_any().downcast_ref::<T>()
}

/// Context with no payload; what `FlowExecutor::execute_default` runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultFlowContext {
  request_id: Option<u64>,
  continue_on_error: bool,
}

impl DefaultFlowContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_request_id(mut self, request_id: u64) -> Self {
    self.request_id = Some(request_id);
    self
  }

  pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
    self.continue_on_error = continue_on_error;
    self
  }
}

impl FlowContext for DefaultFlowContext {
  fn request_id(&self) -> Option<u64> {
    self.request_id
  }

  fn continue_on_error(&self) -> bool {
    self.continue_on_error
  }
}

/// Context carrying a shared, mutable payload of type `T`.
///
/// The payload sits in a `ContextData<T>`, so units on parallel branches can
/// update it concurrently and the caller reads the final state from the
/// handle it kept (or from `RunResult::context_as`).
#[derive(Debug)]
pub struct PayloadContext<T: Send + Sync + 'static> {
  request_id: Option<u64>,
  continue_on_error: bool,
  data: ContextData<T>,
}

impl<T: Send + Sync + 'static> PayloadContext<T> {
  pub fn new(payload: T) -> Self {
    Self::from_data(ContextData::new(payload))
  }

  /// Wraps an existing handle; the caller keeps its own clone to inspect the payload afterwards.
  pub fn from_data(data: ContextData<T>) -> Self {
    Self {
      request_id: None,
      continue_on_error: false,
      data,
    }
  }

  pub fn with_request_id(mut self, request_id: u64) -> Self {
    self.request_id = Some(request_id);
    self
  }

  pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
    self.continue_on_error = continue_on_error;
    self
  }

  pub fn data(&self) -> &ContextData<T> {
    &self.data
  }
}

impl<T: Send + Sync + 'static> FlowContext for PayloadContext<T> {
  fn request_id(&self) -> Option<u64> {
    self.request_id
  }

  fn continue_on_error(&self) -> bool {
    self.continue_on_error
  }
}
