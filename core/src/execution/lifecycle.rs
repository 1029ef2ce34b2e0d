// flowrig/src/execution/lifecycle.rs

//! `Run::execute_unit`: one unit's `before_run -> run -> after_run`, with
//! listener call sites and error capture around it.

use crate::core::unit::{Unit, UnitContext};
use crate::error::{FlowError, LifecyclePhase};
use crate::execution::hooks::{ListenerPhase, UnitEvent};
use crate::execution::walk::Run;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{event, Level};

/// A unit that failed, and whether the walk may go on past it.
#[derive(Debug)]
pub(crate) struct UnitFailure {
  pub error: FlowError,
  pub continue_on_error: bool,
}

macro_rules! step_event {
  ($verbose:expr, $($arg:tt)+) => {
    if $verbose {
      event!(Level::INFO, $($arg)+);
    } else {
      event!(Level::DEBUG, $($arg)+);
    }
  };
}

impl Run {
  /// Runs one unit's lifecycle. With `pooled`, the lifecycle holds a worker pool permit.
  pub(crate) async fn execute_unit(&self, unit_id: &str, pooled: bool) -> Result<(), UnitFailure> {
    let unit = self.engine.registry.unit(unit_id).ok_or_else(|| {
      event!(Level::ERROR, unit_id, "Unit not found in registry.");
      UnitFailure {
        error: FlowError::UnitNotFound {
          unit_id: unit_id.to_string(),
        },
        continue_on_error: false,
      }
    })?;

    let _permit = if pooled {
      match self.engine.pool.acquire().await {
        Ok(permit) => Some(permit),
        Err(error) => {
          return Err(UnitFailure {
            error,
            continue_on_error: false,
          })
        }
      }
    } else {
      None
    };

    self.scope.clear_signals(unit_id);
    let ctx = UnitContext::new(unit_id, self.scope.clone(), Arc::clone(&self.context));
    let verbose = self.engine.config.print_execution_log;
    step_event!(verbose, unit_id, scope_id = self.scope.id(), "Executing unit.");

    match self.lifecycle(unit.as_ref(), &ctx).await {
      Ok(()) => {
        step_event!(verbose, unit_id, scope_id = self.scope.id(), "Unit completed.");
        Ok(())
      }
      Err(error) => {
        event!(Level::ERROR, unit_id, scope_id = self.scope.id(), error = %error, "Unit failed.");
        if let Err(hook_error) = guarded(unit_id, LifecyclePhase::Run, unit.on_error(&ctx, &error)).await {
          event!(Level::WARN, unit_id, error = %hook_error, "on_error hook failed; ignoring.");
        }
        self.notify(ListenerPhase::Error, unit_id, unit.as_ref(), Some(&error));
        Err(UnitFailure {
          continue_on_error: unit.continue_on_error(),
          error,
        })
      }
    }
  }

  async fn lifecycle(&self, unit: &dyn Unit, ctx: &UnitContext) -> Result<(), FlowError> {
    let unit_id = ctx.unit_id();
    guarded(unit_id, LifecyclePhase::BeforeRun, unit.before_run(ctx)).await?;
    self.notify(ListenerPhase::Before, unit_id, unit, None);
    self.record_executed(unit_id, unit.name());

    guarded(unit_id, LifecyclePhase::Run, unit.run(ctx)).await?;
    guarded(unit_id, LifecyclePhase::AfterRun, unit.after_run(ctx)).await?;
    self.notify(ListenerPhase::After, unit_id, unit, None);
    Ok(())
  }

  fn notify(&self, phase: ListenerPhase, unit_id: &str, unit: &dyn Unit, error: Option<&FlowError>) {
    self.engine.listeners.notify(&UnitEvent {
      phase,
      unit_id,
      unit_kind: unit.kind(),
      scope: &self.scope,
      context: self.context.as_ref(),
      error,
    });
  }
}

/// Awaits one lifecycle call, turning both errors and panics into `UnitExecution`.
async fn guarded<F>(unit_id: &str, phase: LifecyclePhase, call: F) -> Result<(), FlowError>
where
  F: Future<Output = anyhow::Result<()>>,
{
  match AssertUnwindSafe(call).catch_unwind().await {
    Ok(Ok(())) => Ok(()),
    Ok(Err(source)) => Err(FlowError::UnitExecution {
      unit_id: unit_id.to_string(),
      phase,
      source,
    }),
    Err(panic) => Err(FlowError::UnitExecution {
      unit_id: unit_id.to_string(),
      phase,
      source: anyhow::anyhow!("unit panicked: {}", panic_message(panic.as_ref())),
    }),
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
