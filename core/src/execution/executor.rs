// flowrig/src/execution/executor.rs

//! `FlowExecutor`: the entry points of the engine.
//!
//! Every entry point returns a `RunResult`; nothing is thrown across this
//! boundary. An executor owns one worker pool, one plan cache and one set
//! of listeners, shared by all the runs it drives.

use crate::config::EngineConfig;
use crate::core::context::{DefaultFlowContext, FlowContext};
use crate::core::control::{RunResult, RunStatus};
use crate::core::scope::RunScope;
use crate::error::{FlowError, FlowResult};
use crate::execution::hooks::{ListenerPhase, ListenerTarget, Listeners, UnitEvent};
use crate::execution::pool::WorkerPool;
use crate::execution::walk::Run;
use crate::plan::{ExecutionPlan, PlanCache};
use crate::registry::FlowRegistry;
use std::sync::Arc;
use tracing::{event, instrument, Level, Span};

pub(crate) struct ExecutorInner {
  pub(crate) registry: Arc<dyn FlowRegistry>,
  pub(crate) listeners: Listeners,
  pub(crate) pool: WorkerPool,
  pub(crate) plans: PlanCache,
  pub(crate) config: EngineConfig,
}

#[derive(Clone)]
pub struct FlowExecutor {
  inner: Arc<ExecutorInner>,
}

impl FlowExecutor {
  /// Executor with the default configuration.
  pub fn new(registry: Arc<dyn FlowRegistry>) -> Self {
    Self::from_parts(registry, EngineConfig::default(), Listeners::new())
  }

  /// Fails with `FlowError::Disabled` when `config.enabled` is false.
  pub fn with_config(registry: Arc<dyn FlowRegistry>, config: EngineConfig) -> FlowResult<Self> {
    if !config.enabled {
      return Err(FlowError::Disabled);
    }
    Ok(Self::from_parts(registry, config, Listeners::new()))
  }

  pub fn builder() -> FlowExecutorBuilder {
    FlowExecutorBuilder::default()
  }

  fn from_parts(registry: Arc<dyn FlowRegistry>, config: EngineConfig, listeners: Listeners) -> Self {
    event!(
      Level::DEBUG,
      worker_pool_size = config.worker_pool_size,
      scope_pool_hint = config.scope_pool_hint,
      "Building flow executor."
    );
    Self {
      inner: Arc::new(ExecutorInner {
        registry,
        listeners,
        pool: WorkerPool::new(config.worker_pool_size),
        plans: PlanCache::new(),
        config,
      }),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.inner.config
  }

  pub fn registry(&self) -> &Arc<dyn FlowRegistry> {
    &self.inner.registry
  }

  pub fn listeners(&self) -> &Listeners {
    &self.inner.listeners
  }

  pub fn pool(&self) -> &WorkerPool {
    &self.inner.pool
  }

  pub fn plans(&self) -> &PlanCache {
    &self.inner.plans
  }

  /// Parses and compiles `expression`, reusing the cached plan when there is one.
  pub fn compile(&self, expression: &str) -> FlowResult<Arc<ExecutionPlan>> {
    Ok(self.inner.plans.get_or_compile(expression)?)
  }

  /// Runs the flow registered under `flow_id` with `context`.
  pub async fn execute<C: FlowContext + 'static>(&self, flow_id: &str, context: C) -> RunResult {
    self.execute_shared(flow_id, Arc::new(context)).await
  }

  /// Runs `flow_id` with a `DefaultFlowContext`.
  pub async fn execute_default(&self, flow_id: &str) -> RunResult {
    self.execute(flow_id, DefaultFlowContext::default()).await
  }

  #[instrument(
    name = "FlowExecutor::execute",
    skip_all,
    fields(flow_id = %flow_id, scope_id = tracing::field::Empty, request_id = ?context.request_id())
  )]
  pub async fn execute_shared(&self, flow_id: &str, context: Arc<dyn FlowContext>) -> RunResult {
    let scope = self.open_scope();
    Span::current().record("scope_id", scope.id());

    let expression = match self.inner.registry.flow_definition(flow_id) {
      Some(expression) => expression,
      None => {
        event!(Level::ERROR, "Flow not found in registry.");
        return self.fail_early(
          FlowError::FlowNotFound {
            flow_id: flow_id.to_string(),
          },
          scope,
          context,
        );
      }
    };

    let plan = match self.compile(&expression) {
      Ok(plan) => plan,
      Err(error) => {
        event!(Level::ERROR, error = %error, "Flow definition failed to compile.");
        return self.fail_early(error, scope, context);
      }
    };

    self.drive(plan, scope, context).await
  }

  /// Runs an already compiled plan.
  #[instrument(name = "FlowExecutor::execute_plan", skip_all, fields(units = plan.len()))]
  pub async fn execute_plan<C: FlowContext + 'static>(&self, plan: Arc<ExecutionPlan>, context: C) -> RunResult {
    let scope = self.open_scope();
    self.drive(plan, scope, Arc::new(context)).await
  }

  /// Runs a single unit through the same lifecycle, without a plan.
  #[instrument(name = "FlowExecutor::execute_unit", skip_all, fields(unit_id = %unit_id))]
  pub async fn execute_unit<C: FlowContext + 'static>(&self, unit_id: &str, context: C) -> RunResult {
    let context: Arc<dyn FlowContext> = Arc::new(context);
    let scope = self.open_scope();
    if let Err(error) = self.ensure_open() {
      return self.fail_early(error, scope, context);
    }

    let run = Run::new(Arc::clone(&self.inner), scope.clone(), Arc::clone(&context));
    let outcome = run.execute_unit(unit_id, false).await;
    scope.finish();
    let (status, error) = match outcome {
      Ok(()) => match scope.take_routing_signal(unit_id).as_deref() {
        Some(crate::core::scope::STOP_SIGNAL) => (RunStatus::Stopped, None),
        _ => (RunStatus::Completed, None),
      },
      Err(failure) => (RunStatus::Failed, Some(failure.error)),
    };
    RunResult::new(status, error, run.executed_names(), scope, context)
  }

  /// Closes the worker pool, draining branch tasks for up to the configured grace period.
  pub async fn shutdown(&self) -> bool {
    self.inner.pool.shutdown(self.inner.config.shutdown_grace).await
  }

  async fn drive(&self, plan: Arc<ExecutionPlan>, scope: RunScope, context: Arc<dyn FlowContext>) -> RunResult {
    if let Err(error) = self.ensure_open() {
      return self.fail_early(error, scope, context);
    }

    let run = Run::new(Arc::clone(&self.inner), scope.clone(), Arc::clone(&context));
    let walk = run.clone().walk(plan, false).await;
    scope.finish();

    let status = match (&walk.failure, walk.stopped) {
      (Some(_), _) => RunStatus::Failed,
      (None, true) => RunStatus::Stopped,
      (None, false) => RunStatus::Completed,
    };
    let executed = run.executed_names();
    if self.inner.config.print_execution_log {
      event!(
        Level::INFO,
        status = ?status,
        executed = %executed.join(" -> "),
        elapsed_ms = scope.duration().num_milliseconds(),
        "Flow run finished."
      );
    } else {
      event!(Level::DEBUG, status = ?status, "Flow run finished.");
    }
    RunResult::new(status, walk.failure, executed, scope, context)
  }

  fn open_scope(&self) -> RunScope {
    let scope = RunScope::new();
    let live = RunScope::live();
    if live > self.inner.config.scope_pool_hint {
      event!(
        Level::WARN,
        live,
        hint = self.inner.config.scope_pool_hint,
        "More run scopes alive than the configured hint."
      );
    }
    scope
  }

  fn ensure_open(&self) -> FlowResult<()> {
    if self.inner.pool.is_shut_down() {
      return Err(FlowError::Interrupted {
        reason: "flow executor has been shut down".to_string(),
      });
    }
    Ok(())
  }

  fn fail_early(&self, error: FlowError, scope: RunScope, context: Arc<dyn FlowContext>) -> RunResult {
    scope.finish();
    RunResult::failed(error, scope, context)
  }
}

impl std::fmt::Debug for FlowExecutor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FlowExecutor")
      .field("config", &self.inner.config)
      .field("listeners", &self.inner.listeners)
      .field("pool", &self.inner.pool)
      .finish()
  }
}

/// Builder for executors that need listeners registered before the first run.
#[derive(Default)]
pub struct FlowExecutorBuilder {
  registry: Option<Arc<dyn FlowRegistry>>,
  config: Option<EngineConfig>,
  listeners: Listeners,
}

impl FlowExecutorBuilder {
  pub fn registry(mut self, registry: Arc<dyn FlowRegistry>) -> Self {
    self.registry = Some(registry);
    self
  }

  pub fn config(mut self, config: EngineConfig) -> Self {
    self.config = Some(config);
    self
  }

  pub fn listener<F>(self, phase: ListenerPhase, target: ListenerTarget, priority: i32, listener: F) -> Self
  where
    F: Fn(&UnitEvent<'_>) + Send + Sync + 'static,
  {
    self.listeners.register(phase, target, priority, listener);
    self
  }

  pub fn build(self) -> FlowResult<FlowExecutor> {
    let registry = self.registry.ok_or_else(|| FlowError::Configuration {
      key: "registry".to_string(),
      message: "a flow registry is required".to_string(),
    })?;
    let config = self.config.unwrap_or_default();
    if !config.enabled {
      return Err(FlowError::Disabled);
    }
    Ok(FlowExecutor::from_parts(registry, config, self.listeners))
  }
}
