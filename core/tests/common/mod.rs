// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every fixture.

use anyhow::anyhow;
use async_trait::async_trait;
use flowrig::{FlowError, FlowExecutor, InMemoryRegistry, LifecyclePhase, Unit, UnitContext};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use tracing::Level;

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Journal: what units saw, in the order they saw it ---
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
  pub fn push(&self, entry: impl Into<String>) {
    self.0.lock().push(entry.into());
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }

  pub fn contains(&self, entry: &str) -> bool {
    self.0.lock().iter().any(|e| e == entry)
  }
}

// --- A unit whose behaviour is scripted per test ---
pub struct ScriptedUnit {
  name: String,
  kind: Option<String>,
  journal: Journal,
  route: Option<String>,
  fork: Option<Vec<String>>,
  stop: bool,
  fail_in: Option<LifecyclePhase>,
  panic_in_run: bool,
  on_error_fails: bool,
  continue_on_error: bool,
  barrier: Option<Arc<Barrier>>,
  delay: Option<Duration>,
}

impl ScriptedUnit {
  pub fn new(name: &str, journal: &Journal) -> Self {
    Self {
      name: name.to_string(),
      kind: None,
      journal: journal.clone(),
      route: None,
      fork: None,
      stop: false,
      fail_in: None,
      panic_in_run: false,
      on_error_fails: false,
      continue_on_error: false,
      barrier: None,
      delay: None,
    }
  }

  pub fn kind(mut self, kind: &str) -> Self {
    self.kind = Some(kind.to_string());
    self
  }

  pub fn routes_to(mut self, target: &str) -> Self {
    self.route = Some(target.to_string());
    self
  }

  pub fn forks_to(mut self, branches: &[&str]) -> Self {
    self.fork = Some(branches.iter().map(|b| b.to_string()).collect());
    self
  }

  pub fn stops(mut self) -> Self {
    self.stop = true;
    self
  }

  pub fn fails_in(mut self, phase: LifecyclePhase) -> Self {
    self.fail_in = Some(phase);
    self
  }

  pub fn panics(mut self) -> Self {
    self.panic_in_run = true;
    self
  }

  pub fn failing_on_error_hook(mut self) -> Self {
    self.on_error_fails = true;
    self
  }

  pub fn continues_on_error(mut self) -> Self {
    self.continue_on_error = true;
    self
  }

  pub fn waits_on(mut self, barrier: &Arc<Barrier>) -> Self {
    self.barrier = Some(Arc::clone(barrier));
    self
  }

  pub fn sleeps(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  fn fail_if(&self, phase: LifecyclePhase) -> anyhow::Result<()> {
    if self.fail_in == Some(phase) {
      return Err(anyhow!("{} failed in {}", self.name, phase));
    }
    Ok(())
  }
}

#[async_trait]
impl Unit for ScriptedUnit {
  fn name(&self) -> &str {
    &self.name
  }

  fn kind(&self) -> &str {
    self.kind.as_deref().unwrap_or(&self.name)
  }

  fn continue_on_error(&self) -> bool {
    self.continue_on_error
  }

  async fn before_run(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
    self.fail_if(LifecyclePhase::BeforeRun)
  }

  async fn run(&self, ctx: &UnitContext) -> anyhow::Result<()> {
    self.journal.push(self.name.clone());
    // Every unit leaves what it saw of the last join behind, for join assertions.
    ctx.set_data(format!("completed@{}", self.name), ctx.completed_branches());

    if let Some(barrier) = &self.barrier {
      barrier.wait().await;
    }
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.panic_in_run {
      panic!("{} exploded", self.name);
    }
    self.fail_if(LifecyclePhase::Run)?;

    if let Some(target) = &self.route {
      ctx.route_to(target.clone());
    }
    if let Some(branches) = &self.fork {
      ctx.fork_to(branches.clone());
    }
    if self.stop {
      ctx.stop_flow();
    }
    Ok(())
  }

  async fn after_run(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
    self.fail_if(LifecyclePhase::AfterRun)
  }

  async fn on_error(&self, _ctx: &UnitContext, error: &FlowError) -> anyhow::Result<()> {
    self.journal.push(format!("on_error:{}", self.name));
    tracing::debug!(target: "test_units", unit = %self.name, error = %error, "on_error hook called");
    if self.on_error_fails {
      return Err(anyhow!("on_error of {} failed too", self.name));
    }
    Ok(())
  }
}

// --- Registry + journal wiring ---
pub struct Harness {
  pub registry: Arc<InMemoryRegistry>,
  pub journal: Journal,
}

impl Harness {
  pub fn new() -> Self {
    setup_tracing();
    Self {
      registry: Arc::new(InMemoryRegistry::new()),
      journal: Journal::default(),
    }
  }

  /// Registers plain units that only record themselves.
  pub fn units(&self, names: &[&str]) -> &Self {
    for name in names {
      self.registry.register_unit(ScriptedUnit::new(name, &self.journal));
    }
    self
  }

  pub fn unit(&self, unit: ScriptedUnit) -> &Self {
    self.registry.register_unit(unit);
    self
  }

  pub fn scripted(&self, name: &str) -> ScriptedUnit {
    ScriptedUnit::new(name, &self.journal)
  }

  pub fn flow(&self, flow_id: &str, expression: &str) -> &Self {
    self.registry.register_flow(flow_id, expression);
    self
  }

  pub fn executor(&self) -> FlowExecutor {
    FlowExecutor::new(self.registry.clone())
  }
}

pub fn sorted(mut items: Vec<String>) -> Vec<String> {
  items.sort();
  items
}

pub fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}
