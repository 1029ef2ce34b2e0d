// flowrig/examples/error_handling.rs

use async_trait::async_trait;
use flowrig::{
  DefaultFlowContext, FlowError, FlowExecutor, FnUnit, InMemoryRegistry, ListenerTarget, Unit, UnitContext, UnitEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Fails in `run` and cleans up in `on_error`.
struct FlakyCharge;

#[async_trait]
impl Unit for FlakyCharge {
  fn name(&self) -> &str {
    "charge"
  }

  fn kind(&self) -> &str {
    "payment"
  }

  async fn run(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
    anyhow::bail!("card declined")
  }

  async fn on_error(&self, ctx: &UnitContext, error: &FlowError) -> anyhow::Result<()> {
    ctx.set_data("refund_queued", true);
    warn!("charge failed, queued refund: {}", error);
    Ok(())
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Error Handling Example ---");

  let registry = Arc::new(InMemoryRegistry::new());
  registry.register_unit(FlakyCharge);
  registry.register_unit(FnUnit::new("reserve", |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) }));
  registry.register_unit(FnUnit::new("email", |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) }));
  registry.register_flow("purchase", "reserve -> charge -> email");
  registry.register_flow("broken", "reserve -> (charge, email");
  registry.register_flow("typo", "reserve -> chagre");

  let executor = FlowExecutor::new(registry);
  executor
    .listeners()
    .on_error(ListenerTarget::kind("payment"), 0, |event: &UnitEvent<'_>| {
      warn!("payment unit '{}' failed: {:?}", event.unit_id, event.error.map(ToString::to_string));
    });

  // Default: the first failure ends the run.
  let result = executor.execute_default("purchase").await;
  info!("strict: {:?} executed={:?}", result.message(), result.executed_units());

  // Continue past failures; the first error is still reported.
  let ctx = DefaultFlowContext::new().with_continue_on_error(true);
  let result = executor.execute("purchase", ctx).await;
  info!(
    "lenient: status={:?} executed={:?} refund_queued={:?}",
    result.status(),
    result.executed_units(),
    result.scope().get::<bool>("refund_queued")
  );

  // Malformed expressions and missing units come back as results too.
  for flow in ["broken", "typo", "missing"] {
    let result = executor.execute_default(flow).await;
    match result.error() {
      Some(FlowError::Parse(err)) => info!("{}: parse error at {}:{}: {}", flow, err.line, err.column, err.message),
      Some(err) if err.is_not_found() => info!("{}: not found: {}", flow, err),
      other => info!("{}: {:?}", flow, other),
    }
  }

  Ok(())
}
