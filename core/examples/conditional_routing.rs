// flowrig/examples/conditional_routing.rs

use flowrig::{FlowExecutor, FnUnit, InMemoryRegistry, PayloadContext, UnitContext};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
struct Applicant {
  score: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Conditional Routing Example ---");

  let registry = Arc::new(InMemoryRegistry::new());
  registry.register_unit(FnUnit::new("load", |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) }));

  // The router picks an arm by label.
  registry.register_unit(FnUnit::new("screen", |ctx: UnitContext| async move {
    let score = ctx
      .context_as::<PayloadContext<Applicant>>()
      .map(|p| p.data().read().score)
      .unwrap_or_default();
    ctx.route(score >= 700);
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("approve", |ctx: UnitContext| async move {
    ctx.set_data("decision", "approved".to_string());
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("review", |ctx: UnitContext| async move {
    ctx.set_data("decision", "manual review".to_string());
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("notify", |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) }));

  // A unit may also jump straight to another unit id, or stop the flow.
  registry.register_unit(FnUnit::new("fraud_check", |ctx: UnitContext| async move {
    ctx.route_to("notify");
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("halt", |ctx: UnitContext| async move {
    ctx.stop_flow();
    Ok::<(), anyhow::Error>(())
  }));

  registry.register_flow("underwrite", "load -> screen ? approve : review -> notify");
  registry.register_flow("shortcut", "load -> fraud_check ? approve : review -> notify");
  registry.register_flow("stopped", "load -> halt -> notify");

  let executor = FlowExecutor::new(registry);

  for score in [820, 540] {
    let result = executor
      .execute("underwrite", PayloadContext::new(Applicant { score }))
      .await;
    info!(
      "score {} -> {:?} via {:?}",
      score,
      result.scope().get::<String>("decision"),
      result.executed_units()
    );
  }

  let result = executor.execute_default("shortcut").await;
  info!("jump target: {:?}", result.executed_units());

  let result = executor.execute_default("stopped").await;
  info!("stopped: status={:?} executed={:?}", result.status(), result.executed_units());

  Ok(())
}
