// flowrig/examples/parallel_fork_join.rs

use flowrig::{EngineConfig, FlowExecutor, FnUnit, InMemoryRegistry, UnitContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn fetch(name: &'static str, millis: u64) -> FnUnit {
  FnUnit::new(name, move |ctx: UnitContext| async move {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    ctx.set_data(format!("{}_ms", name), millis);
    Ok::<(), anyhow::Error>(())
  })
  .with_kind("fetch")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Parallel Fork/Join Example ---");

  let registry = Arc::new(InMemoryRegistry::new());
  registry.register_unit(FnUnit::new("plan_trip", |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) }));
  registry.register_unit(fetch("flights", 120));
  registry.register_unit(fetch("hotels", 80));
  registry.register_unit(fetch("cars", 40));
  registry.register_unit(fetch("insurance", 20));
  registry.register_unit(FnUnit::new("itinerary", |ctx: UnitContext| async move {
    // The join sees which branches finished, in completion order.
    info!("joined branches: {:?}", ctx.completed_branches());
    Ok::<(), anyhow::Error>(())
  }));

  // Dynamic fan-out chosen at run time.
  registry.register_unit(FnUnit::new("pick_vendors", |ctx: UnitContext| async move {
    ctx.fork_to(["hotels", "cars"]);
    Ok::<(), anyhow::Error>(())
  }));

  registry.register_flow("static", "plan_trip -> (flights, hotels, cars -> insurance) -> itinerary");
  registry.register_flow("dynamic", "pick_vendors -> itinerary");

  let config = EngineConfig::default().with_worker_pool_size(4);
  let executor = FlowExecutor::with_config(registry, config)?;

  let result = executor.execute_default("static").await;
  info!(
    "static: {:?} in {}ms, executed {:?}",
    result.status(),
    result.duration().num_milliseconds(),
    result.executed_units()
  );

  let result = executor.execute_default("dynamic").await;
  info!("dynamic: executed {:?}", result.executed_units());

  let drained = executor.shutdown().await;
  info!("pool drained cleanly: {}", drained);
  Ok(())
}
