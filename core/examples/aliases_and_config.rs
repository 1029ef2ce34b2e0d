// flowrig/examples/aliases_and_config.rs

use flowrig::{compile, parse, EngineConfig, FlowExecutor, FnUnit, InMemoryRegistry, UnitContext};
use std::sync::Arc;
use tracing::info;

const PIPELINE: &str = "
  ingest = fetch -> decode;
  enrich = (geo, weather);
  ingest -> validate ? (enrich -> store) : quarantine
";

fn noop(name: &'static str) -> FnUnit {
  FnUnit::new(name, |_ctx: UnitContext| async move { Ok::<(), anyhow::Error>(()) })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Aliases and Config Example ---");

  // Settings come from FLOW_* variables (and a .env file, if present).
  let config = EngineConfig::from_env()?;
  info!("config: {:?}", config);

  // Aliases expand inline before compilation.
  let ast = parse(PIPELINE)?;
  info!("expanded: {}", ast);
  info!("plan:\n{}", compile(&ast));

  let registry = Arc::new(InMemoryRegistry::new());
  for name in ["fetch", "decode", "geo", "weather", "store", "quarantine"] {
    registry.register_unit(noop(name));
  }
  registry.register_unit(FnUnit::new("validate", |ctx: UnitContext| async move {
    ctx.route(true);
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_flow("ingest", PIPELINE);

  let executor = FlowExecutor::with_config(registry, config)?;
  let result = executor.execute_default("ingest").await;
  info!("status={:?} executed={:?}", result.status(), result.executed_units());
  info!("cached plans: {}", executor.plans().len());
  Ok(())
}
