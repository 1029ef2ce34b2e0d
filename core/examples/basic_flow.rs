// flowrig/examples/basic_flow.rs

use flowrig::{ContextData, FlowExecutor, FnUnit, InMemoryRegistry, PayloadContext, UnitContext};
use std::sync::Arc;
use tracing::info;

// 1. The payload every unit in the run shares.
#[derive(Debug, Default)]
struct Order {
  total_cents: u64,
  log: Vec<String>,
}

fn order(ctx: &UnitContext) -> anyhow::Result<ContextData<Order>> {
  ctx
    .context_as::<PayloadContext<Order>>()
    .map(|payload| payload.data().clone())
    .ok_or_else(|| anyhow::anyhow!("unit '{}' expected an Order payload", ctx.unit_id()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Flow Example ---");

  // 2. Register units and a flow expression.
  let registry = Arc::new(InMemoryRegistry::new());
  registry.register_unit(FnUnit::new("price", |ctx: UnitContext| async move {
    let order = order(&ctx)?;
    let mut data = order.write();
    data.total_cents = 4_200;
    data.log.push("priced".to_string());
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("tax", |ctx: UnitContext| async move {
    let order = order(&ctx)?;
    let mut data = order.write();
    data.total_cents += data.total_cents / 10;
    data.log.push("taxed".to_string());
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_unit(FnUnit::new("receipt", |ctx: UnitContext| async move {
    let order = order(&ctx)?;
    let total = order.read().total_cents;
    ctx.set_data("receipt", format!("total: {}.{:02}", total / 100, total % 100));
    order.write().log.push("receipt".to_string());
    Ok::<(), anyhow::Error>(())
  }));
  registry.register_flow("checkout", "price -> tax -> receipt");

  // 3. Run it, keeping a handle on the payload.
  let executor = FlowExecutor::new(registry);
  let payload = ContextData::new(Order::default());
  let result = executor
    .execute("checkout", PayloadContext::from_data(payload.clone()).with_request_id(1))
    .await;

  // 4. Inspect the result.
  info!(
    "status={:?} executed={:?} duration={}ms",
    result.status(),
    result.executed_units(),
    result.duration().num_milliseconds()
  );
  info!("receipt: {:?}", result.scope().get::<String>("receipt"));
  info!("order log: {:?}", payload.read().log);

  if let Some(err) = result.into_error() {
    return Err(err.into());
  }
  Ok(())
}
