// tests/flow_execution_tests.rs
mod common;

use common::*;
use flowrig::{
  ContextData, DefaultFlowContext, FlowError, FnUnit, PayloadContext, RunStatus, UnitContext,
};

#[tokio::test]
async fn test_sequential_flow_runs_units_in_order() {
  let h = Harness::new();
  h.units(&["A", "B", "C"]).flow("main", "A -> B -> C");

  let result = h.executor().execute_default("main").await;

  assert!(result.is_success());
  assert_eq!(result.status(), RunStatus::Completed);
  assert_eq!(result.executed_units(), strings(&["A", "B", "C"]).as_slice());
  assert_eq!(h.journal.entries(), strings(&["A", "B", "C"]));
  assert!(result.error().is_none());
  assert!(result.message().is_none());
}

#[tokio::test]
async fn test_unknown_flow_fails_with_empty_executed_list() {
  let h = Harness::new();
  h.units(&["A"]);

  let result = h.executor().execute_default("nope").await;

  assert!(!result.is_success());
  assert!(result.executed_units().is_empty());
  assert!(matches!(result.error(), Some(FlowError::FlowNotFound { flow_id }) if flow_id == "nope"));
  assert!(result.message().unwrap().contains("nope"));
  assert!(result.scope().ended_at().is_some());
}

#[tokio::test]
async fn test_malformed_definition_never_invokes_a_unit() {
  let h = Harness::new();
  h.units(&["A", "B"]).flow("broken", "A -> (B");

  let result = h.executor().execute_default("broken").await;

  assert!(matches!(result.error(), Some(FlowError::Parse(_))));
  assert!(result.executed_units().is_empty());
  assert!(h.journal.entries().is_empty());
}

#[tokio::test]
async fn test_missing_unit_fails_the_run() {
  let h = Harness::new();
  h.units(&["A", "C"]).flow("main", "A -> Ghost -> C");

  let result = h.executor().execute_default("main").await;

  assert_eq!(result.status(), RunStatus::Failed);
  assert!(matches!(result.error(), Some(FlowError::UnitNotFound { unit_id }) if unit_id == "Ghost"));
  assert_eq!(result.executed_units(), strings(&["A"]).as_slice());
}

#[tokio::test]
async fn test_missing_unit_ends_run_even_when_continuing_on_error() {
  let h = Harness::new();
  h.units(&["A", "C"]).flow("main", "A -> Ghost -> C");

  let ctx = DefaultFlowContext::new().with_continue_on_error(true);
  let result = h.executor().execute("main", ctx).await;

  assert!(result.error().unwrap().is_not_found());
  assert_eq!(result.executed_units(), strings(&["A"]).as_slice());
}

#[tokio::test]
async fn test_stop_signal_ends_run_successfully() {
  let h = Harness::new();
  h.units(&["A", "C"]).unit(h.scripted("B").stops()).flow("main", "A -> B -> C");

  let result = h.executor().execute_default("main").await;

  assert!(result.is_success());
  assert_eq!(result.status(), RunStatus::Stopped);
  assert_eq!(result.executed_units(), strings(&["A", "B"]).as_slice());
}

#[tokio::test]
async fn test_execute_unit_bypasses_plans() {
  let h = Harness::new();
  h.units(&["solo"]);

  let executor = h.executor();
  let result = executor.execute_unit("solo", DefaultFlowContext::new()).await;
  assert!(result.is_success());
  assert_eq!(result.executed_units(), strings(&["solo"]).as_slice());
  assert!(executor.plans().is_empty());

  let missing = executor.execute_unit("ghost", DefaultFlowContext::new()).await;
  assert!(matches!(missing.error(), Some(FlowError::UnitNotFound { .. })));
}

#[tokio::test]
async fn test_each_run_gets_its_own_scope() {
  let h = Harness::new();
  h.registry.register_unit(FnUnit::new("writer", |ctx: UnitContext| async move {
    let seen: Option<u32> = ctx.data("visits");
    ctx.set_data("visits", seen.unwrap_or(0) + 1);
    Ok::<(), anyhow::Error>(())
  }));
  h.flow("main", "writer");

  let executor = h.executor();
  let first = executor.execute_default("main").await;
  let second = executor.execute_default("main").await;

  assert_ne!(first.scope().id(), second.scope().id());
  assert!(second.scope().id() > first.scope().id());
  assert_eq!(first.scope().get::<u32>("visits"), Some(1));
  assert_eq!(second.scope().get::<u32>("visits"), Some(1));
  assert!(first.scope().ended_at().unwrap() >= first.scope().started_at());
}

#[derive(Debug, Default)]
struct Order {
  steps: Vec<String>,
  total: u32,
}

#[tokio::test]
async fn test_payload_context_is_shared_with_units() {
  let h = Harness::new();
  for (name, amount) in [("price", 10u32), ("tax", 2), ("ship", 5)] {
    h.registry.register_unit(FnUnit::new(name, move |ctx: UnitContext| async move {
      let order = ctx
        .context_as::<PayloadContext<Order>>()
        .ok_or_else(|| anyhow::anyhow!("unexpected context type"))?;
      let mut guard = order.data().write();
      guard.steps.push(ctx.unit_id().to_string());
      guard.total += amount;
      Ok::<(), anyhow::Error>(())
    }));
  }
  h.flow("checkout", "price -> tax -> ship");

  let payload = ContextData::new(Order::default());
  let ctx = PayloadContext::from_data(payload.clone()).with_request_id(42);
  let result = h.executor().execute("checkout", ctx).await;

  assert!(result.is_success(), "{:?}", result.message());
  assert_eq!(payload.read().total, 17);
  assert_eq!(payload.read().steps, strings(&["price", "tax", "ship"]));
  let ctx = result.context_as::<PayloadContext<Order>>().unwrap();
  assert!(ctx.data().ptr_eq(&payload));
  assert_eq!(result.context().request_id(), Some(42));
}

#[tokio::test]
async fn test_aliases_in_registered_flow() {
  let h = Harness::new();
  h.units(&["A", "B", "C", "D"])
    .flow("main", "tail = C -> D\nA -> B -> tail");

  let result = h.executor().execute_default("main").await;

  assert_eq!(result.executed_units(), strings(&["A", "B", "C", "D"]).as_slice());
}

#[tokio::test]
async fn test_plans_are_cached_per_definition() {
  let h = Harness::new();
  h.units(&["A", "B"]).flow("one", "A -> B").flow("two", "A -> B");

  let executor = h.executor();
  executor.execute_default("one").await;
  executor.execute_default("two").await;
  executor.execute_default("one").await;

  assert_eq!(executor.plans().len(), 1);
}

#[tokio::test]
async fn test_run_result_debug_names_outcome_not_context() {
  let h = Harness::new();
  h.units(&["A", "B"]).flow("main", "A -> B");

  let result = h
    .executor()
    .execute("main", DefaultFlowContext::new().with_request_id(42))
    .await;
  let rendered = format!("{:?}", result);

  assert!(rendered.starts_with("RunResult"));
  assert!(rendered.contains("Completed"));
  assert!(rendered.contains("[\"A\", \"B\"]"));
  assert!(rendered.contains(&format!("scope_id: {}", result.scope().id())));
  assert!(rendered.contains("request_id: Some(42)"));
}
