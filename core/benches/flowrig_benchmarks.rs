use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowrig::{compile, parse, EngineConfig, FlowExecutor, FnUnit, InMemoryRegistry, PlanCache, UnitContext};
use std::sync::Arc;
use tokio::runtime::Runtime;

// --- Helpers ---

fn step_names(count: usize) -> Vec<String> {
  (0..count).map(|i| format!("step_{}", i)).collect()
}

fn counting_unit(name: String, iterations: u64) -> FnUnit {
  FnUnit::new(name, move |ctx: UnitContext| async move {
    let mut counter = ctx.data::<u64>("counter").unwrap_or_default();
    for _ in 0..iterations {
      counter = counter.wrapping_add(1);
    }
    ctx.set_data("counter", counter);
    Ok::<(), anyhow::Error>(())
  })
}

fn quiet_executor(registry: Arc<InMemoryRegistry>, pool_size: usize) -> FlowExecutor {
  let config = EngineConfig::default()
    .with_print_execution_log(false)
    .with_worker_pool_size(pool_size);
  FlowExecutor::with_config(registry, config).unwrap()
}

// --- Benchmark Functions ---

fn bench_parse_and_compile(c: &mut Criterion) {
  let mut group = c.benchmark_group("ParseCompile");
  let expressions = [
    ("sequence", "A -> B -> C -> D -> E -> F"),
    ("conditional", "A -> B ? (C -> D) : (E ? F : G) -> H"),
    ("parallel", "A -> (B -> C, D, (E, F) -> G) -> H"),
    ("aliases", "left = B -> C; right = (D, E); A -> left -> right -> F"),
  ];

  for (label, expression) in expressions.iter() {
    group.bench_with_input(BenchmarkId::new("parse_compile", label), expression, |b, expr| {
      b.iter(|| compile(&parse(expr).unwrap()));
    });
  }

  let cache = PlanCache::new();
  group.bench_function("cached_lookup", |b| {
    b.iter(|| cache.get_or_compile("A -> (B -> C, D, (E, F) -> G) -> H").unwrap());
  });
  group.finish();
}

fn bench_sequential_flow(c: &mut Criterion) {
  let mut group = c.benchmark_group("SequentialFlow");
  let rt = Runtime::new().unwrap();

  for num_units in [1usize, 5, 20].iter() {
    let registry = Arc::new(InMemoryRegistry::new());
    let names = step_names(*num_units);
    for name in &names {
      registry.register_unit(counting_unit(name.clone(), 10));
    }
    registry.register_flow("seq", names.join(" -> "));
    let executor = quiet_executor(registry, 8);

    group.throughput(Throughput::Elements(*num_units as u64));
    group.bench_with_input(BenchmarkId::new("units", num_units), num_units, |b, _| {
      b.to_async(&rt).iter(|| {
        let executor = executor.clone();
        async move {
          let result = executor.execute_default("seq").await;
          assert!(result.is_success());
        }
      });
    });
  }
  group.finish();
}

fn bench_parallel_flow(c: &mut Criterion) {
  let mut group = c.benchmark_group("ParallelFlow");
  let rt = Runtime::new().unwrap();

  for num_branches in [2usize, 8, 32].iter() {
    let registry = Arc::new(InMemoryRegistry::new());
    let names = step_names(*num_branches);
    for name in &names {
      registry.register_unit(counting_unit(name.clone(), 10));
    }
    registry.register_unit(counting_unit("fan_out".to_string(), 1));
    registry.register_unit(counting_unit("join".to_string(), 1));
    registry.register_flow("fork", format!("fan_out -> ({}) -> join", names.join(", ")));
    let executor = quiet_executor(registry, 16);

    group.throughput(Throughput::Elements(*num_branches as u64));
    group.bench_with_input(BenchmarkId::new("branches", num_branches), num_branches, |b, _| {
      b.to_async(&rt).iter(|| {
        let executor = executor.clone();
        async move {
          let result = executor.execute_default("fork").await;
          assert!(result.is_success());
        }
      });
    });
  }
  group.finish();
}

criterion_group!(benches, bench_parse_and_compile, bench_sequential_flow, bench_parallel_flow);
criterion_main!(benches);
