// tests/plan_compile_tests.rs
mod common;

use common::*;
use flowrig::plan::{is_virtual_anchor, FALSE_LABEL, TRUE_LABEL};
use flowrig::{compile, parse, ExecutionPlan, PlanCache, ROOT_FORK_ANCHOR};
use std::collections::BTreeMap;
use std::sync::Arc;

fn plan(input: &str) -> ExecutionPlan {
  compile(&parse(input).unwrap())
}

fn targets(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs.iter().map(|(l, t)| (l.to_string(), t.to_string())).collect()
}

#[test]
fn test_sequence_compiles_to_flat_list_without_side_tables() {
  setup_tracing();
  let plan = plan("A -> B -> C");
  assert_eq!(plan.sequence(), strings(&["A", "B", "C"]).as_slice());
  assert!(plan.conditional_branches().is_empty());
  assert!(plan.parallel_branches().is_empty());
}

#[test]
fn test_conditional_registers_router_targets() {
  let plan = plan("A -> B ? C : D");
  assert_eq!(plan.sequence(), strings(&["A", "B", "C", "D"]).as_slice());
  assert_eq!(
    plan.branch_targets("B"),
    Some(&targets(&[(TRUE_LABEL, "C"), (FALSE_LABEL, "D")]))
  );
  assert!(plan.parallel_branches().is_empty());

  let site = plan.route_sites().get(&1).unwrap();
  assert_eq!(site.router, "B");
  assert_eq!(site.arms[TRUE_LABEL].span, 2..3);
  assert_eq!(site.arms[FALSE_LABEL].span, 3..4);
}

#[test]
fn test_router_is_last_unit_of_condition_and_targets_are_first_of_arms() {
  let plan = plan("(A -> B) ? (C -> X) : (D -> Y)");
  assert_eq!(plan.sequence(), strings(&["A", "B", "C", "X", "D", "Y"]).as_slice());
  assert_eq!(
    plan.branch_targets("B"),
    Some(&targets(&[(TRUE_LABEL, "C"), (FALSE_LABEL, "D")]))
  );
}

#[test]
fn test_parallel_group_is_anchored_on_preceding_unit() {
  let plan = plan("A -> (B, C) -> D");
  assert_eq!(plan.sequence(), strings(&["A", "B", "C", "D"]).as_slice());
  assert_eq!(plan.fork_branches("A"), Some(strings(&["B", "C"]).as_slice()));

  let site = plan.fork_sites().get(&1).unwrap();
  assert_eq!(site.anchor, "A");
  assert_eq!(site.anchor_index, Some(0));
  assert_eq!(site.span, 1..3);
}

#[test]
fn test_group_opening_the_plan_uses_root_anchor() {
  let plan = plan("(A, B) -> C");
  assert_eq!(plan.fork_branches(ROOT_FORK_ANCHOR), Some(strings(&["A", "B"]).as_slice()));
  assert_eq!(plan.fork_sites().get(&0).unwrap().anchor_index, None);
}

#[test]
fn test_group_after_conditional_gets_virtual_anchor() {
  let plan = plan("A -> B ? C : D -> (E, F) -> G");
  let anchors: Vec<&String> = plan.parallel_branches().keys().collect();
  assert_eq!(anchors.len(), 1);
  assert!(is_virtual_anchor(anchors[0]));
  assert_ne!(anchors[0], ROOT_FORK_ANCHOR);
  assert_eq!(plan.fork_branches(anchors[0]), Some(strings(&["E", "F"]).as_slice()));
}

#[test]
fn test_group_opening_an_arm_does_not_anchor_on_router() {
  let plan = plan("A ? (B, C) : D");
  assert!(plan.fork_branches("A").is_none());
  let site = plan.fork_sites().get(&1).unwrap();
  assert!(is_virtual_anchor(&site.anchor));
}

#[test]
fn test_multi_unit_branches_keep_their_own_sub_plans() {
  let plan = plan("A -> (B -> C, D) -> E");
  assert_eq!(plan.sequence(), strings(&["A", "B", "C", "D", "E"]).as_slice());
  assert_eq!(plan.fork_branches("A"), Some(strings(&["B", "D"]).as_slice()));

  let site = plan.fork_sites().get(&1).unwrap();
  assert_eq!(site.branches[0].entry, "B");
  assert_eq!(site.branches[0].plan.sequence(), strings(&["B", "C"]).as_slice());
  assert_eq!(site.branches[1].plan.sequence(), strings(&["D"]).as_slice());
  assert_eq!(site.span, 1..4);
}

#[test]
fn test_sequence_holds_every_leaf_once_per_occurrence() {
  for input in [
    "A -> B -> C",
    "A -> B ? C : D",
    "A -> (B, C) -> D",
    "A -> (B -> C, D ? E : F) -> G",
    "A ? (B, C) : (D -> E)",
    "A -> A -> (A, B)",
  ] {
    let node = parse(input).unwrap();
    let compiled = compile(&node);
    let leaves: Vec<String> = node.leaf_names().into_iter().map(String::from).collect();
    assert_eq!(compiled.sequence(), leaves.as_slice(), "{}", input);
  }
}

#[test]
fn test_side_table_ids_appear_in_sequence() {
  let plan = plan("A -> B ? (C, D) : E -> (F, G ? H : I) -> J");
  for (router, arms) in plan.conditional_branches() {
    assert!(plan.sequence().contains(router));
    for target in arms.values() {
      assert!(plan.sequence().contains(target));
    }
  }
  for (anchor, entries) in plan.parallel_branches() {
    assert!(is_virtual_anchor(anchor) || plan.sequence().contains(anchor));
    for entry in entries {
      assert!(plan.sequence().contains(entry));
    }
  }
}

#[test]
fn test_compilation_is_deterministic() {
  let input = "pre = A -> B; pre -> (C, D ? E : F) -> G ? H : I";
  let first = plan(input);
  let second = plan(input);
  assert_eq!(first, second);
  assert_eq!(first.to_string(), second.to_string());
  assert_eq!(format!("{:?}", first), format!("{:?}", second));
}

#[test]
fn test_plan_cache_reuses_plans_per_expression() {
  let cache = PlanCache::new();
  let a = cache.get_or_compile("A -> B").unwrap();
  let b = cache.get_or_compile("A -> B").unwrap();
  assert!(Arc::ptr_eq(&a, &b));
  assert_eq!(cache.len(), 1);

  assert!(cache.get_or_compile("A -> (B").is_err());
  assert_eq!(cache.len(), 1);

  cache.clear();
  assert!(cache.is_empty());
}
