// flowrig/src/plan/compile.rs

//! AST -> `ExecutionPlan` flattening.
//!
//! Every node appends its units to `sequence` in declaration order. A
//! conditional lays out `condition, when_true, when_false` and records each
//! arm's span under the router's position. A parallel group lays out its
//! branches back to back, keeps a standalone sub-plan per branch for the
//! concurrent tasks, and registers the group under its fork anchor.

use crate::expr::Node;
use crate::plan::definition::{
  Arm, Branch, ExecutionPlan, ForkSite, RouteSite, FALSE_LABEL, ROOT_FORK_ANCHOR, TRUE_LABEL, VIRTUAL_ANCHOR_PREFIX,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, Level};

/// Compiles `node`. The same node always yields an equal plan.
pub fn compile(node: &Node) -> ExecutionPlan {
  let mut builder = PlanBuilder::default();
  builder.node(node);
  event!(Level::TRACE, plan = %builder.plan, "Compiled execution plan.");
  builder.plan
}

#[derive(Default)]
struct PlanBuilder {
  plan: ExecutionPlan,
  // Lowest position that may anchor the next parallel group.
  anchor_floor: usize,
  next_virtual: usize,
}

impl PlanBuilder {
  fn node(&mut self, node: &Node) {
    match node {
      Node::UnitRef { name } => self.plan.sequence.push(name.clone()),
      Node::Sequence { steps } => steps.iter().for_each(|step| self.node(step)),
      Node::Conditional {
        condition,
        when_true,
        when_false,
      } => self.conditional(condition, when_true, when_false),
      Node::ParallelGroup { branches } => self.parallel(branches),
    }
  }

  fn conditional(&mut self, condition: &Node, when_true: &Node, when_false: &Node) {
    let before = self.plan.sequence.len();
    self.node(condition);
    let len = self.plan.sequence.len();
    if len == before {
      // Nothing to route on; both arms are plain steps.
      self.node(when_true);
      self.node(when_false);
      return;
    }

    let router_index = len - 1;
    let router = self.plan.sequence[router_index].clone();
    let mut arms = BTreeMap::new();

    for (label, arm) in [(TRUE_LABEL, when_true), (FALSE_LABEL, when_false)] {
      let start = self.plan.sequence.len();
      self.anchor_floor = start;
      self.node(arm);
      let end = self.plan.sequence.len();
      if end > start {
        arms.insert(
          label.to_string(),
          Arm {
            target: self.plan.sequence[start].clone(),
            span: start..end,
          },
        );
      }
    }

    let targets = arms.iter().map(|(label, arm)| (label.clone(), arm.target.clone())).collect();
    self.plan.conditional_branches.insert(router.clone(), targets);
    self.plan.routes.insert(router_index, RouteSite { router, arms });
    self.anchor_floor = self.plan.sequence.len();
  }

  fn parallel(&mut self, branches: &[Node]) {
    let branches: Vec<&Node> = branches.iter().filter(|b| !b.is_empty()).collect();
    if branches.is_empty() {
      return;
    }

    let start = self.plan.sequence.len();
    let (anchor, anchor_index) = match start.checked_sub(1) {
      Some(prev) if prev >= self.anchor_floor => (self.plan.sequence[prev].clone(), Some(prev)),
      Some(_) => (self.virtual_anchor(), None),
      None => (ROOT_FORK_ANCHOR.to_string(), None),
    };

    let mut compiled = Vec::with_capacity(branches.len());
    for branch in branches {
      let branch_start = self.plan.sequence.len();
      self.anchor_floor = branch_start;
      self.node(branch);
      compiled.push(Branch {
        entry: self.plan.sequence[branch_start].clone(),
        plan: Arc::new(compile(branch)),
      });
    }

    let end = self.plan.sequence.len();
    let entries = compiled.iter().map(|b| b.entry.clone()).collect();
    self.plan.parallel_branches.insert(anchor.clone(), entries);
    self.plan.forks.insert(
      start,
      ForkSite {
        anchor,
        anchor_index,
        span: start..end,
        branches: compiled,
      },
    );
    self.anchor_floor = end;
  }

  fn virtual_anchor(&mut self) -> String {
    self.next_virtual += 1;
    format!("{}{}", VIRTUAL_ANCHOR_PREFIX, self.next_virtual)
  }
}
