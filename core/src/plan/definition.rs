// flowrig/src/plan/definition.rs

//! The compiled, run-independent form of a flow expression.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

pub const TRUE_LABEL: &str = "true";
pub const FALSE_LABEL: &str = "false";

/// Prefix of fork anchors that are not units.
pub const VIRTUAL_ANCHOR_PREFIX: &str = "__fork__#";
/// Anchor of a parallel group that opens the plan.
pub const ROOT_FORK_ANCHOR: &str = "__fork__#0";

/// Flat walk order plus side tables.
///
/// `conditional_branches` and `parallel_branches` are the id-keyed view.
/// The interpreter walks the positional tables (`routes`, `forks`), which
/// stay exact when the same unit id appears at several positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
  pub(crate) sequence: Vec<String>,
  pub(crate) conditional_branches: BTreeMap<String, BTreeMap<String, String>>,
  pub(crate) parallel_branches: BTreeMap<String, Vec<String>>,
  pub(crate) routes: BTreeMap<usize, RouteSite>,
  pub(crate) forks: BTreeMap<usize, ForkSite>,
}

/// A router and the arms it chooses between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSite {
  pub router: String,
  /// Keyed by condition label.
  pub arms: BTreeMap<String, Arm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arm {
  /// First unit of the arm.
  pub target: String,
  /// Positions of the arm in `sequence`.
  pub span: Range<usize>,
}

/// A parallel group, keyed in `ExecutionPlan::forks` by its first position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkSite {
  pub anchor: String,
  /// Position of the anchor unit; `None` for virtual anchors.
  pub anchor_index: Option<usize>,
  /// Positions the group's branches occupy in `sequence`.
  pub span: Range<usize>,
  pub branches: Vec<Branch>,
}

/// One branch of a group: its entry id and the plan its task walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
  pub entry: String,
  pub plan: Arc<ExecutionPlan>,
}

impl Branch {
  /// A branch made of one unit, as produced by a dynamic fork.
  pub fn single(unit_id: impl Into<String>) -> Self {
    let unit_id = unit_id.into();
    Self {
      entry: unit_id.clone(),
      plan: Arc::new(ExecutionPlan::single(unit_id)),
    }
  }
}

impl ExecutionPlan {
  pub(crate) fn single(unit_id: String) -> Self {
    Self {
      sequence: vec![unit_id],
      ..Self::default()
    }
  }

  pub fn sequence(&self) -> &[String] {
    &self.sequence
  }

  pub fn len(&self) -> usize {
    self.sequence.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sequence.is_empty()
  }

  pub fn conditional_branches(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
    &self.conditional_branches
  }

  pub fn parallel_branches(&self) -> &BTreeMap<String, Vec<String>> {
    &self.parallel_branches
  }

  /// Label -> target for `router`.
  pub fn branch_targets(&self, router: &str) -> Option<&BTreeMap<String, String>> {
    self.conditional_branches.get(router)
  }

  /// Branch entry ids forked after `anchor`.
  pub fn fork_branches(&self, anchor: &str) -> Option<&[String]> {
    self.parallel_branches.get(anchor).map(Vec::as_slice)
  }

  pub fn route_sites(&self) -> &BTreeMap<usize, RouteSite> {
    &self.routes
  }

  pub fn fork_sites(&self) -> &BTreeMap<usize, ForkSite> {
    &self.forks
  }

  pub(crate) fn route_at(&self, position: usize) -> Option<&RouteSite> {
    self.routes.get(&position)
  }

  pub(crate) fn fork_at(&self, position: usize) -> Option<&ForkSite> {
    self.forks.get(&position)
  }
}

pub fn is_virtual_anchor(anchor: &str) -> bool {
  anchor.starts_with(VIRTUAL_ANCHOR_PREFIX)
}

impl fmt::Display for ExecutionPlan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "sequence=[{}]", self.sequence.join(", "))?;
    for (router, targets) in &self.conditional_branches {
      let arms: Vec<String> = targets.iter().map(|(label, target)| format!("{}:{}", label, target)).collect();
      write!(f, " route[{}]={{{}}}", router, arms.join(", "))?;
    }
    for (anchor, entries) in &self.parallel_branches {
      write!(f, " fork[{}]=[{}]", anchor, entries.join(", "))?;
    }
    Ok(())
  }
}
