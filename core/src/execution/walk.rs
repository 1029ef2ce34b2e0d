// flowrig/src/execution/walk.rs

//! The flow interpreter: walks a plan's sequence with a cursor.
//!
//! At each position the walk either skips (an unchosen arm, a unit already
//! run out of order), forks (a group with a virtual anchor), or executes a
//! unit. After a unit it looks at the signals that unit left in the scope:
//! stop, a dynamic fork, the static group anchored on it, and routing.

use crate::core::context::FlowContext;
use crate::core::scope::{routing_key, RunScope, STOP_SIGNAL};
use crate::error::FlowError;
use crate::execution::executor::ExecutorInner;
use crate::execution::lifecycle::UnitFailure;
use crate::plan::{Branch, ExecutionPlan, ForkSite, RouteSite, FALSE_LABEL, TRUE_LABEL};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::ops::Range;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{event, Level};

/// State shared by every walk of one flow invocation, including branch walks.
#[derive(Clone)]
pub(crate) struct Run {
  pub(crate) engine: Arc<ExecutorInner>,
  pub(crate) scope: RunScope,
  pub(crate) context: Arc<dyn FlowContext>,
  executed: Arc<Mutex<Vec<(String, String)>>>,
}

/// Outcome of walking one plan.
#[derive(Debug, Default)]
pub(crate) struct Walk {
  /// First failure; later failures are logged but never replace it.
  pub failure: Option<FlowError>,
  pub stopped: bool,
}

/// Bookkeeping local to one walk.
struct Cursor {
  /// Units of this walk hold pool permits (branch tasks).
  pooled: bool,
  bypassed: Vec<Range<usize>>,
  /// Units that ran before the walk reached their position.
  done_ahead: HashMap<String, Ahead>,
}

/// How a unit that ran ahead of its position left things.
enum Ahead {
  /// Ran as a dynamic fork branch; any label it wrote is still in the scope.
  Forked,
  /// Routed to out of order; its signals are held until its position is reached.
  Routed {
    route: Option<String>,
    fork: Option<Vec<String>>,
  },
  /// Routed to out of order and failed.
  Failed,
}

impl Cursor {
  fn new(pooled: bool) -> Self {
    Self {
      pooled,
      bypassed: Vec::new(),
      done_ahead: HashMap::new(),
    }
  }

  fn bypass_end(&self, position: usize) -> Option<usize> {
    self.bypassed.iter().find(|r| r.contains(&position)).map(|r| r.end)
  }

  /// `true` when the walk will still reach `unit_id` after `position`.
  fn reaches(&self, plan: &ExecutionPlan, position: usize, unit_id: &str) -> bool {
    plan
      .sequence
      .iter()
      .enumerate()
      .skip(position + 1)
      .any(|(p, id)| id == unit_id && self.bypass_end(p).is_none())
  }
}

enum Step {
  Next(usize),
  Halt,
}

impl Run {
  pub(crate) fn new(engine: Arc<ExecutorInner>, scope: RunScope, context: Arc<dyn FlowContext>) -> Self {
    Self {
      engine,
      scope,
      context,
      executed: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub(crate) fn record_executed(&self, unit_id: &str, name: &str) {
    self.executed.lock().push((unit_id.to_string(), name.to_string()));
  }

  fn has_executed(&self, unit_id: &str) -> bool {
    self.executed.lock().iter().any(|(id, _)| id == unit_id)
  }

  /// Unit names in execution order.
  pub(crate) fn executed_names(&self) -> Vec<String> {
    self.executed.lock().iter().map(|(_, name)| name.clone()).collect()
  }

  /// Walks `plan` to its end, a stop signal, or a failure that may not be continued past.
  ///
  /// Boxed so branch walks can recurse through the parallel executor.
  pub(crate) fn walk(self, plan: Arc<ExecutionPlan>, pooled: bool) -> Pin<Box<dyn Future<Output = Walk> + Send>> {
    Box::pin(async move {
      let mut walk = Walk::default();
      let mut cursor = Cursor::new(pooled);
      let mut i = 0;

      while i < plan.sequence.len() {
        if let Some(end) = cursor.bypass_end(i) {
          i = end;
          continue;
        }

        if let Some(site) = plan.fork_at(i) {
          if site.anchor_index.is_some() {
            // Reached a statically anchored group without forking: its anchor failed.
            event!(Level::DEBUG, anchor = %site.anchor, "Skipping parallel group of failed anchor.");
            i = site.span.end;
            continue;
          }
          match self.run_group(&plan, site, site.branches.clone(), &mut walk, &mut cursor).await {
            Step::Next(next) => i = next,
            Step::Halt => break,
          }
          continue;
        }

        let unit_id = plan.sequence[i].as_str();
        if let Some(ahead) = cursor.done_ahead.remove(unit_id) {
          event!(Level::DEBUG, unit_id, "Unit already executed out of order; applying its signals here.");
          let step = match ahead {
            Ahead::Failed => {
              if let Some(route) = plan.route_at(i) {
                select_arm(route, FALSE_LABEL, &mut cursor);
              }
              Step::Next(i + 1)
            }
            Ahead::Forked => {
              let signal = self.scope.take_routing_signal(unit_id);
              self.apply_signals(&plan, i, signal, None, &mut walk, &mut cursor).await
            }
            Ahead::Routed { route, fork } => self.apply_signals(&plan, i, route, fork, &mut walk, &mut cursor).await,
          };
          match step {
            Step::Next(next) => i = next,
            Step::Halt => break,
          }
          continue;
        }

        match self.execute_unit(unit_id, cursor.pooled).await {
          Err(failure) => {
            if !self.record_failure(&mut walk, failure) {
              break;
            }
            // Signals of a failed unit are dropped; a failed router falls through to its false arm.
            self.scope.clear_signals(unit_id);
            if let Some(route) = plan.route_at(i) {
              select_arm(route, FALSE_LABEL, &mut cursor);
            }
            i += 1;
          }
          Ok(()) => match self.after_unit(&plan, i, &mut walk, &mut cursor).await {
            Step::Next(next) => i = next,
            Step::Halt => break,
          },
        }
      }

      walk
    })
  }

  /// Signal handling after the unit at `position` succeeded.
  async fn after_unit(&self, plan: &ExecutionPlan, position: usize, walk: &mut Walk, cursor: &mut Cursor) -> Step {
    let unit_id = plan.sequence[position].as_str();
    let signal = self.scope.take_routing_signal(unit_id);
    let dynamic = self.scope.take_fork_signal(unit_id);
    self.apply_signals(plan, position, signal, dynamic, walk, cursor).await
  }

  /// Stop, then fork, then route, for the signals of the unit at `position`.
  async fn apply_signals(
    &self,
    plan: &ExecutionPlan,
    position: usize,
    signal: Option<String>,
    dynamic: Option<Vec<String>>,
    walk: &mut Walk,
    cursor: &mut Cursor,
  ) -> Step {
    let unit_id = plan.sequence[position].as_str();
    if signal.as_deref() == Some(STOP_SIGNAL) {
      event!(Level::INFO, unit_id, scope_id = self.scope.id(), "Stop signal received; ending walk.");
      walk.stopped = true;
      return Step::Halt;
    }

    let static_site = anchored_site(plan, position);
    let dynamic = dynamic.filter(|entries| !entries.is_empty());

    match (dynamic, static_site) {
      (Some(entries), Some(site)) => {
        event!(Level::DEBUG, unit_id, branches = ?entries, "Fork branches replaced at run time.");
        let branches = entries.iter().map(Branch::single).collect();
        return self.run_group(plan, site, branches, walk, cursor).await;
      }
      (None, Some(site)) => return self.run_group(plan, site, site.branches.clone(), walk, cursor).await,
      (Some(entries), None) => {
        event!(Level::DEBUG, unit_id, branches = ?entries, "Forking branches chosen at run time.");
        let branches = entries.iter().map(Branch::single).collect();
        match self.fork(unit_id, branches, cursor.pooled).await {
          Ok(()) => {
            let rest = &plan.sequence[position + 1..];
            cursor
              .done_ahead
              .extend(entries.into_iter().filter(|e| rest.contains(e)).map(|e| (e, Ahead::Forked)));
          }
          Err(error) => {
            if !self.record_group_failure(walk, error) {
              return Step::Halt;
            }
          }
        }
      }
      (None, None) => {}
    }

    self.route_after(plan, position, signal, walk, cursor).await.or_next(position + 1)
  }

  /// Runs a group, then routes on its last unit when that unit is a router.
  async fn run_group(
    &self,
    plan: &ExecutionPlan,
    site: &ForkSite,
    branches: Vec<Branch>,
    walk: &mut Walk,
    cursor: &mut Cursor,
  ) -> Step {
    let next = site.span.end;
    if let Err(error) = self.fork(&site.anchor, branches, cursor.pooled).await {
      if !self.record_group_failure(walk, error) {
        return Step::Halt;
      }
      return Step::Next(next);
    }
    // A router closing the group signalled from inside its branch task.
    let last = next - 1;
    if plan.route_at(last).is_some() {
      let signal = self.scope.take_routing_signal(&plan.sequence[last]);
      return self.route_after(plan, last, signal, walk, cursor).await.or_next(next);
    }
    Step::Next(next)
  }

  /// Applies `signal`, the routing value left by the unit at `position`.
  /// Returns `Step::Next` with no particular position; callers pick it.
  async fn route_after(
    &self,
    plan: &ExecutionPlan,
    position: usize,
    signal: Option<String>,
    walk: &mut Walk,
    cursor: &mut Cursor,
  ) -> Step {
    let unit_id = plan.sequence[position].as_str();

    match (plan.route_at(position), signal) {
      (_, Some(stop)) if stop == STOP_SIGNAL => {
        walk.stopped = true;
        Step::Halt
      }
      (Some(route), None) => {
        event!(Level::WARN, router = %route.router, "Router left no routing signal; taking the false arm.");
        select_arm(route, FALSE_LABEL, cursor);
        Step::Next(position)
      }
      (Some(route), Some(target)) => match arm_label(route, &target) {
        Some(label) => {
          event!(Level::DEBUG, router = %route.router, label, "Routing to arm.");
          select_arm(route, label, cursor);
          Step::Next(position)
        }
        None => {
          cursor.bypassed.extend(route.arms.values().map(|arm| arm.span.clone()));
          self.jump_to(plan, position, &target, walk, cursor).await
        }
      },
      (None, Some(target)) if target == TRUE_LABEL || target == FALSE_LABEL => {
        // Not a router in this plan; an enclosing walk may be routing on it.
        self.scope.set(routing_key(unit_id), target);
        Step::Next(position)
      }
      (None, Some(target)) => self.jump_to(plan, position, &target, walk, cursor).await,
      (None, None) => Step::Next(position),
    }
  }

  /// Executes `target` out of declared order, on behalf of the unit at `from`.
  ///
  /// When the walk will reach `target` later, its signals are held until then
  /// so its route and fork apply at its own position.
  async fn jump_to(&self, plan: &ExecutionPlan, from: usize, target: &str, walk: &mut Walk, cursor: &mut Cursor) -> Step {
    if self.has_executed(target) {
      event!(Level::WARN, target, "Routing target already executed; ignoring.");
      return Step::Next(0);
    }
    event!(Level::DEBUG, target, "Routing out of order.");
    let ahead = cursor.reaches(plan, from, target);

    match self.execute_unit(target, cursor.pooled).await {
      Ok(()) => {
        let route = self.scope.take_routing_signal(target);
        if route.as_deref() == Some(STOP_SIGNAL) {
          walk.stopped = true;
          return Step::Halt;
        }
        let fork = self.scope.take_fork_signal(target).filter(|entries| !entries.is_empty());
        if ahead {
          cursor.done_ahead.insert(target.to_string(), Ahead::Routed { route, fork });
          return Step::Next(0);
        }
        if let Some(label) = route {
          event!(Level::DEBUG, target, label = %label, "Routing target is not a router on this walk; ignoring its signal.");
        }
        match fork {
          Some(entries) => {
            let branches = entries.iter().map(Branch::single).collect();
            match self.fork(target, branches, cursor.pooled).await {
              Ok(()) => Step::Next(0),
              Err(error) => {
                if self.record_group_failure(walk, error) {
                  Step::Next(0)
                } else {
                  Step::Halt
                }
              }
            }
          }
          None => Step::Next(0),
        }
      }
      Err(failure) => {
        let proceed = self.record_failure(walk, failure);
        self.scope.clear_signals(target);
        if !proceed {
          return Step::Halt;
        }
        if ahead {
          cursor.done_ahead.insert(target.to_string(), Ahead::Failed);
        }
        Step::Next(0)
      }
    }
  }

  /// Records a unit failure. Returns `true` when the walk may continue.
  fn record_failure(&self, walk: &mut Walk, failure: UnitFailure) -> bool {
    let proceed = !failure.error.is_not_found() && (self.context.continue_on_error() || failure.continue_on_error);
    keep_first(walk, failure.error);
    if proceed {
      event!(Level::WARN, scope_id = self.scope.id(), "Continuing past failed unit.");
    }
    proceed
  }

  fn record_group_failure(&self, walk: &mut Walk, error: FlowError) -> bool {
    let proceed = self.context.continue_on_error() && !error.root_cause().is_not_found();
    keep_first(walk, error);
    proceed
  }
}

/// The group anchored on the unit at `position`, if any.
fn anchored_site(plan: &ExecutionPlan, position: usize) -> Option<&ForkSite> {
  plan
    .fork_at(position + 1)
    .filter(|site| site.anchor_index == Some(position))
}

fn select_arm(route: &RouteSite, label: &str, cursor: &mut Cursor) {
  cursor.bypassed.extend(
    route
      .arms
      .iter()
      .filter(|(l, _)| l.as_str() != label)
      .map(|(_, arm)| arm.span.clone()),
  );
}

fn arm_label<'a>(route: &'a RouteSite, target: &str) -> Option<&'a str> {
  route
    .arms
    .iter()
    .find(|(label, arm)| label.as_str() == target || arm.target == target)
    .map(|(label, _)| label.as_str())
}

fn keep_first(walk: &mut Walk, error: FlowError) {
  match walk.failure {
    None => walk.failure = Some(error),
    Some(_) => event!(Level::WARN, error = %error, "Further failure after the run already failed."),
  }
}

impl Step {
  fn or_next(self, next: usize) -> Step {
    match self {
      Step::Next(_) => Step::Next(next),
      Step::Halt => Step::Halt,
    }
  }
}
