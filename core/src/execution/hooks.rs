// flowrig/src/execution/hooks.rs

//! Notification points around every unit lifecycle.
//!
//! Listeners are plain closures registered against a phase and a target
//! unit kind. Dispatch filters on the kind and calls matches in ascending
//! priority; equal priorities keep registration order. Listener failures
//! never affect the run.

use crate::core::context::FlowContext;
use crate::core::scope::RunScope;
use crate::error::FlowError;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerPhase {
  /// After a successful `before_run`.
  Before,
  /// After a successful `after_run`.
  After,
  /// After `on_error` of a failed unit.
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerTarget {
  Any,
  /// Units whose `Unit::kind()` equals this value.
  Kind(String),
}

impl ListenerTarget {
  pub fn kind(kind: impl Into<String>) -> Self {
    ListenerTarget::Kind(kind.into())
  }

  fn matches(&self, kind: &str) -> bool {
    match self {
      ListenerTarget::Any => true,
      ListenerTarget::Kind(k) => k == kind,
    }
  }
}

/// What a listener is told about a unit.
pub struct UnitEvent<'a> {
  pub phase: ListenerPhase,
  pub unit_id: &'a str,
  pub unit_kind: &'a str,
  pub scope: &'a RunScope,
  pub context: &'a dyn FlowContext,
  /// Set for `ListenerPhase::Error`.
  pub error: Option<&'a FlowError>,
}

pub type Listener = Arc<dyn Fn(&UnitEvent<'_>) + Send + Sync>;

struct Registration {
  phase: ListenerPhase,
  target: ListenerTarget,
  priority: i32,
  seq: u64,
  listener: Listener,
}

#[derive(Default)]
pub struct Listeners {
  entries: RwLock<Vec<Registration>>,
  next_seq: AtomicU64,
}

impl Listeners {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<F>(&self, phase: ListenerPhase, target: ListenerTarget, priority: i32, listener: F)
  where
    F: Fn(&UnitEvent<'_>) + Send + Sync + 'static,
  {
    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
    let mut entries = self.entries.write();
    entries.push(Registration {
      phase,
      target,
      priority,
      seq,
      listener: Arc::new(listener),
    });
    entries.sort_by_key(|r| (r.priority, r.seq));
  }

  pub fn on_before<F>(&self, target: ListenerTarget, priority: i32, listener: F)
  where
    F: Fn(&UnitEvent<'_>) + Send + Sync + 'static,
  {
    self.register(ListenerPhase::Before, target, priority, listener);
  }

  pub fn on_after<F>(&self, target: ListenerTarget, priority: i32, listener: F)
  where
    F: Fn(&UnitEvent<'_>) + Send + Sync + 'static,
  {
    self.register(ListenerPhase::After, target, priority, listener);
  }

  pub fn on_error<F>(&self, target: ListenerTarget, priority: i32, listener: F)
  where
    F: Fn(&UnitEvent<'_>) + Send + Sync + 'static,
  {
    self.register(ListenerPhase::Error, target, priority, listener);
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }

  pub fn clear(&self) {
    self.entries.write().clear();
  }

  /// Calls every listener matching the event's phase and kind.
  pub(crate) fn notify(&self, event: &UnitEvent<'_>) {
    // Snapshot so listeners run without the lock held and may register more.
    let matching: Vec<Listener> = self
      .entries
      .read()
      .iter()
      .filter(|r| r.phase == event.phase && r.target.matches(event.unit_kind))
      .map(|r| Arc::clone(&r.listener))
      .collect();

    for listener in matching {
      if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
        event!(Level::WARN, unit_id = event.unit_id, phase = ?event.phase, "Listener panicked; ignoring.");
      }
    }
  }
}

impl std::fmt::Debug for Listeners {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Listeners").field("registered", &self.len()).finish()
  }
}
