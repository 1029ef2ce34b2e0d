// flowrig/src/core/scope.rs

//! `RunScope`: the isolated state of one flow invocation.
//!
//! A scope is created when a run starts and is shared by reference with
//! every unit of that run, including units on parallel branches. Distinct
//! runs never see each other's scope.
//!
//! Besides user data, the scope carries the engine's signal keys. Routing
//! and fork signals are scoped per unit (`<key>:<unit id>`) so that two
//! branches signalling at the same time write to different slots.

use crate::core::context_data::ContextData;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Prefix of a unit's routing signal. The value is a label, a unit id or `STOP_SIGNAL`.
pub const ROUTING_TARGET_KEY: &str = "__routing_target__";
/// Prefix of a unit's dynamic fork signal. The value is a `Vec<String>` of branch entries.
pub const FORK_BRANCHES_KEY: &str = "__fork_branches__";
/// Where the parallel executor publishes the ids of the branches that completed.
pub const COMPLETED_BRANCHES_KEY: &str = "__completed_branches__";
/// Routing value that ends the current walk.
pub const STOP_SIGNAL: &str = "__STOP__";

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
static LIVE_SCOPES: AtomicUsize = AtomicUsize::new(0);

type Value = Arc<dyn Any + Send + Sync>;

struct ScopeInner {
  id: u64,
  started_at: DateTime<Utc>,
  ended_at: Mutex<Option<DateTime<Utc>>>,
  data: ContextData<HashMap<String, Value>>,
}

impl Drop for ScopeInner {
  fn drop(&mut self) {
    LIVE_SCOPES.fetch_sub(1, Ordering::AcqRel);
  }
}

/// Cloneable handle to the per-run store.
#[derive(Clone)]
pub struct RunScope(Arc<ScopeInner>);

impl RunScope {
  pub(crate) fn new() -> Self {
    LIVE_SCOPES.fetch_add(1, Ordering::AcqRel);
    RunScope(Arc::new(ScopeInner {
      id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
      started_at: Utc::now(),
      ended_at: Mutex::new(None),
      data: ContextData::new(HashMap::new()),
    }))
  }

  /// Number of scopes currently alive in the process.
  pub fn live() -> usize {
    LIVE_SCOPES.load(Ordering::Acquire)
  }

  pub fn id(&self) -> u64 {
    self.0.id
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.0.started_at
  }

  /// `None` until the run has finished.
  pub fn ended_at(&self) -> Option<DateTime<Utc>> {
    *self.0.ended_at.lock()
  }

  /// Elapsed time of the run; measured up to now while it is still running.
  pub fn duration(&self) -> chrono::Duration {
    let end = self.ended_at().unwrap_or_else(Utc::now);
    end - self.0.started_at
  }

  pub(crate) fn finish(&self) {
    let mut ended = self.0.ended_at.lock();
    if ended.is_none() {
      *ended = Some(Utc::now());
    }
  }

  pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
    self.0.data.write().insert(key.into(), Arc::new(value));
  }

  /// Clones the value out. `None` when absent or of another type.
  pub fn get<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
    self.0.data.read().get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
  }

  pub fn get_shared<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
    let value = self.0.data.read().get(key).cloned()?;
    value.downcast::<T>().ok()
  }

  /// Removes the value and returns it if it has type `T`.
  /// A value of another type is left in place.
  pub fn take<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
    let mut data = self.0.data.write();
    let value = data.get(key)?.downcast_ref::<T>()?.clone();
    data.remove(key);
    Some(value)
  }

  pub fn remove(&self, key: &str) -> bool {
    self.0.data.write().remove(key).is_some()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.data.read().contains_key(key)
  }

  /// Keys currently present, sorted.
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.0.data.read().keys().cloned().collect();
    keys.sort();
    keys
  }

  pub fn len(&self) -> usize {
    self.0.data.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.data.read().is_empty()
  }

  pub fn clear(&self) {
    self.0.data.write().clear();
  }

  /// Branch ids published by the most recent parallel group of this run.
  pub fn completed_branches(&self) -> Vec<String> {
    self.get::<Vec<String>>(COMPLETED_BRANCHES_KEY).unwrap_or_default()
  }

  pub(crate) fn publish_completed_branches(&self, completed: Vec<String>) {
    self.set(COMPLETED_BRANCHES_KEY, completed);
  }

  pub(crate) fn take_routing_signal(&self, unit_id: &str) -> Option<String> {
    self.take::<String>(&routing_key(unit_id))
  }

  pub(crate) fn take_fork_signal(&self, unit_id: &str) -> Option<Vec<String>> {
    self.take::<Vec<String>>(&fork_key(unit_id))
  }

  /// Drops any signal a previous execution of `unit_id` left behind.
  pub(crate) fn clear_signals(&self, unit_id: &str) {
    let mut data = self.0.data.write();
    data.remove(&routing_key(unit_id));
    data.remove(&fork_key(unit_id));
  }
}

impl std::fmt::Debug for RunScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunScope")
      .field("id", &self.0.id)
      .field("started_at", &self.0.started_at)
      .field("ended_at", &self.ended_at())
      .field("keys", &self.keys())
      .finish()
  }
}

pub(crate) fn routing_key(unit_id: &str) -> String {
  format!("{}:{}", ROUTING_TARGET_KEY, unit_id)
}

pub(crate) fn fork_key(unit_id: &str) -> String {
  format!("{}:{}", FORK_BRANCHES_KEY, unit_id)
}
