// flowrig/src/execution/parallel.rs

//! Fork/join over the branches of one parallel group.
//!
//! A one-branch group runs inline. Otherwise every branch walks its own
//! sub-plan on a pooled task against the shared scope. All branches are
//! awaited even after one fails; the first failure in declared branch order
//! is reported. On success the completed branch entries are published
//! in completion order for the join unit.

use crate::error::FlowError;
use crate::execution::walk::{Run, Walk};
use crate::plan::Branch;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{event, instrument, Level};

impl Run {
  #[instrument(
    name = "Run::fork",
    skip_all,
    fields(anchor = %anchor, branches = branches.len(), scope_id = self.scope.id()),
    err(Display)
  )]
  pub(crate) async fn fork(&self, anchor: &str, branches: Vec<Branch>, pooled: bool) -> Result<(), FlowError> {
    if branches.is_empty() {
      return Ok(());
    }

    if branches.len() == 1 {
      let Branch { entry, plan } = branches.into_iter().next().ok_or_else(|| FlowError::Internal("empty branch list".to_string()))?;
      let walk = self.clone().walk(plan, pooled).await;
      return match walk.failure {
        Some(source) => Err(group_error(anchor, &entry, source)),
        None => {
          self.scope.publish_completed_branches(vec![entry]);
          Ok(())
        }
      };
    }

    let completed = Arc::new(Mutex::new(Vec::with_capacity(branches.len())));
    let mut handles = Vec::with_capacity(branches.len());

    for Branch { entry, plan } in branches {
      let run = self.clone();
      let completed = Arc::clone(&completed);
      let branch_entry = entry.clone();
      let task = async move {
        let walk: Walk = run.walk(plan, true).await;
        if walk.failure.is_none() {
          completed.lock().push(branch_entry);
        }
        walk
      };
      match self.engine.pool.spawn(task) {
        Ok(handle) => handles.push((entry, Ok(handle))),
        Err(error) => handles.push((entry, Err(error))),
      }
    }

    let mut first_failure = None;
    for (entry, handle) in handles {
      let outcome = match handle {
        Err(error) => Some(error),
        Ok(handle) => match handle.await {
          Ok(Some(walk)) => walk.failure,
          Ok(None) => Some(FlowError::Interrupted {
            reason: format!("branch '{}' was cancelled by worker pool shutdown", entry),
          }),
          Err(join_error) => Some(FlowError::Interrupted {
            reason: format!("branch '{}' task aborted: {}", entry, join_error),
          }),
        },
      };
      if let Some(source) = outcome {
        event!(Level::WARN, branch = %entry, error = %source, "Branch failed.");
        if first_failure.is_none() {
          first_failure = Some(group_error(anchor, &entry, source));
        }
      }
    }

    if let Some(error) = first_failure {
      return Err(error);
    }
    let completed = std::mem::take(&mut *completed.lock());
    event!(Level::DEBUG, completed = ?completed, "Parallel group joined.");
    self.scope.publish_completed_branches(completed);
    Ok(())
  }
}

fn group_error(anchor: &str, branch: &str, source: FlowError) -> FlowError {
  FlowError::ParallelGroup {
    anchor: anchor.to_string(),
    branch: branch.to_string(),
    source: Box::new(source),
  }
}
