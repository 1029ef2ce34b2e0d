// flowrig/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// A flow expression that could not be parsed.
///
/// Parsing is all-or-nothing: the whole expression is rejected and no
/// partial AST is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid flow expression at line {line}, column {column}: {message} (input: '{input}')")]
pub struct ParseError {
  /// The expression as handed to the parser.
  pub input: String,
  /// Byte offset into `input` where parsing failed.
  pub position: usize,
  /// 1-based line of `position`.
  pub line: usize,
  /// 1-based column of `position`.
  pub column: usize,
  pub message: String,
}

impl ParseError {
  pub(crate) fn at(input: &str, position: usize, message: impl Into<String>) -> Self {
    let (line, column) = line_col(input, position);
    Self {
      input: input.to_string(),
      position,
      line,
      column,
      message: message.into(),
    }
  }
}

fn line_col(input: &str, position: usize) -> (usize, usize) {
  let mut line = 1;
  let mut column = 1;
  for (offset, ch) in input.char_indices() {
    if offset >= position {
      break;
    }
    if ch == '\n' {
      line += 1;
      column = 1;
    } else {
      column += 1;
    }
  }
  (line, column)
}

/// The lifecycle call of a unit that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
  BeforeRun,
  Run,
  AfterRun,
}

impl fmt::Display for LifecyclePhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LifecyclePhase::BeforeRun => f.write_str("before_run"),
      LifecyclePhase::Run => f.write_str("run"),
      LifecyclePhase::AfterRun => f.write_str("after_run"),
    }
  }
}

#[derive(Debug, Error)]
pub enum FlowError {
  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error("Flow not found: {flow_id}")]
  FlowNotFound { flow_id: String },

  #[error("Unit not found: {unit_id}")]
  UnitNotFound { unit_id: String },

  #[error("Unit '{unit_id}' failed in {phase}. Source: {source}")]
  UnitExecution {
    unit_id: String,
    phase: LifecyclePhase,
    #[source]
    source: AnyhowError,
  },

  #[error("Parallel group forked at '{anchor}' failed in branch '{branch}'. Source: {source}")]
  ParallelGroup {
    anchor: String,
    branch: String,
    #[source]
    source: Box<FlowError>,
  },

  #[error("Parallel execution interrupted: {reason}")]
  Interrupted { reason: String },

  #[error("Flow engine is disabled by configuration")]
  Disabled,

  #[error("Configuration error for '{key}': {message}")]
  Configuration { key: String, message: String },

  #[error("Internal flow engine error: {0}")]
  Internal(String),
}

impl FlowError {
  /// `true` for the two lookup failures (flow or unit missing from the registry).
  pub fn is_not_found(&self) -> bool {
    matches!(self, FlowError::FlowNotFound { .. } | FlowError::UnitNotFound { .. })
  }

  /// Walks through `ParallelGroup` wrappers down to the branch failure that started it.
  pub fn root_cause(&self) -> &FlowError {
    let mut current = self;
    while let FlowError::ParallelGroup { source, .. } = current {
      current = source.as_ref();
    }
    current
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
