// src/lib.rs

//! flowrig: an async workflow orchestration engine.
//!
//! Flows are written in a small expression language and compiled into a
//! flat execution plan, which the interpreter walks against user units:
//!  - `A -> B -> C` runs units in sequence.
//!  - `A -> B ? C : D` lets unit `B` route to `C` or `D` at run time.
//!  - `A -> (B, C) -> D` forks `B` and `C` on a bounded worker pool and joins on `D`.
//!  - `name = B -> C; A -> name` binds aliases that expand inline.
//!
//! Each invocation gets its own `RunScope` and always returns a `RunResult`;
//! unit failures, missing units and malformed expressions are captured in it.

pub mod config;
pub mod core;
pub mod error;
pub mod execution;
pub mod expr;
pub mod plan;
pub mod registry;

// --- Re-exports for the Public API ---

pub use crate::config::EngineConfig;
pub use crate::core::context::{DefaultFlowContext, FlowContext, PayloadContext};
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{RunResult, RunStatus};
pub use crate::core::scope::{RunScope, COMPLETED_BRANCHES_KEY, STOP_SIGNAL};
pub use crate::core::unit::{FnUnit, Unit, UnitContext};

pub use crate::expr::{parse, Node};
pub use crate::plan::{compile, ExecutionPlan, PlanCache, ROOT_FORK_ANCHOR};

pub use crate::execution::{FlowExecutor, FlowExecutorBuilder, ListenerPhase, ListenerTarget, Listeners, UnitEvent, WorkerPool};
pub use crate::registry::{FlowRegistry, InMemoryRegistry};

pub use crate::error::{FlowError, FlowResult, LifecyclePhase, ParseError};

/*
    Typical setup:
    1. Implement `Unit` for each processing step (or wrap a closure in `FnUnit`).
    2. Register units and flow expressions in an `InMemoryRegistry`.
    3. Build a `FlowExecutor` over the registry, optionally with listeners and an `EngineConfig`.
    4. Call `executor.execute("flow_id", context).await` and inspect the `RunResult`.
*/
