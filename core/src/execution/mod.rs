pub mod executor;
pub mod hooks;
pub(crate) mod lifecycle;
pub(crate) mod parallel;
pub mod pool;
pub(crate) mod walk;

pub use executor::{FlowExecutor, FlowExecutorBuilder};
pub use hooks::{Listener, ListenerPhase, ListenerTarget, Listeners, UnitEvent};
pub use pool::WorkerPool;
