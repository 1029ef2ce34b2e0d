pub mod context;
pub mod context_data;
pub mod control;
pub mod scope;
pub mod unit;

pub use context::{AsAny, DefaultFlowContext, FlowContext, PayloadContext};
pub use context_data::ContextData;
pub use control::{RunResult, RunStatus};
pub use scope::RunScope;
pub use unit::{FnUnit, Unit, UnitContext, UnitHandler};
