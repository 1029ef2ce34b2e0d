pub mod cache;
pub mod compile;
pub mod definition;

pub use cache::PlanCache;
pub use compile::compile;
pub use definition::{
  is_virtual_anchor, Arm, Branch, ExecutionPlan, ForkSite, RouteSite, FALSE_LABEL, ROOT_FORK_ANCHOR, TRUE_LABEL,
  VIRTUAL_ANCHOR_PREFIX,
};
