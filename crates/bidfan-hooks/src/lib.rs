pub mod analytics;
pub mod builder;
pub mod changeset;
pub mod enricher;
pub mod executor;
pub mod invocation;
pub mod outcome;
pub mod plan;
pub mod repository;
pub mod stage;
pub mod stages;

pub use builder::{HookRegistration, ModuleBuilder};
pub use changeset::{ChangeSet, HookError, HookResult, MutationError, MutationType};
pub use executor::HookExecutor;
pub use invocation::{ModuleContext, ModuleContexts, ModuleInvocationContext};
pub use outcome::{
    GroupOutcome, HookAction, HookId, HookOutcome, HookStatus, RejectError, StageOutcome,
};
pub use plan::{EmptyPlanBuilder, ExecutionPlanBuilder, Group, HookWrapper, Plan, PlanBuilder};
pub use repository::{ConfigError, HookRepository, HookSet};
pub use stage::Stage;
