//! 核心数据层：能力集合、执行计划、运行状态与错误分类

pub mod capability;
pub mod error;
pub mod state;

pub use capability::{Capability, Plan};
pub use error::OrchestratorError;
pub use state::{CapabilityResult, ExecutionRecord, Outcome, RunState};
