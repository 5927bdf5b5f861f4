//! 编排引擎：分类、路由、执行、总结与事件发射

pub mod classifier;
pub mod events;
pub mod harness;
pub mod router;
pub mod summarizer;
pub mod supervisor;

pub use classifier::IntentClassifier;
pub use events::{EventEmitter, RunEvent, TaskStatus};
pub use harness::ExecutionHarness;
pub use router::{Decision, Router};
pub use summarizer::Summarizer;
pub use supervisor::{RunOutcome, Supervisor};
