//! Concierge - 多能力编排服务
//!
//! 模块划分：
//! - **agents**: 能力适配器（locate / schedule / call / research）与注册表
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 能力枚举、执行计划、运行状态与错误类型
//! - **llm**: LLM 客户端抽象与实现（Gemini / Mock）
//! - **run**: 编排引擎（意图分类、路由、执行壳、总结、事件流）

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod run;

pub use run::Supervisor;
