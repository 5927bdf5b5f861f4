//! 编排错误分类
//!
//! 按影响面分层：Planning 与 Summarization 由兜底逻辑就地恢复；
//! Capability / CapabilityTimeout / Cancelled 记入执行日志后运行继续；
//! Terminal 表示不变量被破坏，直接终止整次运行。

use thiserror::Error;

use crate::core::capability::Capability;

/// 单次运行中可能出现的错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 规划阶段失败（LLM 不可用或输出无法解析），由关键词兜底接管
    #[error("Planning failed: {0}")]
    Planning(String),

    /// 能力执行失败，隔离在该能力内部
    #[error("{capability} failed: {reason}")]
    Capability {
        capability: Capability,
        reason: String,
    },

    #[error("{0} timed out")]
    CapabilityTimeout(Capability),

    #[error("Run cancelled")]
    Cancelled,

    /// 总结阶段失败，由确定性兜底总结接管
    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 不变量被破坏（重复执行、路由循环越界），整次运行终止
    #[error("Terminal: {0}")]
    Terminal(String),
}

impl OrchestratorError {
    /// 该错误是否终止整次运行（其余错误均可在运行内消化）
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorError::Terminal(_))
    }
}
