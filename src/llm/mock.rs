//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本顺序吐出预置响应；脚本耗尽时返回错误，
//! 正好用来验证分类器与总结器的兜底路径。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

/// Mock 客户端：每次 complete 弹出一条脚本响应
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一串响应，按 complete 调用顺序消费
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    /// 追加一条成功响应
    pub fn push_ok(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(content.into()));
    }

    /// 追加一条失败响应
    pub fn push_err(&self, reason: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(reason.into()));
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("mock llm: no scripted response".to_string()))
    }
}
