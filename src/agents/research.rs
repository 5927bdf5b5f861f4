//! 背景调研 Adapter：把请求原文交给 LLM 作答。
//!
//! 唯一不依赖外部 HTTP 服务的能力；LLM 出错时向执行壳报错，
//! 由其统一转为失败结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::registry::CapabilityAdapter;
use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};
use crate::llm::{LlmClient, Message};

const RESEARCH_SYSTEM_PROMPT: &str =
    "You are a helpful research assistant. Provide accurate, concise, and well-structured information.";

/// research 能力适配器
pub struct ResearchAdapter {
    llm: Arc<dyn LlmClient>,
}

impl ResearchAdapter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CapabilityAdapter for ResearchAdapter {
    fn capability(&self) -> Capability {
        Capability::Research
    }

    async fn invoke(
        &self,
        request: &str,
        _state: &RunState,
    ) -> Result<CapabilityResult, OrchestratorError> {
        let messages = [
            Message::system(RESEARCH_SYSTEM_PROMPT),
            Message::user(request),
        ];
        let text = self.llm.complete(&messages).await.map_err(|e| {
            OrchestratorError::Capability {
                capability: Capability::Research,
                reason: e,
            }
        })?;

        let rendered = format!("🔍 Research Results for: '{}'\n\n{}\n", request, text);
        Ok(CapabilityResult::ok(json!({ "result": text }), rendered))
    }
}
