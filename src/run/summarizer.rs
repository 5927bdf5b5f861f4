//! 总结器：LLM 汇总与确定性兜底
//!
//! 主路径把原始请求与各能力渲染交给 LLM；失败或输出为空时退回纯函数
//! 模板。兜底输出只依赖 RunState 内容，不含时间戳与随机量，同一状态
//! 两次渲染逐字节一致。

use std::sync::Arc;

use crate::core::RunState;
use crate::llm::{LlmClient, Message};

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes multi-agent system results in a clear, user-friendly way.";

/// 总结器：持有 LLM
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 对整次运行产出最终文本；任何失败都落到确定性兜底
    pub async fn summarize(&self, state: &RunState) -> String {
        let messages = [
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(build_prompt(state)),
        ];
        match self.llm.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("summary llm returned empty text, using fallback summary");
                fallback_summary(state)
            }
            Err(e) => {
                tracing::warn!(error = %e, "summary llm failed, using fallback summary");
                fallback_summary(state)
            }
        }
    }
}

fn build_prompt(state: &RunState) -> String {
    let mut lines = Vec::new();
    for record in state.records() {
        if let Some(rendering) = state.rendering(record.capability) {
            if !rendering.is_empty() {
                lines.push(format!("{}: {}", record.capability.display(), rendering));
            }
        }
    }
    let results = if lines.is_empty() {
        "No agent results available.".to_string()
    } else {
        lines.join("\n")
    };

    format!(
        "You are a helpful assistant summarizing the results of a multi-agent system.\n\n\
         User Query: {}\n\n\
         Agent Results:\n{}\n\n\
         Create a clear, concise, and user-friendly summary that:\n\
         1. Acknowledges what the user asked for\n\
         2. Summarizes what each agent accomplished\n\
         3. Provides a cohesive final answer\n\n\
         Keep it natural and conversational.",
        state.request, results
    )
}

/// 确定性兜底：按执行顺序拼出各能力的渲染，零能力时明确说明
pub(crate) fn fallback_summary(state: &RunState) -> String {
    let mut parts = vec![format!("📋 Query: {}\n", state.request)];
    parts.push("\n🤖 Results:\n".to_string());

    if state.records().is_empty() {
        parts.push("ℹ️ No capabilities were executed for this request.\n".to_string());
    }
    for record in state.records() {
        let name = record.capability.display();
        let line = match state.result(record.capability) {
            Some(result) if !result.rendered.is_empty() => format!("{}\n", result.rendered),
            Some(result) if result.success => {
                format!("✅ {}: Task completed successfully\n", name)
            }
            Some(result) => format!(
                "❌ {}: {}\n",
                name,
                result.error.as_deref().unwrap_or("Unknown error")
            ),
            None => continue,
        };
        parts.push(line);
    }

    parts.push("\n✅ Processing complete.".to_string());
    parts.join("\n")
}
