//! 意图分类：LLM 规划与关键词兜底
//!
//! 主路径调用 LLM 得到 JSON 计划；解析失败或模型不可用时退回
//! 小写子串匹配的关键词计划，分类永不失败。

use std::sync::Arc;

use crate::config::ClassifierSection;
use crate::core::{OrchestratorError, Plan};
use crate::llm::{LlmClient, Message};

const PLANNING_SYSTEM_PROMPT: &str = "\
You are the planning stage of a concierge service that coordinates four capabilities. \
Decide which capabilities the user's request needs.

Capabilities:
- locate: search for businesses and places (restaurants, cafes, hotels, shops)
- schedule: add events, bookings and appointments to the calendar
- call: place a phone call to a business
- research: answer general knowledge questions

Respond with JSON only, no other text:
{\"locate\": true|false, \"schedule\": true|false, \"call\": true|false, \"research\": true|false, \"rationale\": \"one short sentence\"}";

/// 意图分类器：持有 LLM 与关键词表
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    keywords: ClassifierSection,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, keywords: ClassifierSection) -> Self {
        Self { llm, keywords }
    }

    /// 对请求产出完整计划；任何失败都落到关键词兜底
    pub async fn classify(&self, request: &str) -> Plan {
        let messages = [
            Message::system(PLANNING_SYSTEM_PROMPT),
            Message::user(request),
        ];
        match self.llm.complete(&messages).await {
            Ok(output) => match parse_plan(&output) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!(error = %e, "plan parse failed, using keyword fallback");
                    self.fallback_plan(request)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "planning llm failed, using keyword fallback");
                self.fallback_plan(request)
            }
        }
    }

    /// 关键词兜底：小写请求文本的子串包含判定，四个键全部给出
    pub(crate) fn fallback_plan(&self, request: &str) -> Plan {
        let lower = request.to_lowercase();
        let hit = |keywords: &[String]| keywords.iter().any(|kw| lower.contains(kw.as_str()));
        Plan {
            locate: hit(&self.keywords.locate_keywords),
            research: hit(&self.keywords.research_keywords),
            schedule: hit(&self.keywords.schedule_keywords),
            call: hit(&self.keywords.call_keywords),
            rationale: Some("keyword fallback".to_string()),
        }
    }
}

/// 从 LLM 输出提取 JSON 并解析为 Plan（```json 围栏或首尾大括号）
pub fn parse_plan(output: &str) -> Result<Plan, OrchestratorError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) => &trimmed[start..=end],
            None => trimmed,
        }
    } else {
        return Err(OrchestratorError::Planning(format!(
            "no JSON object in output: {}",
            trimmed
        )));
    };

    serde_json::from_str(json_str)
        .map_err(|e| OrchestratorError::Planning(format!("{}: {}", e, json_str)))
}
