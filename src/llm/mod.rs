//! LLM 层：客户端抽象与实现（Gemini / Mock）

use std::sync::Arc;

pub mod gemini;
pub mod mock;
pub mod traits;

pub use gemini::GeminiClient;
pub use mock::MockLlmClient;
pub use traits::{LlmClient, Message, Role};

use crate::config::LlmSection;

/// 按配置与环境变量选择 LLM 后端
///
/// provider = "mock" 或未配置 API key 时回退 Mock；
/// 此时分类与总结走各自的确定性兜底，服务仍可完整运行。
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    if cfg.provider == "mock" {
        return Arc::new(MockLlmClient::new());
    }

    // 密钥优先取配置文件，其次环境变量
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());

    match api_key {
        Some(key) => match GeminiClient::new(cfg, key) {
            Ok(client) => {
                tracing::info!(model = %cfg.model, "llm backend: gemini");
                Arc::new(client)
            }
            Err(e) => {
                tracing::warn!(error = %e, "gemini init failed, falling back to mock llm");
                Arc::new(MockLlmClient::new())
            }
        },
        None => {
            tracing::warn!("no llm api key configured, falling back to mock llm");
            Arc::new(MockLlmClient::new())
        }
    }
}
