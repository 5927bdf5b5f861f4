//! 执行壳
//!
//! 查找适配器并在超时与取消令牌约束内调用；任何失败（适配器报错、超时、
//! 取消、适配器缺失）都转为 success=false 的结果而不向上抛出。每次尝试
//! 恰好追加一条执行记录与一条结果，并输出一行 JSON 审计日志。
//! 唯一的例外是对同一能力的重复尝试，这属于不变量破坏，直接终止运行。

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::agents::AdapterRegistry;
use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};

/// 执行壳：持有注册表与单次调用超时
pub struct ExecutionHarness {
    adapters: AdapterRegistry,
    timeout: Duration,
}

impl ExecutionHarness {
    pub fn new(adapters: AdapterRegistry, timeout_secs: u64) -> Self {
        Self {
            adapters,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行一次能力调用并记录结果
    pub async fn run(
        &self,
        capability: Capability,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        if state.attempted(capability) {
            return Err(OrchestratorError::Terminal(format!(
                "{} attempted twice in one run",
                capability
            )));
        }

        let start = Instant::now();
        let (result, outcome) = match self.adapters.get(capability) {
            None => (failure(capability, "no adapter registered"), "error"),
            Some(adapter) => {
                tokio::select! {
                    _ = cancel.cancelled() => (failure(capability, "cancelled"), "cancelled"),
                    invoked = tokio::time::timeout(self.timeout, adapter.invoke(&state.request, state)) => {
                        match invoked {
                            Ok(Ok(result)) => {
                                let outcome = if result.success { "ok" } else { "error" };
                                (result, outcome)
                            }
                            Ok(Err(e)) => {
                                // Capability 变体只保留裸原因，避免渲染里重复前缀
                                let reason = match e {
                                    OrchestratorError::Capability { reason, .. } => reason,
                                    other => other.to_string(),
                                };
                                (failure(capability, reason), "error")
                            }
                            Err(_) => (
                                failure(
                                    capability,
                                    format!("timed out after {}s", self.timeout.as_secs()),
                                ),
                                "timeout",
                            ),
                        }
                    }
                }
            }
        };

        let audit = serde_json::json!({
            "event": "capability_audit",
            "capability": capability.as_str(),
            "ok": result.success,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "run_id": state.run_id.to_string(),
        });
        tracing::info!(audit = %audit.to_string(), "capability");

        state.push_attempt(capability, result);
        Ok(())
    }
}

/// 失败结果：错误信息 + 标准失败渲染
fn failure(capability: Capability, reason: impl Into<String>) -> CapabilityResult {
    let reason = reason.into();
    let rendered = format!("❌ {} Agent Error: {}", capability.display(), reason);
    CapabilityResult::failed(reason, rendered)
}
