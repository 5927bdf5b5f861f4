//! 运行状态：单次请求的全部可变记录
//!
//! RunState 由编排引擎独占，贯穿 分类 → 路由/执行循环 → 总结；
//! 执行日志只追加，结果写入后不再变更。仅 ExecutionHarness 在
//! 单线程步骤内写入，因此无需任何锁。

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::core::capability::{Capability, Plan};

/// 单次尝试的结果标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
        }
    }
}

/// 执行日志条目：能力 + 结果标签；序号即在序列中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub capability: Capability,
    pub outcome: Outcome,
}

/// 能力执行结果：成功位、结构化载荷（路由器不解读）、人类可读渲染、错误信息
#[derive(Debug, Clone)]
pub struct CapabilityResult {
    pub success: bool,
    pub payload: Value,
    pub rendered: String,
    pub error: Option<String>,
}

impl CapabilityResult {
    pub fn ok(payload: Value, rendered: impl Into<String>) -> Self {
        Self {
            success: true,
            payload,
            rendered: rendered.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, rendered: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            rendered: rendered.into(),
            error: Some(error.into()),
        }
    }

    /// 载荷中的 results 是否为非空数组（locate 的载荷约定）
    pub fn has_results(&self) -> bool {
        self.payload
            .get("results")
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }
}

/// 单次运行的状态记录：原始请求、计划、执行日志、结果映射、最终总结
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub request: String,
    pub plan: Plan,
    records: Vec<ExecutionRecord>,
    results: BTreeMap<Capability, CapabilityResult>,
    pub summary: Option<String>,
}

impl RunState {
    pub fn new(request: impl Into<String>, plan: Plan) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request: request.into(),
            plan,
            records: Vec::new(),
            results: BTreeMap::new(),
            summary: None,
        }
    }

    /// 某能力是否已被尝试过（无论成败）
    pub fn attempted(&self, capability: Capability) -> bool {
        self.records.iter().any(|r| r.capability == capability)
    }

    /// 追加一条执行记录及其结果（每次尝试恰好一条；由 Harness 调用）
    pub(crate) fn push_attempt(&mut self, capability: Capability, result: CapabilityResult) {
        let outcome = if result.success {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        self.records.push(ExecutionRecord {
            capability,
            outcome,
        });
        self.results.insert(capability, result);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn result(&self, capability: Capability) -> Option<&CapabilityResult> {
        self.results.get(&capability)
    }

    pub fn rendering(&self, capability: Capability) -> Option<&str> {
        self.results.get(&capability).map(|r| r.rendered.as_str())
    }

    /// locate 是否已成功完成
    pub fn locate_succeeded(&self) -> bool {
        self.result(Capability::Locate)
            .map(|r| r.success)
            .unwrap_or(false)
    }

    /// locate 是否成功且带回至少一条结果（自动触发规则的判据）
    pub fn locate_has_results(&self) -> bool {
        self.result(Capability::Locate)
            .map(|r| r.success && r.has_results())
            .unwrap_or(false)
    }
}
