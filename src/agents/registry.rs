//! 能力适配器注册表
//!
//! 各外部能力实现 CapabilityAdapter（capability / invoke），由 AdapterRegistry
//! 按能力枚举注册与查找；超时与失败统一由 ExecutionHarness 处理。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};

/// 能力适配器 trait：声明所属能力并执行一次调用
#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// 所属能力（注册表的键）
    fn capability(&self) -> Capability;

    /// 执行一次调用；可读取当前 RunState（如 locate 的结果）但不修改它
    async fn invoke(
        &self,
        request: &str,
        state: &RunState,
    ) -> Result<CapabilityResult, OrchestratorError>;
}

/// 适配器注册表：按能力存储 Arc<dyn CapabilityAdapter>
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Capability, Arc<dyn CapabilityAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: impl CapabilityAdapter + 'static) {
        self.adapters.insert(adapter.capability(), Arc::new(adapter));
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn CapabilityAdapter>> {
        self.adapters.get(&capability).cloned()
    }

    /// 已注册的能力（固定顺序）
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut registered: Vec<Capability> = self.adapters.keys().copied().collect();
        registered.sort();
        registered
    }
}
