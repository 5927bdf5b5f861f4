//! 能力集合与执行计划
//!
//! Capability 为封闭枚举，未知能力名在编译期即不可表达；
//! Plan 是分类器产出的布尔需求向量，单次运行内不可变。

use serde::{Deserialize, Serialize};

/// 可编排的能力（枚举声明顺序即路由同优先级时的决胜顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 地点检索（为 schedule / call 提供数据）
    Locate,
    /// 背景研究（完全独立）
    Research,
    /// 日程管理（若 locate 在计划内则依赖其成功结果）
    Schedule,
    /// 外呼电话（若 locate 在计划内则依赖其成功结果）
    Call,
}

impl Capability {
    /// 全集，按决胜顺序排列
    pub const ALL: [Capability; 4] = [
        Capability::Locate,
        Capability::Research,
        Capability::Schedule,
        Capability::Call,
    ];

    /// 线上协议名称（事件 capabilityName 字段与 outputs 键）
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Locate => "locate",
            Capability::Research => "research",
            Capability::Schedule => "schedule",
            Capability::Call => "call",
        }
    }

    /// 面向用户的显示名（渲染与错误文案）
    pub fn display(&self) -> &'static str {
        match self {
            Capability::Locate => "Locate",
            Capability::Research => "Research",
            Capability::Schedule => "Schedule",
            Capability::Call => "Call",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行计划：每个能力一个布尔位，外加可选的规划说明
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub locate: bool,
    #[serde(default)]
    pub research: bool,
    #[serde(default)]
    pub schedule: bool,
    #[serde(default)]
    pub call: bool,
    /// 规划说明（如关键词回退路径的标注）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Plan {
    pub fn needs(&self, capability: Capability) -> bool {
        match capability {
            Capability::Locate => self.locate,
            Capability::Research => self.research,
            Capability::Schedule => self.schedule,
            Capability::Call => self.call,
        }
    }

    /// 计划内能力数（用于 plan recap 事件文案）
    pub fn planned_count(&self) -> usize {
        Capability::ALL.iter().filter(|c| self.needs(**c)).count()
    }

    /// 计划内能力列表（决胜顺序）
    pub fn planned(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.needs(*c))
            .collect()
    }
}
