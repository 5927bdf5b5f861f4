//! 能力适配器层
//!
//! 每个外部能力一个适配器，统一实现 CapabilityAdapter 并注册进
//! AdapterRegistry，由执行壳按路由决定调用：
//!
//! - **maps**：locate，Google Places 文本搜索
//! - **calendar**：schedule，内存日历的增改与查询
//! - **telephone**：call，经 telephony bridge 发起呼叫
//! - **research**：research，LLM 问答

pub mod calendar;
pub mod maps;
pub mod registry;
pub mod research;
pub mod telephone;

pub use calendar::CalendarAdapter;
pub use maps::MapsAdapter;
pub use registry::{AdapterRegistry, CapabilityAdapter};
pub use research::ResearchAdapter;
pub use telephone::TelephoneAdapter;
