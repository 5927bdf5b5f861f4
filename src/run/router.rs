//! 路由器：从运行状态决定下一个能力
//!
//! RunState 的纯函数，可重复调用且结论不变。固定优先级：locate=1、
//! research=2；schedule/call 依赖 locate 的结果，预订意图时 schedule
//! 先于 call，否则相反。失败过的能力不再入选，运行内无重试。

use crate::core::{Capability, RunState};

/// 路由结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Invoke(Capability),
    Terminal,
}

/// 路由器：仅持有预订意图词表，其余全部来自 RunState
pub struct Router {
    reservation_keywords: Vec<String>,
}

impl Router {
    pub fn new(reservation_keywords: Vec<String>) -> Self {
        Self {
            reservation_keywords,
        }
    }

    /// 选出当前最高优先级的合格候选；没有则终态
    pub fn next(&self, state: &RunState) -> Decision {
        let reservation = self.reservation_intent(&state.request);

        let mut best: Option<(u8, Capability)> = None;
        for capability in Capability::ALL {
            if !self.selectable(capability, state) {
                continue;
            }
            let priority = priority_of(capability, reservation);
            let better = match best {
                None => true,
                Some((p, c)) => priority < p || (priority == p && capability < c),
            };
            if better {
                best = Some((priority, capability));
            }
        }

        match best {
            Some((_, capability)) => Decision::Invoke(capability),
            None => Decision::Terminal,
        }
    }

    fn selectable(&self, capability: Capability, state: &RunState) -> bool {
        if state.attempted(capability) {
            return false;
        }
        match capability {
            Capability::Locate | Capability::Research => state.plan.needs(capability),
            Capability::Schedule => state.plan.schedule && dependents_unblocked(state),
            Capability::Call => {
                (state.plan.call || auto_call(state)) && dependents_unblocked(state)
            }
        }
    }

    fn reservation_intent(&self, request: &str) -> bool {
        let lower = request.to_lowercase();
        self.reservation_keywords
            .iter()
            .any(|kw| lower.contains(kw.as_str()))
    }
}

/// schedule/call 的前置条件：locate 不在计划中，或已成功完成
fn dependents_unblocked(state: &RunState) -> bool {
    !state.plan.locate || state.locate_succeeded()
}

/// 自动触发：计划要 schedule 而不要 call，且 locate 已成功带回结果时，
/// call 以其正常优先级入选（预订默认需要联系被找到的对象）
fn auto_call(state: &RunState) -> bool {
    !state.plan.call && state.plan.schedule && state.locate_has_results()
}

fn priority_of(capability: Capability, reservation: bool) -> u8 {
    match capability {
        Capability::Locate => 1,
        Capability::Research => 2,
        Capability::Schedule => {
            if reservation {
                3
            } else {
                4
            }
        }
        Capability::Call => {
            if reservation {
                4
            } else {
                3
            }
        }
    }
}
