//! 运行过程事件：用于流式/SSE 展示规划、执行、产出与终态
//!
//! 事件序列以恰好一条终态（complete 或 error）收尾；agent_output 按能力名
//! 去重，终态之后的一切事件被丢弃。非流式路径用 silent 发射器复用同一套
//! 去重与终态记账。

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// task 事件的阶段标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Started,
    Planned,
    Executing,
    Completed,
    Skipped,
}

/// 单条运行事件（序列化为 JSON 供前端消费）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 阶段推进（capabilityName 可为 "supervisor"）
    Task {
        status: TaskStatus,
        message: String,
        #[serde(rename = "capabilityName")]
        capability: String,
    },
    /// 某能力的人类可读产出（每个能力名至多一条）
    AgentOutput {
        #[serde(rename = "capabilityName")]
        capability: String,
        output: String,
    },
    /// 终态：最终回复 + 全部产出
    Complete {
        response: String,
        outputs: BTreeMap<String, String>,
        message: String,
    },
    /// 终态：不可恢复错误
    Error { error: String, message: String },
}

/// 事件发射器：维护 agent_output 去重集与终态标志
pub struct EventEmitter {
    tx: Option<UnboundedSender<RunEvent>>,
    emitted_outputs: HashSet<String>,
    terminal_sent: bool,
}

impl EventEmitter {
    /// 非流式运行：事件被丢弃，但去重与终态记账照常
    pub fn silent() -> Self {
        Self {
            tx: None,
            emitted_outputs: HashSet::new(),
            terminal_sent: false,
        }
    }

    pub fn streaming(tx: UnboundedSender<RunEvent>) -> Self {
        Self {
            tx: Some(tx),
            emitted_outputs: HashSet::new(),
            terminal_sent: false,
        }
    }

    pub fn task(&mut self, status: TaskStatus, capability: &str, message: impl Into<String>) {
        self.send(RunEvent::Task {
            status,
            message: message.into(),
            capability: capability.to_string(),
        });
    }

    /// 返回 false 表示该能力已产出过，事件被去重丢弃
    pub fn agent_output(&mut self, capability: &str, output: impl Into<String>) -> bool {
        if !self.emitted_outputs.insert(capability.to_string()) {
            return false;
        }
        self.send(RunEvent::AgentOutput {
            capability: capability.to_string(),
            output: output.into(),
        });
        true
    }

    /// 恰好一次的成功终态；response 为空时从产出合成最终回复
    pub fn complete(&mut self, response: String, outputs: BTreeMap<String, String>) {
        if self.terminal_sent {
            return;
        }
        let response = if response.trim().is_empty() {
            synthesize_response(&outputs)
        } else {
            response
        };
        let event = RunEvent::Complete {
            response,
            outputs,
            message: "Query processed successfully".to_string(),
        };
        self.send(event);
        self.terminal_sent = true;
    }

    /// 恰好一次的失败终态
    pub fn error(&mut self, error: impl Into<String>) {
        if self.terminal_sent {
            return;
        }
        let error = error.into();
        let event = RunEvent::Error {
            message: format!("Error processing query: {}", error),
            error,
        };
        self.send(event);
        self.terminal_sent = true;
    }

    pub fn terminal_sent(&self) -> bool {
        self.terminal_sent
    }

    fn send(&mut self, event: RunEvent) {
        if self.terminal_sent {
            return;
        }
        if let Some(ref tx) = self.tx {
            // 接收端关闭（客户端断开）时静默丢弃
            let _ = tx.send(event);
        }
    }
}

/// 总结文本缺失时，从已有产出拼出最终回复
fn synthesize_response(outputs: &BTreeMap<String, String>) -> String {
    let parts: Vec<&str> = outputs
        .iter()
        .filter(|(name, _)| name.as_str() != "supervisor")
        .map(|(_, output)| output.as_str())
        .collect();
    if parts.is_empty() {
        "Query processed successfully.".to_string()
    } else {
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(serde_json::to_value(&event).unwrap());
        }
        events
    }

    #[test]
    fn test_task_event_wire_shape() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut emitter = EventEmitter::streaming(tx);
        emitter.task(TaskStatus::Started, "supervisor", "Initializing supervisor...");

        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            serde_json::json!({
                "type": "task",
                "status": "started",
                "message": "Initializing supervisor...",
                "capabilityName": "supervisor",
            })
        );
    }

    #[test]
    fn test_agent_output_deduplicated_per_capability() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut emitter = EventEmitter::streaming(tx);
        assert!(emitter.agent_output("locate", "first"));
        assert!(!emitter.agent_output("locate", "second"));
        assert!(emitter.agent_output("research", "other"));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["capabilityName"], "locate");
        assert_eq!(events[0]["output"], "first");
        assert_eq!(events[1]["capabilityName"], "research");
    }

    #[test]
    fn test_terminal_emitted_exactly_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut emitter = EventEmitter::streaming(tx);
        emitter.complete("done".to_string(), BTreeMap::new());
        emitter.complete("again".to_string(), BTreeMap::new());
        emitter.error("late failure");
        emitter.task(TaskStatus::Executing, "locate", "after terminal");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "complete");
        assert_eq!(events[0]["response"], "done");
        assert_eq!(events[0]["message"], "Query processed successfully");
        assert!(emitter.terminal_sent());
    }

    #[test]
    fn test_empty_response_synthesized_from_outputs() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut emitter = EventEmitter::streaming(tx);
        let mut outputs = BTreeMap::new();
        outputs.insert("locate".to_string(), "🗺️ Found 2 result(s)".to_string());
        outputs.insert("supervisor".to_string(), String::new());
        emitter.complete("   ".to_string(), outputs);

        let events = drain(&mut rx);
        assert_eq!(events[0]["response"], "🗺️ Found 2 result(s)");
    }

    #[test]
    fn test_error_event_wire_shape() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut emitter = EventEmitter::streaming(tx);
        emitter.error("router loop exceeded bound");

        let events = drain(&mut rx);
        assert_eq!(events[0]["type"], "error");
        assert_eq!(events[0]["error"], "router loop exceeded bound");
        assert_eq!(
            events[0]["message"],
            "Error processing query: router loop exceeded bound"
        );
    }

    #[test]
    fn test_silent_emitter_still_tracks_terminal() {
        let mut emitter = EventEmitter::silent();
        assert!(!emitter.terminal_sent());
        emitter.complete("done".to_string(), BTreeMap::new());
        assert!(emitter.terminal_sent());
    }
}
