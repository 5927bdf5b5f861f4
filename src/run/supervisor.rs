//! 监管器：单次请求的主控循环
//!
//! 固定次序：分类 → 路由/执行循环 → 总结 → 终态。路由循环受
//! 能力总数上界保护，越界即视为不变量破坏并以 Terminal 收场。
//! 流式与非流式共用同一 run 路径，仅发射器不同。

use std::collections::BTreeMap;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{Capability, OrchestratorError, RunState};
use crate::run::classifier::IntentClassifier;
use crate::run::events::{EventEmitter, RunEvent, TaskStatus};
use crate::run::harness::ExecutionHarness;
use crate::run::router::{Decision, Router};
use crate::run::summarizer::Summarizer;

const RESEARCH_SKIP_NOTICE: &str = "ℹ️ Research: Not needed for this query. This capability handles general information and research questions.";

/// 一次运行的最终产物
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: String,
    pub outputs: BTreeMap<String, String>,
}

/// 监管器：组合分类器、路由器、执行壳与总结器
pub struct Supervisor {
    classifier: IntentClassifier,
    router: Router,
    harness: ExecutionHarness,
    summarizer: Summarizer,
}

impl Supervisor {
    pub fn new(
        classifier: IntentClassifier,
        router: Router,
        harness: ExecutionHarness,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            classifier,
            router,
            harness,
            summarizer,
        }
    }

    /// 非流式处理：复用流式路径，事件静默丢弃
    pub async fn process(&self, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let cancel = CancellationToken::new();
        let mut emitter = EventEmitter::silent();
        self.run(query, &mut emitter, &cancel).await
    }

    /// 流式处理：事件写入通道，Terminal 错误转为 error 事件
    pub async fn process_streamed(
        &self,
        query: &str,
        tx: UnboundedSender<RunEvent>,
        cancel: CancellationToken,
    ) {
        let mut emitter = EventEmitter::streaming(tx);
        if let Err(e) = self.run(query, &mut emitter, &cancel).await {
            tracing::error!(error = %e, "run failed");
            emitter.error(e.to_string());
        }
    }

    async fn run(
        &self,
        query: &str,
        emitter: &mut EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        emitter.task(TaskStatus::Started, "supervisor", "Initializing supervisor...");
        emitter.task(
            TaskStatus::Executing,
            "supervisor",
            "Analyzing user query and creating execution plan...",
        );

        let plan = self.classifier.classify(query).await;
        tracing::info!(
            locate = plan.locate,
            research = plan.research,
            schedule = plan.schedule,
            call = plan.call,
            "plan created"
        );

        for capability in Capability::ALL {
            if plan.needs(capability) {
                emitter.task(
                    TaskStatus::Planned,
                    capability.as_str(),
                    planned_message(capability),
                );
            }
        }
        emitter.task(
            TaskStatus::Completed,
            "supervisor",
            format!(
                "Execution plan created. {} task(s) scheduled.",
                plan.planned_count()
            ),
        );

        let mut state = RunState::new(query, plan);

        let mut steps = 0usize;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let capability = match self.router.next(&state) {
                Decision::Terminal => break,
                Decision::Invoke(capability) => capability,
            };
            // attempted 过滤保证至多每能力一次；越界说明路由不变量被破坏
            if steps == Capability::ALL.len() {
                return Err(OrchestratorError::Terminal(format!(
                    "routing loop exceeded {} steps",
                    Capability::ALL.len()
                )));
            }
            steps += 1;

            emitter.task(
                TaskStatus::Executing,
                capability.as_str(),
                format!("Executing {} capability...", capability.display()),
            );
            self.harness.run(capability, &mut state, cancel).await?;
            emitter.task(
                TaskStatus::Completed,
                capability.as_str(),
                format!("{} capability completed", capability.display()),
            );
            if let Some(rendering) = state.rendering(capability) {
                emitter.agent_output(capability.as_str(), rendering.to_string());
            }
        }

        // 跳过说明在所有能力事件之后发出，顺序与前端时间线一致
        if !state.plan.research {
            emitter.task(
                TaskStatus::Skipped,
                Capability::Research.as_str(),
                "Research: Not needed for this query",
            );
            emitter.agent_output(Capability::Research.as_str(), RESEARCH_SKIP_NOTICE);
        }

        emitter.task(
            TaskStatus::Executing,
            "supervisor",
            "Generating final summary from all agent results...",
        );
        let summary = self.summarizer.summarize(&state).await;
        state.summary = Some(summary.clone());

        let outputs = assemble_outputs(&state, &summary);
        emitter.complete(summary.clone(), outputs.clone());

        Ok(RunOutcome {
            response: summary,
            outputs,
        })
    }
}

/// 产出映射：每条执行记录一项，外加 supervisor 总结与未计划 research 的说明
fn assemble_outputs(state: &RunState, summary: &str) -> BTreeMap<String, String> {
    let mut outputs = BTreeMap::new();
    for record in state.records() {
        if let Some(rendering) = state.rendering(record.capability) {
            outputs.insert(record.capability.as_str().to_string(), rendering.to_string());
        }
    }
    if !state.plan.research && state.result(Capability::Research).is_none() {
        outputs.insert(
            Capability::Research.as_str().to_string(),
            RESEARCH_SKIP_NOTICE.to_string(),
        );
    }
    outputs.insert("supervisor".to_string(), summary.to_string());
    outputs
}

fn planned_message(capability: Capability) -> &'static str {
    match capability {
        Capability::Locate => "Task planned: Search for locations",
        Capability::Research => "Task planned: Perform research",
        Capability::Schedule => "Task planned: Manage calendar events",
        Capability::Call => "Task planned: Make phone call",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AdapterRegistry, CapabilityAdapter};
    use crate::config::ClassifierSection;
    use crate::core::CapabilityResult;
    use crate::llm::MockLlmClient;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct StubAdapter {
        capability: Capability,
        result: Result<CapabilityResult, OrchestratorError>,
    }

    impl StubAdapter {
        fn ok(capability: Capability, rendered: &str) -> Self {
            Self {
                capability,
                result: Ok(CapabilityResult::ok(
                    json!({"results": [{"name": "x"}]}),
                    rendered,
                )),
            }
        }

        fn err(capability: Capability, reason: &str) -> Self {
            Self {
                capability,
                result: Err(OrchestratorError::Http(reason.to_string())),
            }
        }
    }

    #[async_trait]
    impl CapabilityAdapter for StubAdapter {
        fn capability(&self) -> Capability {
            self.capability
        }

        async fn invoke(
            &self,
            _request: &str,
            _state: &RunState,
        ) -> Result<CapabilityResult, OrchestratorError> {
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(OrchestratorError::Http(reason)) => {
                    Err(OrchestratorError::Http(reason.clone()))
                }
                Err(_) => unreachable!(),
            }
        }
    }

    fn supervisor_with(llm: MockLlmClient, adapters: Vec<StubAdapter>) -> Supervisor {
        let llm: Arc<dyn crate::llm::LlmClient> = Arc::new(llm);
        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        let keywords = ClassifierSection::default();
        Supervisor::new(
            IntentClassifier::new(llm.clone(), keywords.clone()),
            Router::new(keywords.reservation_keywords),
            ExecutionHarness::new(registry, 5),
            Summarizer::new(llm),
        )
    }

    #[tokio::test]
    async fn test_locate_only_run_produces_outputs_and_summary() {
        // 规划与总结各消费一条脚本
        let llm = MockLlmClient::with_responses(vec![
            Ok(r#"{"locate": true, "research": false, "schedule": false, "call": false}"#
                .to_string()),
            Ok("Found one cafe for you.".to_string()),
        ]);
        let supervisor = supervisor_with(
            llm,
            vec![StubAdapter::ok(Capability::Locate, "🗺️ Found 1 result(s)")],
        );

        let outcome = supervisor.process("find a cafe nearby").await.unwrap();
        assert_eq!(outcome.response, "Found one cafe for you.");
        assert_eq!(
            outcome.outputs.get("locate").map(String::as_str),
            Some("🗺️ Found 1 result(s)")
        );
        assert_eq!(
            outcome.outputs.get("supervisor").map(String::as_str),
            Some("Found one cafe for you.")
        );
        // research 未计划时带跳过说明
        assert!(outcome.outputs.get("research").unwrap().starts_with("ℹ️"));
    }

    #[tokio::test]
    async fn test_failed_capability_isolated_run_completes() {
        let llm = MockLlmClient::with_responses(vec![
            Ok(r#"{"locate": true, "research": true, "schedule": false, "call": false}"#
                .to_string()),
            Err("summary model down".to_string()),
        ]);
        let supervisor = supervisor_with(
            llm,
            vec![
                StubAdapter::err(Capability::Locate, "maps api down"),
                StubAdapter::ok(Capability::Research, "🔍 Research Results"),
            ],
        );

        let outcome = supervisor
            .process("find a cafe and tell me about espresso")
            .await
            .unwrap();
        // locate 失败被隔离，research 照常执行，兜底总结收尾
        assert!(outcome.outputs.get("locate").unwrap().starts_with("❌"));
        assert_eq!(
            outcome.outputs.get("research").map(String::as_str),
            Some("🔍 Research Results")
        );
        assert!(outcome.response.starts_with("📋 Query:"));
        assert!(outcome.response.ends_with("✅ Processing complete."));
    }

    #[tokio::test]
    async fn test_streamed_run_event_sequence() {
        let llm = MockLlmClient::with_responses(vec![
            Ok(r#"{"locate": true, "research": false, "schedule": false, "call": false}"#
                .to_string()),
            Ok("Done.".to_string()),
        ]);
        let supervisor = supervisor_with(
            llm,
            vec![StubAdapter::ok(Capability::Locate, "🗺️ Found 1 result(s)")],
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        supervisor
            .process_streamed("find a cafe nearby", tx, CancellationToken::new())
            .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(serde_json::to_value(&event).unwrap());
        }

        let kinds: Vec<(String, String)> = events
            .iter()
            .map(|e| {
                (
                    e["type"].as_str().unwrap().to_string(),
                    e.get("status")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default()
                        .to_string(),
                )
            })
            .collect();

        assert_eq!(kinds[0], ("task".to_string(), "started".to_string()));
        // 恰好一条 complete 且在末尾
        let completes = events.iter().filter(|e| e["type"] == "complete").count();
        assert_eq!(completes, 1);
        assert_eq!(events.last().unwrap()["type"], "complete");
        assert_eq!(events.last().unwrap()["response"], "Done.");
        // planned 事件先于该能力的 executing 事件
        let planned_idx = kinds
            .iter()
            .position(|(t, s)| t == "task" && s == "planned")
            .unwrap();
        let executing_idx = events
            .iter()
            .position(|e| e["type"] == "task" && e["status"] == "executing" && e["capabilityName"] == "locate")
            .unwrap();
        assert!(planned_idx < executing_idx);
    }

    #[tokio::test]
    async fn test_empty_plan_run_reports_zero_capabilities() {
        // 规划失败走关键词兜底，问候语没有任何命中
        let llm = MockLlmClient::with_responses(vec![
            Err("planner down".to_string()),
            Err("summary down".to_string()),
        ]);
        let supervisor = supervisor_with(llm, vec![]);

        let outcome = supervisor.process("hello there").await.unwrap();
        assert!(outcome
            .response
            .contains("ℹ️ No capabilities were executed for this request."));
        // 只有 supervisor 与 research 跳过说明
        assert_eq!(outcome.outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits_to_summary() {
        let llm = MockLlmClient::with_responses(vec![
            Ok(r#"{"locate": true, "research": false, "schedule": false, "call": false}"#
                .to_string()),
            Ok("Stopped early.".to_string()),
        ]);
        let supervisor = supervisor_with(
            llm,
            vec![StubAdapter::ok(Capability::Locate, "🗺️ Found 1 result(s)")],
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        supervisor
            .process_streamed("find a cafe nearby", tx, cancel)
            .await;

        let mut saw_complete = false;
        let mut saw_locate_output = false;
        while let Ok(event) = rx.try_recv() {
            let value = serde_json::to_value(&event).unwrap();
            if value["type"] == "complete" {
                saw_complete = true;
            }
            if value["type"] == "agent_output" && value["capabilityName"] == "locate" {
                saw_locate_output = true;
            }
        }
        // 取消后不执行 locate，但流仍以 complete 收尾
        assert!(saw_complete);
        assert!(!saw_locate_output);
    }
}
