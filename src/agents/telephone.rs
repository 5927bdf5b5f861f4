//! 拨打电话 Adapter：经由外部 telephony bridge 服务发起呼叫。
//!
//! 号码优先从请求文本抽取，缺失时回退到 locate 首条结果的
//! phone_number；两处都没有时返回失败结果而非报错。bridge 不可达
//! 视为失败结果，保留手动拨打提示。

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::registry::CapabilityAdapter;
use crate::config::TelephonySection;
use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};

/// 宽松的国际号码匹配，最少四位数字，分组间允许单个分隔符
const PHONE_PATTERN: &str = r"\+?\d{1,4}[-.\s]?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    phone_number: &'a str,
    message: String,
}

/// bridge 返回的呼叫回执，字段全部可缺省
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallResponse {
    call_id: Option<String>,
    phone_number: Option<String>,
    status: Option<String>,
    message: Option<String>,
    timestamp: Option<String>,
    note: Option<String>,
}

/// call 能力适配器：telephony bridge 客户端
pub struct TelephoneAdapter {
    client: reqwest::Client,
    base_url: String,
    phone_re: Regex,
}

impl TelephoneAdapter {
    pub fn new(cfg: &TelephonySection) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            phone_re: Regex::new(PHONE_PATTERN)
                .map_err(|e| OrchestratorError::Config(e.to_string()))?,
        })
    }

    /// 从请求文本抽取第一个电话号码
    pub(crate) fn extract_phone_number(&self, request: &str) -> Option<String> {
        self.phone_re
            .find(request)
            .map(|m| m.as_str().trim().to_string())
    }

    async fn make_call(&self, phone: &str, request: &str) -> CapabilityResult {
        let url = format!("{}/api/call/make", self.base_url);
        let body = CallRequest {
            phone_number: phone,
            message: format!("Calling regarding: {}", request),
        };

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                return CapabilityResult::failed(
                    format!("Failed to connect to telephony bridge: {}", e),
                    service_unavailable(phone),
                );
            }
        };
        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                return CapabilityResult::failed(
                    e.to_string(),
                    format!("❌ Call Error: {}\n   Phone: {}", e, phone),
                );
            }
        };
        match response.json::<CallResponse>().await {
            Ok(call) => render_call(phone, call),
            Err(e) => CapabilityResult::failed(
                e.to_string(),
                format!("❌ Call Error: {}\n   Phone: {}", e, phone),
            ),
        }
    }
}

#[async_trait]
impl CapabilityAdapter for TelephoneAdapter {
    fn capability(&self) -> Capability {
        Capability::Call
    }

    async fn invoke(
        &self,
        request: &str,
        state: &RunState,
    ) -> Result<CapabilityResult, OrchestratorError> {
        let phone = self
            .extract_phone_number(request)
            .or_else(|| locate_phone(state));
        let Some(phone) = phone else {
            return Ok(CapabilityResult::failed(
                "No phone number found",
                "❌ Telephone Agent: No phone number found in query or search results",
            ));
        };
        Ok(self.make_call(&phone, request).await)
    }
}

/// locate 首条结果的 phone_number；N/A 与空串视为缺失
fn locate_phone(state: &RunState) -> Option<String> {
    let result = state.result(Capability::Locate)?;
    let phone = result
        .payload
        .get("results")?
        .as_array()?
        .first()?
        .get("phone_number")
        .and_then(Value::as_str)?;
    if phone.is_empty() || phone == "N/A" {
        None
    } else {
        Some(phone.to_string())
    }
}

fn service_unavailable(phone: &str) -> String {
    format!(
        "⚠️ Phone Call Service Unavailable\n   Phone Number: {}\n   Note: Telephony bridge is not running. Phone calls require the telephony bridge.\n   You can manually call: {}",
        phone, phone
    )
}

fn render_call(phone: &str, call: CallResponse) -> CapabilityResult {
    let status = call.status.unwrap_or_else(|| "initiated".to_string());
    let phone_number = call.phone_number.unwrap_or_else(|| phone.to_string());
    let message = call.message.unwrap_or_else(|| "Call initiated".to_string());
    let note = call
        .note
        .unwrap_or_else(|| "Call initiated successfully via telephony bridge.".to_string());

    let mut rendered = format!("☎️ Call Status: {}\n", status);
    rendered.push_str(&format!("   📞 Phone Number: {}\n", phone_number));
    if let Some(call_id) = &call.call_id {
        rendered.push_str(&format!("   🆔 Call ID: {}\n", call_id));
    }
    rendered.push_str(&format!("   💬 Message: {}\n", message));
    if let Some(timestamp) = &call.timestamp {
        rendered.push_str(&format!("   ⏰ Time: {}\n", timestamp));
    }
    rendered.push_str(&format!("   ℹ️ Note: {}\n", note));

    CapabilityResult::ok(
        json!({
            "call_id": call.call_id,
            "phone_number": phone_number,
            "status": status,
            "message": message,
            "timestamp": call.timestamp,
            "note": note,
        }),
        rendered,
    )
}
