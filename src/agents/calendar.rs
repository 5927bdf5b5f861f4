//! 日程 Adapter：解析请求中的事件信息并维护内存日历。
//!
//! add 动作从请求抽取标题、日期与时间，并在 locate 结果可用时用首条
//! 地点补全位置与描述；list 动作按日期过滤已存事件。日历仅存于内存，
//! 进程重启即清空。

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Timelike, Weekday};
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::agents::registry::CapabilityAdapter;
use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};

/// 触发 add 动作的关键词；未命中一律视为 list
const ADD_WORDS: [&str; 6] = ["book", "add", "schedule", "reserve", "reservation", "make"];

/// 日期词识别顺序；未命中默认 tomorrow
const DATE_WORDS: [&str; 9] = [
    "tomorrow",
    "today",
    "friday",
    "saturday",
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
];

/// 描述生成使用的菜系词表
const EVENT_CUISINES: [&str; 8] = [
    "indian", "italian", "chinese", "japanese", "thai", "korean", "mexican", "french",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventAction {
    Add,
    List,
}

/// 从请求中抽取的事件要素
#[derive(Debug, Clone)]
pub(crate) struct EventInfo {
    pub action: EventAction,
    pub title: String,
    pub date_word: String,
    pub time: NaiveTime,
    pub description: String,
}

#[derive(Debug, Clone)]
struct CalendarEvent {
    id: usize,
    title: String,
    date: NaiveDate,
    time: NaiveTime,
    description: String,
    location: String,
}

/// locate 载荷中可用于补全事件的首条结果
struct LocateHit {
    name: String,
    address: Option<String>,
    phone: Option<String>,
}

/// schedule 能力适配器：内存日历
pub struct CalendarAdapter {
    events: Mutex<Vec<CalendarEvent>>,
    meridiem_re: Regex,
    clock_re: Regex,
    name_patterns: Vec<Regex>,
    name_cleanup_re: Regex,
}

impl CalendarAdapter {
    pub fn new() -> Result<Self, OrchestratorError> {
        Ok(Self {
            events: Mutex::new(Vec::new()),
            meridiem_re: compile(r"(?i)\b(\d{1,2}):?(\d{2})?\s*(am|pm)\b")?,
            clock_re: compile(r"\b(\d{1,2}):(\d{2})\b")?,
            name_patterns: vec![
                compile(r"(?i)(?:restaurant|place|location)\s+([A-Za-z0-9\s]+?)(?:\s+near|\s+at|$)")?,
                compile(r"(?i)([A-Za-z0-9\s]+?)\s+restaurant")?,
            ],
            name_cleanup_re: compile(r"(?i)\b(near|at|the|a|an)\b")?,
        })
    }

    /// 从请求文本抽取动作、标题、日期词、时间与描述
    pub(crate) fn extract_event_info(&self, request: &str) -> EventInfo {
        let lower = request.to_lowercase();

        let action = if ADD_WORDS.iter().any(|w| lower.contains(w)) {
            EventAction::Add
        } else {
            EventAction::List
        };
        let date_word = DATE_WORDS
            .iter()
            .find(|w| lower.contains(**w))
            .copied()
            .unwrap_or("tomorrow")
            .to_string();

        EventInfo {
            action,
            title: extract_title(&lower),
            date_word,
            time: self.extract_time(request),
            description: extract_description(&lower),
        }
    }

    /// 抽取显式时间。优先 AM/PM 写法，其次 24 小时制 HH:MM；
    /// 均未命中时默认 19:00。AM/PM 命中但小时越界时不再尝试 24 小时制。
    pub(crate) fn extract_time(&self, request: &str) -> NaiveTime {
        if let Some(caps) = self.meridiem_re.captures(request) {
            let hour: u32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            let minute: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            if (1..=12).contains(&hour) {
                let pm = caps
                    .get(3)
                    .map(|m| m.as_str().eq_ignore_ascii_case("pm"))
                    .unwrap_or(false);
                let hour = match (pm, hour) {
                    (true, 12) => 12,
                    (true, h) => h + 12,
                    (false, 12) => 0,
                    (false, h) => h,
                };
                if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
                    return time;
                }
            }
        } else if let Some(caps) = self.clock_re.captures(request) {
            let hour: u32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(99);
            let minute: u32 = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(99);
            if hour <= 23 && minute <= 59 {
                if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
                    return time;
                }
            }
        }
        NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default()
    }

    /// 从请求文本猜测餐厅名，清除常见虚词后返回
    pub(crate) fn extract_restaurant_name(&self, request: &str) -> Option<String> {
        for pattern in &self.name_patterns {
            let Some(m) = pattern.captures(request).and_then(|c| c.get(1)) else {
                continue;
            };
            let cleaned = self.name_cleanup_re.replace_all(m.as_str(), "");
            let name = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            if !name.is_empty() {
                return Some(name);
            }
        }
        None
    }

    async fn add_event(
        &self,
        request: &str,
        info: EventInfo,
        today: NaiveDate,
        state: &RunState,
    ) -> CapabilityResult {
        let Some(date) = resolve_date(&info.date_word, today) else {
            let reason = format!(
                "Invalid date format: {}. Use YYYY-MM-DD, 'today', or 'tomorrow'",
                info.date_word
            );
            return CapabilityResult::failed(
                reason.clone(),
                format!("❌ Calendar Agent Error: {}", reason),
            );
        };

        let hit = first_locate_result(state);
        let mut title = info.title;
        let mut description = info.description;
        let location = match &hit {
            Some(hit) => match &hit.address {
                Some(address) => format!("{}, {}", hit.name, address),
                None => hit.name.clone(),
            },
            None => self.extract_restaurant_name(request).unwrap_or_default(),
        };
        match &hit {
            Some(hit) => {
                title = if title.to_lowercase().contains("reservation") {
                    format!("{} at {}", title, hit.name)
                } else {
                    format!("{} - {}", title, hit.name)
                };
                let mut parts = Vec::new();
                if !description.is_empty() {
                    parts.push(description.clone());
                }
                parts.push(format!("Restaurant: {}", hit.name));
                if let Some(address) = &hit.address {
                    parts.push(format!("Address: {}", address));
                }
                if let Some(phone) = &hit.phone {
                    parts.push(format!("Phone: {}", phone));
                }
                description = parts.join("\n");
            }
            None => {
                if title == "Event" {
                    title = "Restaurant Reservation".to_string();
                }
            }
        }

        let mut events = self.events.lock().await;
        let event = CalendarEvent {
            id: events.len() + 1,
            title,
            date,
            time: info.time,
            description,
            location,
        };
        events.push(event.clone());
        drop(events);

        let message = format!(
            "✅ Event '{}' added to calendar for {} at {}",
            event.title,
            event.date.format("%B %d, %Y"),
            display_time(event.time)
        );
        CapabilityResult::ok(json!({ "action": "add", "event": event_json(&event) }), message)
    }

    async fn list_events(&self, date_word: &str, today: NaiveDate) -> CapabilityResult {
        let filter = resolve_date(date_word, today);
        let mut listed: Vec<CalendarEvent> = {
            let events = self.events.lock().await;
            events
                .iter()
                .filter(|e| filter.map_or(true, |d| e.date == d))
                .cloned()
                .collect()
        };
        listed.sort_by_key(|e| (e.date, e.time));

        let rendered = render_events(&listed);
        let items: Vec<Value> = listed.iter().map(event_json).collect();
        CapabilityResult::ok(
            json!({ "action": "list", "events": items, "count": listed.len() }),
            rendered,
        )
    }
}

#[async_trait]
impl CapabilityAdapter for CalendarAdapter {
    fn capability(&self) -> Capability {
        Capability::Schedule
    }

    async fn invoke(
        &self,
        request: &str,
        state: &RunState,
    ) -> Result<CapabilityResult, OrchestratorError> {
        let info = self.extract_event_info(request);
        let today = Local::now().date_naive();
        let result = match info.action {
            EventAction::Add => self.add_event(request, info, today, state).await,
            EventAction::List => self.list_events(&info.date_word, today).await,
        };
        Ok(result)
    }
}

fn compile(pattern: &str) -> Result<Regex, OrchestratorError> {
    Regex::new(pattern).map_err(|e| OrchestratorError::Config(e.to_string()))
}

/// 把日期词解析为具体日期；星期词取不早于今天的最近一次
pub(crate) fn resolve_date(word: &str, today: NaiveDate) -> Option<NaiveDate> {
    match word.to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        "yesterday" => today.pred_opt(),
        "monday" => Some(next_weekday(today, Weekday::Mon)),
        "tuesday" => Some(next_weekday(today, Weekday::Tue)),
        "wednesday" => Some(next_weekday(today, Weekday::Wed)),
        "thursday" => Some(next_weekday(today, Weekday::Thu)),
        "friday" => Some(next_weekday(today, Weekday::Fri)),
        "saturday" => Some(next_weekday(today, Weekday::Sat)),
        "sunday" => Some(next_weekday(today, Weekday::Sun)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    today + Duration::days(ahead)
}

fn extract_title(lower: &str) -> String {
    let title = if lower.contains("reservation") {
        if lower.contains("dinner") {
            "Dinner Reservation"
        } else if lower.contains("lunch") {
            "Lunch Reservation"
        } else if lower.contains("breakfast") {
            "Breakfast Reservation"
        } else {
            "Restaurant Reservation"
        }
    } else if lower.contains("dinner") {
        "Dinner"
    } else if lower.contains("lunch") {
        "Lunch"
    } else if lower.contains("breakfast") {
        "Breakfast"
    } else if lower.contains("meeting") {
        "Meeting"
    } else if lower.contains("appointment") {
        "Appointment"
    } else {
        "Event"
    };
    title.to_string()
}

fn extract_description(lower: &str) -> String {
    if lower.contains("restaurant") {
        if let Some(cuisine) = EVENT_CUISINES.iter().find(|c| lower.contains(**c)) {
            let mut chars = cuisine.chars();
            if let Some(first) = chars.next() {
                return format!("{}{} restaurant reservation", first.to_uppercase(), chars.as_str());
            }
        }
    }
    String::new()
}

/// 读取 locate 载荷的首条结果；N/A 与空串视为缺失
fn first_locate_result(state: &RunState) -> Option<LocateHit> {
    let result = state.result(Capability::Locate)?;
    let first = result.payload.get("results")?.as_array()?.first()?;
    let name = first
        .get("name")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())?
        .to_string();
    let address = first
        .get("address")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty() && *v != "N/A")
        .map(str::to_string);
    let phone = first
        .get("phone_number")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty() && *v != "N/A")
        .map(str::to_string);
    Some(LocateHit { name, address, phone })
}

/// 24 小时制转 12 小时制显示
fn display_time(time: NaiveTime) -> String {
    let (hour, minute) = (time.hour(), time.minute());
    if hour == 0 {
        format!("12:{:02} AM", minute)
    } else if hour < 12 {
        format!("{}:{:02} AM", hour, minute)
    } else if hour == 12 {
        format!("12:{:02} PM", minute)
    } else {
        format!("{}:{:02} PM", hour - 12, minute)
    }
}

fn event_json(event: &CalendarEvent) -> Value {
    json!({
        "id": event.id,
        "title": event.title,
        "date": event.date.format("%Y-%m-%d").to_string(),
        "time": event.time.format("%H:%M").to_string(),
        "description": event.description,
        "location": event.location,
    })
}

fn render_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "📅 No events found in calendar.".to_string();
    }
    let mut out = format!("📅 Calendar Events ({}):\n\n", events.len());
    for event in events {
        out.push_str(&format!("• **{}**\n", event.title));
        out.push_str(&format!(
            "  📅 {} at {}\n",
            event.date.format("%B %d, %Y"),
            display_time(event.time)
        ));
        if !event.location.is_empty() {
            out.push_str(&format!("  📍 Location: {}\n", event.location));
        }
        if !event.description.is_empty() {
            out.push_str(&format!("  📝 {}\n", event.description));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::Plan;

    fn adapter() -> CalendarAdapter {
        CalendarAdapter::new().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_resolve_date_words() {
        // 2025-06-04 is a Wednesday
        let today = date(2025, 6, 4);
        assert_eq!(resolve_date("today", today), Some(today));
        assert_eq!(resolve_date("tomorrow", today), Some(date(2025, 6, 5)));
        assert_eq!(resolve_date("friday", today), Some(date(2025, 6, 6)));
        assert_eq!(resolve_date("wednesday", today), Some(today));
        assert_eq!(resolve_date("tuesday", today), Some(date(2025, 6, 10)));
        assert_eq!(resolve_date("2025-12-31", today), Some(date(2025, 12, 31)));
        assert_eq!(resolve_date("next week", today), None);
    }

    #[test]
    fn test_extract_time_meridiem() {
        let a = adapter();
        assert_eq!(a.extract_time("book at 7 PM"), time(19, 0));
        assert_eq!(a.extract_time("book at 7:30 pm"), time(19, 30));
        assert_eq!(a.extract_time("at 12 PM sharp"), time(12, 0));
        assert_eq!(a.extract_time("at 12 AM"), time(0, 0));
        assert_eq!(a.extract_time("at 9 am"), time(9, 0));
    }

    #[test]
    fn test_extract_time_24_hour() {
        let a = adapter();
        assert_eq!(a.extract_time("dinner at 19:30"), time(19, 30));
        assert_eq!(a.extract_time("meet at 9:30"), time(9, 30));
    }

    #[test]
    fn test_extract_time_defaults_to_seven_pm() {
        let a = adapter();
        assert_eq!(a.extract_time("dinner near Taipei 101"), time(19, 0));
        assert_eq!(a.extract_time("book at 13 PM"), time(19, 0));
        assert_eq!(a.extract_time("at 25:00"), time(19, 0));
    }

    #[test]
    fn test_extract_event_info_reservation() {
        let a = adapter();
        let info = a.extract_event_info(
            "Book a dinner reservation at an italian restaurant tomorrow at 7 PM",
        );
        assert_eq!(info.action, EventAction::Add);
        assert_eq!(info.title, "Dinner Reservation");
        assert_eq!(info.date_word, "tomorrow");
        assert_eq!(info.time, time(19, 0));
        assert_eq!(info.description, "Italian restaurant reservation");
    }

    #[test]
    fn test_extract_event_info_list() {
        let a = adapter();
        let info = a.extract_event_info("what is on my calendar today");
        assert_eq!(info.action, EventAction::List);
        assert_eq!(info.date_word, "today");
        assert_eq!(info.title, "Event");
    }

    #[test]
    fn test_extract_restaurant_name() {
        let a = adapter();
        assert_eq!(
            a.extract_restaurant_name("book a table at Din Tai Fung restaurant")
                .as_deref(),
            Some("book table Din Tai Fung")
        );
        assert_eq!(a.extract_restaurant_name("schedule a meeting"), None);
    }

    #[tokio::test]
    async fn test_add_event_enriches_from_locate() {
        let a = adapter();
        let mut state = RunState::new("Book a dinner reservation tomorrow at 7 PM", Plan::default());
        state.push_attempt(
            Capability::Locate,
            CapabilityResult::ok(
                json!({"results": [{
                    "name": "Din Tai Fung",
                    "address": "No. 194 Xinyi Rd",
                    "phone_number": "+886 2 2321 8928"
                }]}),
                "found",
            ),
        );

        let result = a
            .invoke("Book a dinner reservation tomorrow at 7 PM", &state)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result
            .rendered
            .starts_with("✅ Event 'Dinner Reservation at Din Tai Fung' added to calendar for"));
        assert!(result.rendered.ends_with("at 7:00 PM"));

        let event = &result.payload["event"];
        assert_eq!(event["location"], "Din Tai Fung, No. 194 Xinyi Rd");
        assert_eq!(
            event["description"],
            "Restaurant: Din Tai Fung\nAddress: No. 194 Xinyi Rd\nPhone: +886 2 2321 8928"
        );
        assert_eq!(event["time"], "19:00");
    }

    #[tokio::test]
    async fn test_add_without_locate_keeps_query_title() {
        let a = adapter();
        let state = RunState::new("q", Plan::default());
        let result = a
            .invoke("Schedule a meeting tomorrow at 15:00", &state)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.rendered.contains("'Meeting'"));
        assert!(result.rendered.ends_with("at 3:00 PM"));
        assert_eq!(result.payload["event"]["location"], "");
    }

    #[tokio::test]
    async fn test_list_returns_added_events() {
        let a = adapter();
        let state = RunState::new("q", Plan::default());
        a.invoke("Book dinner tomorrow at 7 PM", &state).await.unwrap();

        let result = a.invoke("show my calendar tomorrow", &state).await.unwrap();
        assert!(result.success);
        assert_eq!(result.payload["count"], 1);
        assert!(result.rendered.starts_with("📅 Calendar Events (1):"));
        assert!(result.rendered.contains("• **Dinner**"));
    }

    #[tokio::test]
    async fn test_list_empty_calendar() {
        let a = adapter();
        let state = RunState::new("q", Plan::default());
        let result = a.invoke("list my events today", &state).await.unwrap();
        assert!(result.success);
        assert_eq!(result.payload["count"], 0);
        assert_eq!(result.rendered, "📅 No events found in calendar.");
    }
}
