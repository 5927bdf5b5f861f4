//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CONCIERGE__*` 覆盖
//! （双下划线表示嵌套，如 `CONCIERGE__LLM__MODEL=gemini-2.5-pro`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub maps: MapsSection,
    #[serde(default)]
    pub telephony: TelephonySection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// [llm] 段：模型选择与请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / mock；未配置 API key 时自动回退 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// 可选 API key；缺省时回退读取环境变量 GEMINI_API_KEY / GOOGLE_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_llm_endpoint(),
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// [maps] 段：地点检索后端
#[derive(Debug, Clone, Deserialize)]
pub struct MapsSection {
    #[serde(default = "default_maps_base_url")]
    pub base_url: String,
    /// 可选 API key；缺省时回退读取环境变量 GOOGLE_MAPS_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_maps_timeout_secs")]
    pub timeout_secs: u64,
    /// 单次检索最多返回的结果条数
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for MapsSection {
    fn default() -> Self {
        Self {
            base_url: default_maps_base_url(),
            api_key: None,
            timeout_secs: default_maps_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

fn default_maps_base_url() -> String {
    "https://maps.googleapis.com/maps/api".to_string()
}

fn default_maps_timeout_secs() -> u64 {
    10
}

fn default_max_results() -> usize {
    5
}

/// [telephony] 段：外呼桥接服务
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonySection {
    #[serde(default = "default_telephony_base_url")]
    pub base_url: String,
    #[serde(default = "default_telephony_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelephonySection {
    fn default() -> Self {
        Self {
            base_url: default_telephony_base_url(),
            timeout_secs: default_telephony_timeout_secs(),
        }
    }
}

fn default_telephony_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_telephony_timeout_secs() -> u64 {
    30
}

/// [execution] 段：执行壳超时
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// 单次能力调用超时（秒）
    #[serde(default = "default_capability_timeout_secs")]
    pub capability_timeout_secs: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            capability_timeout_secs: default_capability_timeout_secs(),
        }
    }
}

fn default_capability_timeout_secs() -> u64 {
    60
}

/// [classifier] 段：关键词兜底分类与预订意图的词表
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    #[serde(default = "default_locate_keywords")]
    pub locate_keywords: Vec<String>,
    #[serde(default = "default_schedule_keywords")]
    pub schedule_keywords: Vec<String>,
    #[serde(default = "default_call_keywords")]
    pub call_keywords: Vec<String>,
    #[serde(default = "default_research_keywords")]
    pub research_keywords: Vec<String>,
    /// 命中任一词即视为预订意图，影响 schedule/call 的相对顺序
    #[serde(default = "default_reservation_keywords")]
    pub reservation_keywords: Vec<String>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            locate_keywords: default_locate_keywords(),
            schedule_keywords: default_schedule_keywords(),
            call_keywords: default_call_keywords(),
            research_keywords: default_research_keywords(),
            reservation_keywords: default_reservation_keywords(),
        }
    }
}

fn default_locate_keywords() -> Vec<String> {
    vec![
        "find".into(),
        "search".into(),
        "restaurant".into(),
        "near".into(),
        "location".into(),
        "place".into(),
        "business".into(),
        "cafe".into(),
        "hotel".into(),
        "shop".into(),
        "store".into(),
        "bar".into(),
        "bakery".into(),
        "nearby".into(),
        "around".into(),
    ]
}

fn default_schedule_keywords() -> Vec<String> {
    vec![
        "schedule".into(),
        "book".into(),
        "reservation".into(),
        "reserve".into(),
        "appointment".into(),
        "calendar".into(),
        "tomorrow".into(),
        "today".into(),
        "add".into(),
        "event".into(),
        "meeting".into(),
        "make".into(),
        "evening".into(),
        "dinner".into(),
        "lunch".into(),
    ]
}

fn default_call_keywords() -> Vec<String> {
    vec![
        "call".into(),
        "phone".into(),
        "telephone".into(),
        "contact".into(),
        "ring".into(),
        "dial".into(),
        // 预订类请求通常需要电话确认
        "make a reservation".into(),
        "make reservation".into(),
        "book a table".into(),
        "book table".into(),
        "reserve a table".into(),
        "reserve table".into(),
    ]
}

fn default_research_keywords() -> Vec<String> {
    vec![
        "what".into(),
        "how".into(),
        "why".into(),
        "explain".into(),
        "information".into(),
        "tell me about".into(),
        "research".into(),
        "about".into(),
        "describe".into(),
        "define".into(),
    ]
}

fn default_reservation_keywords() -> Vec<String> {
    vec![
        "reservation".into(),
        "reserve".into(),
        "book".into(),
        "booking".into(),
        "appointment".into(),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            llm: LlmSection::default(),
            maps: MapsSection::default(),
            telephony: TelephonySection::default(),
            execution: ExecutionSection::default(),
            classifier: ClassifierSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CONCIERGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CONCIERGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CONCIERGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
