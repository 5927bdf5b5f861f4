//! locate 能力：地点文本检索
//!
//! 走 Places Text Search 接口，逐条补查电话号码后投影为固定字段。
//! 检索词从请求文本推导：菜系词 + 业态词，都没有时取去掉虚词的前五个词。
//! API 非 OK 状态转为失败结果，不向上抛出。

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::CapabilityAdapter;
use crate::config::MapsSection;
use crate::core::{Capability, CapabilityResult, OrchestratorError, RunState};

const CUISINE_TYPES: [&str; 11] = [
    "indian",
    "italian",
    "chinese",
    "japanese",
    "thai",
    "korean",
    "mexican",
    "french",
    "american",
    "taiwanese",
    "vietnamese",
];

const BUSINESS_TYPES: [&str; 7] = [
    "restaurant",
    "cafe",
    "hotel",
    "store",
    "shop",
    "bar",
    "bakery",
];

const FILLER_WORDS: [&str; 9] = [
    "find", "near", "by", "nearby", "close", "to", "the", "a", "an",
];

/// 投影后的地点条目（payload 中 results 数组的元素）
#[derive(Debug, Clone, Serialize)]
pub struct Place {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

/// 地点检索适配器
pub struct MapsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_results: usize,
    location_patterns: Vec<Regex>,
}

impl MapsAdapter {
    pub fn new(cfg: &MapsSection) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        let mut location_patterns = Vec::new();
        for pattern in [
            r"(?i)near\s+([A-Za-z0-9\s]+)",
            r"(?i)in\s+([A-Za-z0-9\s]+)",
            r"(?i)at\s+([A-Za-z0-9\s]+)",
        ] {
            location_patterns
                .push(Regex::new(pattern).map_err(|e| OrchestratorError::Config(e.to_string()))?);
        }

        // 密钥优先取配置文件，其次环境变量
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key,
            max_results: cfg.max_results,
            location_patterns,
        })
    }

    /// 从请求中取位置短语（near/in/at 之后的字母数字串）
    pub(crate) fn extract_location(&self, request: &str) -> Option<String> {
        for pattern in &self.location_patterns {
            if let Some(captures) = pattern.captures(request) {
                let location = captures.get(1)?.as_str().trim();
                if !location.is_empty() {
                    return Some(location.to_string());
                }
            }
        }
        None
    }

    /// 推导检索词：菜系 + 业态，否则去虚词取前五个词，兜底 "restaurant"
    pub(crate) fn search_term(&self, request: &str, location: Option<&str>) -> String {
        let lower = request.to_lowercase();
        let mut parts: Vec<&str> = Vec::new();
        if let Some(cuisine) = CUISINE_TYPES.iter().find(|c| lower.contains(**c)) {
            parts.push(cuisine);
        }
        if let Some(business) = BUSINESS_TYPES.iter().find(|b| lower.contains(**b)) {
            parts.push(business);
        }

        let mut term = if !parts.is_empty() {
            parts.join(" ")
        } else {
            let words: Vec<&str> = request
                .split_whitespace()
                .filter(|w| !FILLER_WORDS.contains(&w.to_lowercase().as_str()))
                .take(5)
                .collect();
            if words.is_empty() {
                "restaurant".to_string()
            } else {
                words.join(" ")
            }
        };

        if let Some(location) = location {
            if !term.contains(location) {
                term = format!("{} near {}", term, location);
            }
        }
        term
    }

    async fn place_phone(&self, place_id: &str, api_key: &str) -> Option<String> {
        let url = format!("{}/place/details/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", "formatted_phone_number,opening_hours,website"),
                ("key", api_key),
            ])
            .send()
            .await
            .ok()?;
        let body: DetailsResponse = response.json().await.ok()?;
        if body.status != "OK" {
            return None;
        }
        body.result?.formatted_phone_number
    }
}

// Places API 响应结构（只取用到的字段）

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceSummary>,
}

#[derive(Debug, Deserialize)]
struct PlaceSummary {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    #[serde(default)]
    formatted_phone_number: Option<String>,
}

#[async_trait]
impl CapabilityAdapter for MapsAdapter {
    fn capability(&self) -> Capability {
        Capability::Locate
    }

    async fn invoke(
        &self,
        request: &str,
        _state: &RunState,
    ) -> Result<CapabilityResult, OrchestratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OrchestratorError::Capability {
                capability: Capability::Locate,
                reason: "GOOGLE_MAPS_API_KEY not set".to_string(),
            })?;

        let location = self.extract_location(request);
        let term = self.search_term(request, location.as_deref());

        let url = format!("{}/place/textsearch/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", term.as_str()), ("key", api_key)])
            .send()
            .await
            .map_err(|e| OrchestratorError::Http(e.to_string()))?;
        let body: TextSearchResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::JsonParse(e.to_string()))?;

        if body.status != "OK" {
            let mut detail = format!("API Error: {}", body.status);
            if let Some(message) = body.error_message.filter(|m| !m.is_empty()) {
                detail.push_str(&format!(" - {}", message));
            }
            return Ok(CapabilityResult::failed(
                detail.clone(),
                format!("❌ Error: {}", detail),
            ));
        }

        let mut places = Vec::new();
        for summary in body.results.into_iter().take(self.max_results) {
            let phone = match summary.place_id.as_deref() {
                Some(place_id) => self.place_phone(place_id, api_key).await,
                None => None,
            };
            places.push(Place {
                name: summary.name.unwrap_or_else(|| "Unknown".to_string()),
                address: summary
                    .formatted_address
                    .or(summary.vicinity)
                    .unwrap_or_else(|| "N/A".to_string()),
                rating: summary.rating,
                phone_number: phone,
                place_id: summary.place_id,
            });
        }

        let rendered = render_results(&term, &places);
        let payload = json!({
            "query": term,
            "location": location,
            "results": places,
            "count": places.len(),
        });
        Ok(CapabilityResult::ok(payload, rendered))
    }
}

fn render_results(query: &str, places: &[Place]) -> String {
    if places.is_empty() {
        return format!("🔍 No results found for '{}'", query);
    }

    let mut formatted = format!("🗺️ Found {} result(s) for '{}':\n\n", places.len(), query);
    for (i, place) in places.iter().enumerate() {
        formatted.push_str(&format!("{}. **{}**\n", i + 1, place.name));
        formatted.push_str(&format!("   📍 Address: {}\n", place.address));
        if let Some(rating) = place.rating {
            formatted.push_str(&format!("   ⭐ Rating: {}/5.0\n", rating));
        }
        if let Some(ref phone) = place.phone_number {
            formatted.push_str(&format!("   ☎️ Phone: {}\n", phone));
        }
        formatted.push('\n');
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MapsAdapter {
        MapsAdapter::new(&MapsSection::default()).unwrap()
    }

    #[test]
    fn test_extract_location_after_near() {
        let adapter = adapter();
        assert_eq!(
            adapter.extract_location("find indian restaurants near Taipei 101"),
            Some("Taipei 101".to_string())
        );
        assert_eq!(adapter.extract_location("find a cafe"), None);
    }

    #[test]
    fn test_search_term_combines_cuisine_and_business() {
        let adapter = adapter();
        let term = adapter.search_term("Find Indian restaurants near Taipei 101", Some("Taipei 101"));
        assert_eq!(term, "indian restaurant near Taipei 101");
    }

    #[test]
    fn test_search_term_strips_filler_words() {
        let adapter = adapter();
        // 无菜系/业态命中时取前五个非虚词
        let term = adapter.search_term("find the best sushi spot around town", None);
        assert_eq!(term, "best sushi spot around town");
    }

    #[test]
    fn test_search_term_defaults_to_restaurant() {
        let adapter = adapter();
        assert_eq!(adapter.search_term("find the a an to", None), "restaurant");
    }

    #[test]
    fn test_search_term_skips_duplicate_location() {
        let adapter = adapter();
        // 位置已在检索词中时不重复追加
        let term = adapter.search_term("sushi near Ximending station please", Some("sushi"));
        assert!(!term.contains("near sushi"));
    }

    #[test]
    fn test_render_results_with_optional_fields() {
        let places = vec![
            Place {
                name: "Blue Bottle".to_string(),
                address: "123 Main St".to_string(),
                rating: Some(4.5),
                phone_number: Some("02-1234-5678".to_string()),
                place_id: Some("abc".to_string()),
            },
            Place {
                name: "Corner Cafe".to_string(),
                address: "N/A".to_string(),
                rating: None,
                phone_number: None,
                place_id: None,
            },
        ];
        let rendered = render_results("cafe", &places);
        assert!(rendered.starts_with("🗺️ Found 2 result(s) for 'cafe':\n\n"));
        assert!(rendered.contains("1. **Blue Bottle**\n   📍 Address: 123 Main St\n   ⭐ Rating: 4.5/5.0\n   ☎️ Phone: 02-1234-5678\n"));
        assert!(rendered.contains("2. **Corner Cafe**\n   📍 Address: N/A\n"));
        assert!(!rendered.contains("Corner Cafe**\n   📍 Address: N/A\n   ⭐"));
    }

    #[test]
    fn test_render_results_empty() {
        assert_eq!(
            render_results("cafe", &[]),
            "🔍 No results found for 'cafe'"
        );
    }
}
