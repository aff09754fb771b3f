use crate::error::AssistantError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where the user is, or why we cannot tell
pub trait LocationProvider {
    fn current_position(&self) -> Result<LatLng, AssistantError>;
}

/// Position fixed in the config file. Missing coordinates count as a
/// refused location permission.
pub struct ConfiguredLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl ConfiguredLocation {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl LocationProvider for ConfiguredLocation {
    fn current_position(&self) -> Result<LatLng, AssistantError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(LatLng {
                latitude,
                longitude,
            }),
            _ => Err(AssistantError::Permission(
                "no location configured".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Market,
    Hospital,
}

impl ServiceKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "market" | "菜市场" => Some(ServiceKind::Market),
            "hospital" | "医院" => Some(ServiceKind::Hospital),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Market => "菜市场",
            ServiceKind::Hospital => "医院",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            ServiceKind::Market => "Find 5 popular vegetable markets or supermarkets near me.",
            ServiceKind::Hospital => "Find 5 general hospitals or community clinics near me.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub title: String,
    pub uri: String,
}

#[async_trait]
pub trait PlaceSearch {
    async fn search_nearby(
        &self,
        kind: ServiceKind,
        location: LatLng,
    ) -> Result<Vec<Place>, AssistantError>;
}

/// Map-grounded `generateContent` over plain HTTPS
pub struct GroundedSearch {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GroundedSearch {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(&config.api_base, &config.api_key, &config.search_model)
    }
}

#[async_trait]
impl PlaceSearch for GroundedSearch {
    async fn search_nearby(
        &self,
        kind: ServiceKind,
        location: LatLng,
    ) -> Result<Vec<Place>, AssistantError> {
        tracing::info!("Searching nearby {:?}", kind);

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest::grounded(kind.prompt(), location))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AssistantError::Network(e.without_url().to_string()))?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Network(format!("Unexpected search response: {}", e)))?;

        let places = body.places();
        tracing::info!("Search returned {} places", places.len());
        Ok(places)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_maps: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    retrieval_config: RetrievalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfig {
    lat_lng: LatLngBody,
}

#[derive(Debug, Serialize)]
struct LatLngBody {
    latitude: f64,
    longitude: f64,
}

impl GenerateRequest {
    fn grounded(prompt: &str, location: LatLng) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            tools: vec![Tool {
                google_maps: serde_json::Map::new(),
            }],
            tool_config: ToolConfig {
                retrieval_config: RetrievalConfig {
                    lat_lng: LatLngBody {
                        latitude: location.latitude,
                        longitude: location.longitude,
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize, Default)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<GroundingSource>,
    #[serde(default)]
    maps: Option<GroundingSource>,
}

#[derive(Debug, Deserialize, Default)]
struct GroundingSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GenerateResponse {
    /// Grounding sources of the first candidate that have both a title and a link
    fn places(self) -> Vec<Place> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.grounding_metadata)
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web.or(chunk.maps))
            .filter_map(|source| match (source.title, source.uri) {
                (Some(title), Some(uri)) if !title.is_empty() && !uri.is_empty() => {
                    Some(Place { title, uri })
                }
                _ => None,
            })
            .collect()
    }
}
