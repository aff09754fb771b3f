use crate::places::{LatLng, LocationProvider, Place, PlaceSearch, ServiceKind};
use std::fmt::Write as _;

/// Nearby-services screen state
pub struct ServicesScreen {
    location: Option<LatLng>,
    status: String,
    results: Vec<Place>,
    last_query: Option<ServiceKind>,
}

impl Default for ServicesScreen {
    fn default() -> Self {
        Self {
            location: None,
            status: "请选择服务".to_string(),
            results: Vec::new(),
            last_query: None,
        }
    }
}

impl ServicesScreen {
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn results(&self) -> &[Place] {
        &self.results
    }

    pub fn last_query(&self) -> Option<ServiceKind> {
        self.last_query
    }

    /// Ask the provider for a position; done once when the screen is first shown
    pub fn locate(&mut self, provider: &dyn LocationProvider) {
        match provider.current_position() {
            Ok(position) => self.location = Some(position),
            Err(e) => {
                tracing::warn!("Location unavailable: {}", e);
                self.status = "请允许定位权限以查找附近服务".to_string();
            }
        }
    }

    pub async fn search(&mut self, kind: ServiceKind, search: &dyn PlaceSearch) {
        let Some(location) = self.location else {
            self.status = "正在获取位置，请稍候...".to_string();
            return;
        };

        self.last_query = Some(kind);
        self.results.clear();
        self.status = format!("正在查找附近的{}...", kind.label());

        match search.search_nearby(kind, location).await {
            Ok(found) => {
                self.status = if found.is_empty() {
                    "未找到附近地点".to_string()
                } else {
                    "找到以下地点：".to_string()
                };
                self.results = found;
            }
            Err(e) => {
                tracing::error!("Nearby search failed: {}", e);
                self.status = "搜索失败，请稍后重试".to_string();
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[market] 菜市场    [hospital] 医院");
        let _ = writeln!(out, "{}", self.status);
        for (i, place) in self.results.iter().enumerate() {
            let _ = writeln!(out, "{}. {}  {}", i + 1, place.title, place.uri);
        }
        out
    }
}
