//! The slice of the incoming request girder needs: the resolved route plus
//! a header map. Routing itself belongs to the host framework; by the time a
//! `Request` reaches girder the controller and action names are settled.

use indexmap::IndexMap;

use crate::config::AppConfig;

/// A resolved route: which controller, which action, and any extra
/// positional URI segments handed to the action.
#[derive(Debug, Clone)]
pub struct Route {
    pub controller: String,
    pub action: String,
    pub segments: Vec<String>,
}

impl Route {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            segments: Vec::new(),
        }
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.segments = segments;
        self
    }

    /// Conventional view name for this route: `<controller>/<action>`.
    pub fn view_name(&self) -> String {
        format!("{}/{}", self.controller, self.action)
    }
}

/// An incoming request as seen by the dispatcher. Header names are stored
/// lowercased so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct Request {
    pub route: Route,
    headers: IndexMap<String, String>,
}

impl Request {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            headers: IndexMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// True when the request came through XMLHttpRequest, per the header
    /// configured in [`AppConfig::ajax_header`].
    pub fn is_ajax(&self, config: &AppConfig) -> bool {
        self.header(&config.ajax_header)
            .is_some_and(|v| v == "XMLHttpRequest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name_convention() {
        let route = Route::new("posts", "show");
        assert_eq!(route.view_name(), "posts/show");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::new(Route::new("posts", "index"))
            .with_header("X-Requested-With", "XMLHttpRequest");
        assert_eq!(req.header("x-requested-with"), Some("XMLHttpRequest"));
        assert_eq!(req.header("X-REQUESTED-WITH"), Some("XMLHttpRequest"));
    }

    #[test]
    fn test_is_ajax() {
        let config = AppConfig::default();

        let ajax = Request::new(Route::new("posts", "index"))
            .with_header("X-Requested-With", "XMLHttpRequest");
        assert!(ajax.is_ajax(&config));

        let plain = Request::new(Route::new("posts", "index"));
        assert!(!plain.is_ajax(&config));

        let wrong_value = Request::new(Route::new("posts", "index"))
            .with_header("X-Requested-With", "fetch");
        assert!(!wrong_value.is_ajax(&config));
    }

    #[test]
    fn test_is_ajax_honors_configured_header() {
        let config = AppConfig {
            ajax_header: "x-ajax".to_string(),
            ..AppConfig::default()
        };
        let req = Request::new(Route::new("posts", "index"))
            .with_header("X-Ajax", "XMLHttpRequest");
        assert!(req.is_ajax(&config));
    }
}
