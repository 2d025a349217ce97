//! Deployment-specific configuration.
//!
//! Everything environment-specific about rendering lives here rather than in
//! the dispatch logic: where views live on disk, which layout and page title
//! to fall back to, and which request header marks an AJAX request.

use std::path::PathBuf;

/// Settings the host application tunes per deployment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory containing view templates (e.g. `app/views`).
    pub views_root: PathBuf,
    /// Layout used when neither the action nor a controller-named layout
    /// file picks one.
    pub default_layout: String,
    /// Title handed to layouts when the action sets none.
    pub default_title: String,
    /// Request header inspected by [`crate::Request::is_ajax`].
    pub ajax_header: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            views_root: PathBuf::from("app/views"),
            default_layout: "application".to_string(),
            default_title: "Girder App".to_string(),
            ajax_header: "x-requested-with".to_string(),
        }
    }
}

impl AppConfig {
    /// Create a config rooted at the given views directory, with defaults
    /// for everything else.
    pub fn new(views_root: impl Into<PathBuf>) -> Self {
        Self {
            views_root: views_root.into(),
            ..Self::default()
        }
    }
}
