//! ERB-style view templates with convention-based resolution.
//!
//! Supports:
//! - `<%= expr %>` - HTML-escaped output
//! - `<%- expr %>` - Raw/unescaped output
//! - `<% if/for/end %>` - Control flow
//! - `<%= yield %>` - Layout content insertion point
//! - Markdown views (`.md`), converted to HTML after template evaluation

pub mod layout;
pub mod parser;
pub mod renderer;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{DispatchError, ResolveError, TemplateError};
use parser::{parse_template, TemplateNode};

/// A cached template with its parsed AST and modification time.
struct CachedTemplate {
    nodes: Rc<Vec<TemplateNode>>,
    modified: SystemTime,
}

/// Maximum size for path cache to prevent unbounded memory growth.
const PATH_CACHE_MAX_SIZE: usize = 1000;

/// Maximum size for template cache to prevent unbounded memory growth.
const TEMPLATE_CACHE_MAX_SIZE: usize = 500;

/// Template store rooted at a views directory, with parsed-template and
/// path-resolution caches.
pub struct ViewCache {
    /// Base directory for views (e.g., app/views)
    views_root: PathBuf,
    /// Cached parsed templates (path -> nodes)
    cache: RefCell<HashMap<String, CachedTemplate>>,
    /// Cached path resolutions (template name -> resolved path)
    path_cache: RefCell<HashMap<String, PathBuf>>,
}

impl ViewCache {
    /// Create a new view cache for the given views directory.
    pub fn new(views_root: impl Into<PathBuf>) -> Self {
        Self {
            views_root: views_root.into(),
            cache: RefCell::new(HashMap::new()),
            path_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Get the views directory path.
    pub fn views_root(&self) -> &Path {
        &self.views_root
    }

    /// Resolve a logical template name (e.g. "posts/index") to a file on
    /// disk, trying the known extensions in order. Successful lookups are
    /// cached.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ResolveError> {
        {
            let path_cache = self.path_cache.borrow();
            if let Some(path) = path_cache.get(name) {
                return Ok(path.clone());
            }
        }

        let resolved = self.do_resolve(name)?;

        {
            let mut path_cache = self.path_cache.borrow_mut();
            if path_cache.len() >= PATH_CACHE_MAX_SIZE {
                path_cache.clear();
            }
            path_cache.insert(name.to_string(), resolved.clone());
        }

        Ok(resolved)
    }

    /// Actually resolve the template path (file system lookup).
    fn do_resolve(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let candidates = [
            format!("{name}.html.erb"),
            format!("{name}.erb"),
            format!("{name}.html.md"),
            format!("{name}.md"),
            name.to_string(),
        ];

        for candidate in candidates {
            let path = self.views_root.join(candidate);
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(ResolveError {
            name: name.to_string(),
            views_root: self.views_root.clone(),
        })
    }

    /// Single-shot layout resolution: an explicit name wins; otherwise a
    /// layout named after the controller if one exists, else the default.
    pub fn resolve_layout(
        &self,
        explicit: Option<&str>,
        controller: &str,
        default_layout: &str,
    ) -> Result<PathBuf, ResolveError> {
        if let Some(name) = explicit {
            // Strip "layouts/" prefix if present to avoid double prefixing
            let name = name.trim_start_matches("layouts/");
            return self.resolve(&format!("layouts/{name}"));
        }

        if let Ok(path) = self.resolve(&format!("layouts/{controller}")) {
            return Ok(path);
        }

        self.resolve(&format!("layouts/{default_layout}"))
    }

    /// Buffered render of a view with the given data: the output is
    /// returned as a string, never written to a response stream.
    pub fn render_view(
        &self,
        name: &str,
        data: &IndexMap<String, Value>,
    ) -> Result<String, DispatchError> {
        let path = self.resolve(name)?;
        let nodes = self.get_or_load(&path).map_err(|e| wrap(&path, e))?;
        let content = renderer::render_nodes(&nodes, data).map_err(|e| wrap(&path, e))?;

        // Markdown views are evaluated as templates first, then converted
        if is_markdown_template(&path) {
            Ok(markdown_to_html(&content))
        } else {
            Ok(content)
        }
    }

    /// Render an already-resolved layout file around the yield slot.
    pub fn render_layout(
        &self,
        path: &Path,
        yield_slot: &str,
        data: &IndexMap<String, Value>,
    ) -> Result<String, DispatchError> {
        let nodes = self.get_or_load(path).map_err(|e| wrap(path, e))?;
        layout::render_layout_nodes(&nodes, yield_slot, data).map_err(|e| wrap(path, e))
    }

    /// Get a template from cache or load and parse it.
    fn get_or_load(&self, path: &Path) -> Result<Rc<Vec<TemplateNode>>, TemplateError> {
        let path_str = path.to_string_lossy().to_string();

        {
            let cache = self.cache.borrow();
            if let Some(cached) = cache.get(&path_str) {
                return Ok(cached.nodes.clone()); // Rc clone is O(1)
            }
        }

        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let nodes = Rc::new(parse_template(&source)?);

        {
            let mut cache = self.cache.borrow_mut();
            if cache.len() >= TEMPLATE_CACHE_MAX_SIZE {
                cache.clear();
            }
            cache.insert(
                path_str,
                CachedTemplate {
                    nodes: nodes.clone(),
                    modified,
                },
            );
        }

        Ok(nodes)
    }

    /// Clear the template and path caches (useful for hot reload).
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
        self.path_cache.borrow_mut().clear();
    }

    /// Check if any cached template has changed on disk.
    pub fn has_changes(&self) -> bool {
        let cache = self.cache.borrow();
        for (path_str, cached) in cache.iter() {
            let path = Path::new(path_str);
            if let Ok(metadata) = fs::metadata(path) {
                if let Ok(modified) = metadata.modified() {
                    if modified != cached.modified {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn wrap(path: &Path, source: TemplateError) -> DispatchError {
    DispatchError::Template {
        path: path.display().to_string(),
        source,
    }
}

/// Check if a template path is a markdown file.
fn is_markdown_template(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".md")
}

/// Convert markdown text to HTML using pulldown-cmark.
fn markdown_to_html(markdown: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}
