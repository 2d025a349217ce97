//! Per-request render context.
//!
//! The dispatcher owns one `Context` per request and hands it to the action
//! by `&mut`. Everything the original controller pattern keeps as instance
//! fields lives here explicitly: staged template data, the view selection,
//! layout and title overrides, the loaded models, and the prerendered-output
//! accumulator.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;
use crate::models::ModelSet;
use crate::template::ViewCache;

/// Which view the request will render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewSelection {
    /// Derive `<controller>/<action>` from the route.
    #[default]
    Auto,
    /// Render the named view instead.
    Named(String),
    /// Render nothing for this request.
    Skip,
}

/// Mutable per-request state, created by the dispatcher and discarded when
/// the request ends.
pub struct Context<'a> {
    pub(crate) data: IndexMap<String, Value>,
    pub(crate) view: ViewSelection,
    pub(crate) layout: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) prerendered: String,
    default_view: String,
    models: ModelSet,
    views: &'a ViewCache,
}

impl<'a> Context<'a> {
    pub fn new(views: &'a ViewCache, models: ModelSet, default_view: String) -> Self {
        Self {
            data: IndexMap::new(),
            view: ViewSelection::default(),
            layout: None,
            title: None,
            prerendered: String::new(),
            default_view,
            models,
            views,
        }
    }

    /// Stage a template variable.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Stage any serializable value as a template variable.
    pub fn set_serialized<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// The staged template variables.
    pub fn data(&self) -> &IndexMap<String, Value> {
        &self.data
    }

    /// The models autoloaded for this request, bound under short names.
    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Suppress rendering for this request (for actions that only redirect
    /// or emit raw output).
    pub fn pass(&mut self) {
        self.view = ViewSelection::Skip;
    }

    /// Render the named view instead of the conventional one.
    pub fn use_view(&mut self, name: impl Into<String>) {
        self.view = ViewSelection::Named(name.into());
    }

    /// Wrap the view in the named layout instead of the resolved one.
    pub fn use_layout(&mut self, name: impl Into<String>) {
        self.layout = Some(name.into());
    }

    /// Set the title handed to the layout.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn view(&self) -> &ViewSelection {
        &self.view
    }

    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The view the request will render: `None` after [`Context::pass`],
    /// otherwise the explicit name or the route convention.
    pub fn selected_view(&self) -> Option<&str> {
        match &self.view {
            ViewSelection::Skip => None,
            ViewSelection::Named(name) => Some(name),
            ViewSelection::Auto => Some(&self.default_view),
        }
    }

    /// Buffered render of the currently selected view with the staged data,
    /// appended to the prerendered accumulator. Actions may call this more
    /// than once to compose several views; outputs concatenate in call
    /// order and end up in the layout's yield slot ahead of the final view
    /// render.
    pub fn render(&mut self) -> Result<(), DispatchError> {
        let name = match &self.view {
            ViewSelection::Skip => return Err(DispatchError::NoViewSelected),
            ViewSelection::Named(name) => name.clone(),
            ViewSelection::Auto => self.default_view.clone(),
        };
        let html = self.views.render_view(&name, &self.data)?;
        self.prerendered.push_str(&html);
        Ok(())
    }

    /// Output accumulated by [`Context::render`] calls so far.
    pub fn prerendered(&self) -> &str {
        &self.prerendered
    }
}
