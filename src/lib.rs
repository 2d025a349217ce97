//! Girder: convention-over-configuration controller and view rendering.
//!
//! Girder is the glue between a host web framework's dispatcher and its
//! templating and model subsystems. Given a resolved route it autoloads the
//! models a controller declares, invokes the action, then renders a view
//! wrapped in a layout, deriving file paths from directory and file-name
//! conventions whenever the action set no explicit override.
//!
//! # Conventions
//!
//! - Views live at `<views-root>/<controller>/<action>.html.erb` (with
//!   `.erb`, `.html.md` and `.md` fallbacks).
//! - Layouts live at `<views-root>/layouts/`; an explicit layout wins, else
//!   a layout named after the controller, else the application default.
//! - `<%= yield %>` in a layout marks where the rendered view body goes.
//!
//! ```no_run
//! use girder::{Context, Controller, DispatchError, Request};
//!
//! struct PostsController;
//!
//! impl Controller for PostsController {
//!     fn models(&self) -> &[&str] {
//!         &["post"]
//!     }
//!
//!     fn call(&mut self, ctx: &mut Context<'_>, req: &Request) -> Result<(), DispatchError> {
//!         match req.route.action.as_str() {
//!             "index" => {
//!                 ctx.set("heading", "All posts");
//!                 Ok(())
//!             }
//!             _ => Err(DispatchError::UnknownAction {
//!                 controller: req.route.controller.clone(),
//!                 action: req.route.action.clone(),
//!             }),
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod request;
pub mod template;

pub use config::AppConfig;
pub use context::{Context, ViewSelection};
pub use dispatch::{dispatch, Controller};
pub use error::{DispatchError, ResolveError, TemplateError};
pub use models::{BoxedModel, ModelLoader, ModelSet};
pub use request::{Request, Route};
pub use template::ViewCache;
