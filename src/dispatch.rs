//! Action dispatch and the post-action view-loading hook.
//!
//! The host framework resolves a route, constructs the controller, and hands
//! both to [`dispatch`]. Girder autoloads the controller's declared models,
//! invokes the action, then unconditionally runs view loading, so no action
//! has to remember to render. View loading proceeds once per request:
//!
//! 1. skip sentinel set -> no rendering
//! 2. view path: explicit name, else `<controller>/<action>`
//! 3. buffered view render with the staged data
//! 4. yield slot = prerendered output + view output; title slot set
//! 5. layout: explicit > controller-named file > default
//! 6. layout render output is the response body

use serde_json::Value;

use crate::config::AppConfig;
use crate::context::Context;
use crate::error::DispatchError;
use crate::models::{ModelLoader, ModelSet};
use crate::request::Request;
use crate::template::ViewCache;

/// A controller: declares its models and dispatches its own actions.
pub trait Controller {
    /// Short names of the models to autoload before the action runs, in
    /// load order.
    fn models(&self) -> &[&str] {
        &[]
    }

    /// Invoke the action named by `req.route.action`, with
    /// `req.route.segments` as its positional arguments. Implementations
    /// match on the action name and return [`DispatchError::UnknownAction`]
    /// for names they do not define.
    fn call(&mut self, ctx: &mut Context<'_>, req: &Request) -> Result<(), DispatchError>;
}

/// Run one request through a controller: autoload models, invoke the
/// action, then load the view. Returns the response body, or `None` when
/// the action suppressed rendering.
pub fn dispatch(
    controller: &mut dyn Controller,
    req: &Request,
    loader: &dyn ModelLoader,
    views: &ViewCache,
    config: &AppConfig,
) -> Result<Option<String>, DispatchError> {
    let models = ModelSet::autoload(loader, controller.models())?;
    let mut ctx = Context::new(views, models, req.route.view_name());
    controller.call(&mut ctx, req)?;
    load_view(&ctx, req, views, config)
}

/// The post-action hook: resolves and renders the view and layout for a
/// finished action.
fn load_view(
    ctx: &Context<'_>,
    req: &Request,
    views: &ViewCache,
    config: &AppConfig,
) -> Result<Option<String>, DispatchError> {
    let Some(view_name) = ctx.selected_view() else {
        return Ok(None);
    };

    let mut yield_slot = ctx.prerendered().to_string();
    yield_slot.push_str(&views.render_view(view_name, ctx.data())?);

    let title = ctx.title().unwrap_or(&config.default_title);
    let layout_path =
        views.resolve_layout(ctx.layout(), &req.route.controller, &config.default_layout)?;

    // The layout sees the action's data plus the title slot; the yield
    // slot is spliced at `<%= yield %>`.
    let mut layout_data = ctx.data().clone();
    layout_data.insert("title".to_string(), Value::String(title.to_string()));

    let body = views.render_layout(&layout_path, &yield_slot, &layout_data)?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::BoxedModel;
    use crate::request::Route;

    struct ArticleModel {
        rows: Vec<&'static str>,
    }

    struct TestLoader {
        requested: RefCell<Vec<String>>,
    }

    impl TestLoader {
        fn new() -> Self {
            Self {
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelLoader for TestLoader {
        fn load(&self, model_name: &str) -> Result<BoxedModel, String> {
            self.requested.borrow_mut().push(model_name.to_string());
            match model_name {
                "article_model" => Ok(Box::new(ArticleModel {
                    rows: vec!["intro", "outro"],
                })),
                other => Err(format!("no such model: {other}")),
            }
        }
    }

    #[derive(Default)]
    struct ArticlesController;

    impl Controller for ArticlesController {
        fn models(&self) -> &[&str] {
            &["article"]
        }

        fn call(&mut self, ctx: &mut Context<'_>, req: &Request) -> Result<(), DispatchError> {
            match req.route.action.as_str() {
                "index" => {
                    // The declared model is bound before the action runs
                    let articles = ctx
                        .models()
                        .get::<ArticleModel>("article")
                        .map(|m| m.rows.clone())
                        .unwrap_or_default();
                    ctx.set("count", articles.len());
                    Ok(())
                }
                "show" => {
                    let id = req.route.segments.first().cloned().unwrap_or_default();
                    ctx.set("id", id);
                    Ok(())
                }
                "feed" => {
                    ctx.pass();
                    Ok(())
                }
                "archive" => {
                    ctx.use_view("articles/special");
                    Ok(())
                }
                "print" => {
                    ctx.use_layout("print");
                    Ok(())
                }
                "titled" => {
                    ctx.set_title("Archive 2026");
                    Ok(())
                }
                "composite" => {
                    ctx.use_view("parts/one");
                    ctx.render()?;
                    ctx.use_view("parts/two");
                    ctx.render()?;
                    ctx.use_view("articles/summary");
                    Ok(())
                }
                _ => Err(DispatchError::UnknownAction {
                    controller: req.route.controller.clone(),
                    action: req.route.action.clone(),
                }),
            }
        }
    }

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, ViewCache, AppConfig) {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let views = ViewCache::new(dir.path());
        let config = AppConfig::new(dir.path());
        (dir, views, config)
    }

    fn run(
        action: &str,
        segments: Vec<String>,
        files: &[(&str, &str)],
    ) -> Result<Option<String>, DispatchError> {
        let (_dir, views, config) = setup(files);
        let mut controller = ArticlesController;
        let req = Request::new(Route::new("articles", action).with_segments(segments));
        dispatch(&mut controller, &req, &TestLoader::new(), &views, &config)
    }

    #[test]
    fn test_conventional_view_and_default_layout() {
        let body = run(
            "index",
            vec![],
            &[
                ("articles/index.html.erb", "<%= count %> articles"),
                ("layouts/application.html.erb", "[<%= yield %>]"),
            ],
        )
        .unwrap();
        // One view render wrapped in one layout render
        assert_eq!(body.as_deref(), Some("[2 articles]"));
    }

    #[test]
    fn test_segments_reach_the_action() {
        let body = run(
            "show",
            vec!["42".to_string()],
            &[
                ("articles/show.html.erb", "article <%= id %>"),
                ("layouts/application.html.erb", "<%= yield %>"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("article 42"));
    }

    #[test]
    fn test_pass_renders_nothing() {
        // No view or layout files exist at all: a skipped request must not
        // touch the filesystem
        let body = run("feed", vec![], &[]).unwrap();
        assert_eq!(body, None);
    }

    #[test]
    fn test_explicit_view_is_used_verbatim() {
        let body = run(
            "archive",
            vec![],
            &[
                ("articles/special.html.erb", "SPECIAL"),
                ("articles/archive.html.erb", "CONVENTIONAL"),
                ("layouts/application.html.erb", "<%= yield %>"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("SPECIAL"));
    }

    #[test]
    fn test_layout_precedence_explicit_wins() {
        let body = run(
            "print",
            vec![],
            &[
                ("articles/print.html.erb", "X"),
                ("layouts/print.html.erb", "print(<%= yield %>)"),
                ("layouts/articles.html.erb", "controller(<%= yield %>)"),
                ("layouts/application.html.erb", "default(<%= yield %>)"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("print(X)"));
    }

    #[test]
    fn test_layout_precedence_controller_named() {
        let body = run(
            "index",
            vec![],
            &[
                ("articles/index.html.erb", "X"),
                ("layouts/articles.html.erb", "controller(<%= yield %>)"),
                ("layouts/application.html.erb", "default(<%= yield %>)"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("controller(X)"));
    }

    #[test]
    fn test_layout_precedence_default_fallback() {
        let body = run(
            "index",
            vec![],
            &[
                ("articles/index.html.erb", "X"),
                ("layouts/application.html.erb", "default(<%= yield %>)"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("default(X)"));
    }

    #[test]
    fn test_title_defaults_and_overrides() {
        let files: &[(&str, &str)] = &[
            ("articles/index.html.erb", "X"),
            ("articles/titled.html.erb", "X"),
            (
                "layouts/application.html.erb",
                "<title><%= title %></title><%= yield %>",
            ),
        ];

        let body = run("index", vec![], files).unwrap();
        assert_eq!(body.as_deref(), Some("<title>Girder App</title>X"));

        let body = run("titled", vec![], files).unwrap();
        assert_eq!(body.as_deref(), Some("<title>Archive 2026</title>X"));
    }

    #[test]
    fn test_composite_render_concatenates_into_yield() {
        let body = run(
            "composite",
            vec![],
            &[
                ("parts/one.html.erb", "ONE"),
                ("parts/two.html.erb", "TWO"),
                ("articles/summary.html.erb", "SUM"),
                ("layouts/application.html.erb", "[<%= yield %>]"),
            ],
        )
        .unwrap();
        assert_eq!(body.as_deref(), Some("[ONETWOSUM]"));
    }

    #[test]
    fn test_unknown_action_propagates() {
        let err = run("destroy_everything", vec![], &[]).unwrap_err();
        match err {
            DispatchError::UnknownAction { controller, action } => {
                assert_eq!(controller, "articles");
                assert_eq!(action, "destroy_everything");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_view_propagates() {
        let err = run(
            "index",
            vec![],
            &[("layouts/application.html.erb", "<%= yield %>")],
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::Resolve(_)));
    }

    #[test]
    fn test_missing_default_layout_propagates() {
        let err = run("index", vec![], &[("articles/index.html.erb", "X")]).unwrap_err();
        match err {
            DispatchError::Resolve(resolve) => {
                assert_eq!(resolve.name, "layouts/application");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_models_requested_before_action() {
        let (_dir, views, config) = setup(&[
            ("articles/index.html.erb", "X"),
            ("layouts/application.html.erb", "<%= yield %>"),
        ]);
        let loader = TestLoader::new();
        let mut controller = ArticlesController;
        let req = Request::new(Route::new("articles", "index"));
        dispatch(&mut controller, &req, &loader, &views, &config).unwrap();
        assert_eq!(*loader.requested.borrow(), vec!["article_model".to_string()]);
    }

    #[test]
    fn test_model_load_failure_aborts_before_action() {
        struct NeedsGhost;

        impl Controller for NeedsGhost {
            fn models(&self) -> &[&str] {
                &["ghost"]
            }

            fn call(&mut self, _ctx: &mut Context<'_>, _req: &Request) -> Result<(), DispatchError> {
                panic!("action must not run when model loading fails");
            }
        }

        let (_dir, views, config) = setup(&[]);
        let req = Request::new(Route::new("ghosts", "index"));
        let err = dispatch(
            &mut NeedsGhost,
            &req,
            &TestLoader::new(),
            &views,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::ModelLoad { .. }));
    }
}
