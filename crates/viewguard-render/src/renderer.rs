//! MiniJinja view renderer with guarded includes.
//!
//! Templates are looked up by bean kind and view name as
//! `<kind>/<view>.jinja`, either registered inline with
//! [`ViewRenderer::add_view`] or loaded from
//! [`RendererConfig::template_dir`].
//!
//! ## Template Context
//!
//! Each view template sees:
//!
//! - `bean`: the bean's fields plus `id` and `kind`
//! - `view`: the view name being rendered
//! - `include_view(target, view)`: renders another bean's view inline;
//!   `target` is a bean id or any value with an `id` attribute
//!
//! ```jinja
//! <h1>{{ bean.title }}</h1>
//! {% for id in bean.related %}{{ include_view(id, "teaser") }}{% endfor %}
//! ```
//!
//! ## Recursion
//!
//! Every render, top-level or included, goes through one
//! [`RecursionGuard`] bound to the request's chain. An include of a
//! (bean, view) pair that is already being rendered further up is replaced
//! by the recursion error while the rest of the page renders normally.
//! The error reaches the outer channel as its own write, however deep the
//! include, so a [`MarkupChannel`](crate::MarkupChannel) emits it as an
//! element rather than as escaped text.
//!
//! ```rust
//! use viewguard_render::{Bean, MemoryBeans, ViewRenderer};
//!
//! let beans = MemoryBeans::new().with(Bean::new("Article#1", "article"));
//! let mut renderer = ViewRenderer::new(beans);
//! renderer
//!     .add_view("article", "full", r#"[{{ include_view(bean, "full") }}]"#)
//!     .unwrap();
//!
//! let request = renderer.request();
//! let page = renderer.render_to_string(&request, "Article#1", "full").unwrap();
//! assert_eq!(
//!     page,
//!     "[Recursion detected, bean Article#1 with view full was included already.]"
//! );
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use minijinja::value::{Object, ObjectRepr};
use minijinja::{context, path_loader, Environment, ErrorKind, State, Value};
use tracing::debug;
use viewguard::{ChainStore, RecursionDetected, RecursionGuard, Rendered, SharedRequestScope};

use crate::bean::{BeanId, BeanSource};
use crate::channel::{Channel, TextChannel};
use crate::config::{ErrorDisplay, RendererConfig};
use crate::error::RenderError;

/// Extension of view template files.
pub const TEMPLATE_EXTENSION: &str = "jinja";

/// Name of the template for `view` of beans of `kind`.
pub fn template_name(kind: &str, view: &str) -> String {
    format!("{}/{}.{}", kind, view, TEMPLATE_EXTENSION)
}

/// Renders beans through views, guarding nested includes against recursion.
pub struct ViewRenderer {
    env: Environment<'static>,
    beans: Arc<dyn BeanSource>,
    config: Arc<RendererConfig>,
}

impl ViewRenderer {
    /// Creates a renderer with the default configuration.
    pub fn new(beans: impl BeanSource + 'static) -> Self {
        Self::build(Arc::new(beans), RendererConfig::default())
    }

    /// Creates a renderer with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ConfigError`] if the template directory is
    /// missing or not a directory.
    pub fn with_config(
        beans: impl BeanSource + 'static,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self::build(Arc::new(beans), config))
    }

    fn build(beans: Arc<dyn BeanSource>, config: RendererConfig) -> Self {
        let mut env = Environment::new();
        if let Some(dir) = &config.template_dir {
            env.set_loader(path_loader(dir));
        }
        Self {
            env,
            beans,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Registers the template for `view` of beans of `kind`.
    ///
    /// Inline templates shadow templates of the same name on disk.
    pub fn add_view(&mut self, kind: &str, view: &str, source: &str) -> Result<(), RenderError> {
        self.add_template(&template_name(kind, view), source)
    }

    /// Registers a template under an explicit name, such as the error view.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())?;
        Ok(())
    }

    /// Whether a template exists for `view` of beans of `kind`.
    pub fn has_view(&self, kind: &str, view: &str) -> bool {
        self.env.get_template(&template_name(kind, view)).is_ok()
    }

    /// Starts a request. All renders of one request must share its handle.
    pub fn request(&self) -> Request {
        Request {
            state: Arc::new(RequestState {
                scope: SharedRequestScope::new(),
                beans: Arc::clone(&self.beans),
                config: Arc::clone(&self.config),
            }),
        }
    }

    /// Renders `view` of bean `id` onto `channel`.
    ///
    /// Returns [`Rendered::Recursion`] if this pair was already being
    /// rendered in `request`; the channel then received the recursion error
    /// instead of the view.
    ///
    /// # Errors
    ///
    /// Fails if the bean or template is missing, the template fails, or the
    /// channel cannot be written. A failed write of the recursion error is
    /// logged, not returned.
    pub fn render<C: Channel>(
        &self,
        request: &Request,
        id: impl Into<BeanId>,
        view: &str,
        channel: C,
    ) -> Result<Rendered<()>, RenderError> {
        render_guarded(&self.env, &request.state, id.into(), view, channel)
    }

    /// Renders `view` of bean `id` to a string.
    pub fn render_to_string(
        &self,
        request: &Request,
        id: impl Into<BeanId>,
        view: &str,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render(request, id, view, TextChannel::new(&mut out))?;
        Ok(out)
    }
}

impl fmt::Debug for ViewRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRenderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle on one request's rendering state.
///
/// Cloning the handle shares the request; it does not start a new one.
#[derive(Clone)]
pub struct Request {
    state: Arc<RequestState>,
}

impl Request {
    /// Number of views currently being rendered in this request.
    pub fn depth(&self) -> usize {
        self.state.scope.with_chain(|chain| chain.depth())
    }

    /// Ids and views currently being rendered, outermost first.
    pub fn active_views(&self) -> Vec<(BeanId, String)> {
        self.state.scope.with_chain(|chain| {
            chain
                .iter()
                .map(|key| (key.bean().clone(), key.view().to_string()))
                .collect()
        })
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("active_views", &self.active_views())
            .finish()
    }
}

struct RequestState {
    scope: SharedRequestScope<BeanId>,
    beans: Arc<dyn BeanSource>,
    config: Arc<RendererConfig>,
}

/// Delimits the placeholder an included recursion error leaves in its
/// parent's output until the parent is written to a channel.
const MARKER: char = '\u{FFFF}';

/// One piece of a rendered view.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Content(String),
    Recursion {
        detected: RecursionDetected,
        text: String,
    },
}

/// Rendered view output with recursion errors kept apart from content, so
/// each channel can represent them its own way.
#[derive(Debug, Default, PartialEq)]
struct Segments(Vec<Segment>);

impl Segments {
    fn push_content(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        match self.0.last_mut() {
            Some(Segment::Content(last)) => last.push_str(content),
            _ => self.0.push(Segment::Content(content.to_string())),
        }
    }

    fn replay<C: Channel + ?Sized>(self, channel: &mut C) -> Result<(), RenderError> {
        for segment in self.0 {
            match segment {
                Segment::Content(content) => channel.write_content(&content)?,
                Segment::Recursion { detected, text } => {
                    channel.write_recursion_error(&detected, &text)?
                }
            }
        }
        Ok(())
    }
}

impl Channel for Segments {
    fn write_content(&mut self, content: &str) -> Result<(), RenderError> {
        self.push_content(content);
        Ok(())
    }

    fn write_recursion_error(
        &mut self,
        detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError> {
        self.0.push(Segment::Recursion {
            detected: detected.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// The `include_view` callable exposed to templates.
///
/// One instance serves one view render. Recursion errors from its includes
/// are held here and left as markers in the template output.
struct IncludeView {
    state: Arc<RequestState>,
    recursions: Mutex<Vec<(RecursionDetected, String)>>,
}

impl IncludeView {
    fn new(state: &Arc<RequestState>) -> Self {
        Self {
            state: Arc::clone(state),
            recursions: Mutex::new(Vec::new()),
        }
    }

    /// Flattens an include's segments into template output.
    fn inline(&self, segments: Segments) -> String {
        let mut out = String::new();
        let mut recursions = self.recursions.lock().unwrap_or_else(PoisonError::into_inner);
        for segment in segments.0 {
            match segment {
                Segment::Content(content) => out.push_str(&content),
                Segment::Recursion { detected, text } => {
                    out.push(MARKER);
                    out.push_str(&recursions.len().to_string());
                    out.push(MARKER);
                    recursions.push((detected, text));
                }
            }
        }
        out
    }

    /// Splits template output back into content and the recursion errors
    /// its markers stand for.
    fn split(&self, output: &str) -> Segments {
        let mut recursions: Vec<_> = std::mem::take(
            &mut *self.recursions.lock().unwrap_or_else(PoisonError::into_inner),
        )
        .into_iter()
        .map(Some)
        .collect();

        let mut segments = Segments::default();
        let mut rest = output;
        while let Some(start) = rest.find(MARKER) {
            let after = &rest[start + MARKER.len_utf8()..];
            let Some(end) = after.find(MARKER) else {
                break;
            };
            let recursion = after[..end]
                .parse::<usize>()
                .ok()
                .and_then(|index| recursions.get_mut(index))
                .and_then(Option::take);
            match recursion {
                Some((detected, text)) => {
                    segments.push_content(&rest[..start]);
                    segments.0.push(Segment::Recursion { detected, text });
                    rest = &after[end + MARKER.len_utf8()..];
                }
                None => {
                    segments.push_content(&rest[..start + MARKER.len_utf8()]);
                    rest = after;
                }
            }
        }
        segments.push_content(rest);
        segments
    }
}

impl fmt::Debug for IncludeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("include_view")
    }
}

impl Object for IncludeView {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        args: &[Value],
    ) -> Result<Value, minijinja::Error> {
        if args.len() != 2 {
            return Err(minijinja::Error::new(
                ErrorKind::MissingArgument,
                "include_view() requires a bean and a view name",
            ));
        }

        let id = target_id(&args[0])?;
        let view = args[1].as_str().ok_or_else(|| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                "include_view() view name must be a string",
            )
        })?;

        let mut nested = Segments::default();
        render_guarded(state.env(), &self.state, id, view, &mut nested)
            .map_err(RenderError::into_template_error)?;
        Ok(Value::from_safe_string(self.inline(nested)))
    }
}

/// Accepts a bean id string or a value with an `id` attribute.
fn target_id(target: &Value) -> Result<BeanId, minijinja::Error> {
    if let Some(id) = target.as_str() {
        return Ok(BeanId::from(id));
    }
    let id = target.get_attr("id")?;
    id.as_str().map(BeanId::from).ok_or_else(|| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            "include_view() target must be a bean id or have an `id`",
        )
    })
}

fn render_guarded<C: Channel>(
    env: &Environment<'_>,
    state: &Arc<RequestState>,
    id: BeanId,
    view: &str,
    channel: C,
) -> Result<Rendered<()>, RenderError> {
    let channel = RefCell::new(channel);
    let guard = RecursionGuard::new(&state.scope);

    guard.wrap(
        id.clone(),
        view,
        || {
            let segments = render_view(env, state, &id, view)?;
            segments.replay(&mut *channel.borrow_mut())
        },
        |detected| match state.config.error_display {
            ErrorDisplay::Hidden => Ok(()),
            ErrorDisplay::Verbose => {
                let text = render_error(env, &state.config, detected)?;
                channel.borrow_mut().write_recursion_error(detected, &text)
            }
        },
    )
}

fn render_view(
    env: &Environment<'_>,
    state: &Arc<RequestState>,
    id: &BeanId,
    view: &str,
) -> Result<Segments, RenderError> {
    let bean = state
        .beans
        .lookup(id)
        .ok_or_else(|| RenderError::BeanNotFound(id.to_string()))?;
    let name = template_name(bean.kind(), view);
    debug!(bean = %id, template = %name, "render view");

    let template = env.get_template(&name)?;
    let include = Arc::new(IncludeView::new(state));
    let output = template.render(context! {
        bean => bean.to_value(),
        view => view,
        include_view => Value::from_dyn_object(Arc::clone(&include)),
    })?;
    Ok(include.split(&output))
}

fn render_error(
    env: &Environment<'_>,
    config: &RendererConfig,
    detected: &RecursionDetected,
) -> Result<String, RenderError> {
    match env.get_template(&config.error_view) {
        Ok(template) => Ok(template.render(context! {
            message => detected.to_string(),
            bean => detected.bean(),
            view => detected.view(),
        })?),
        Err(err) if err.kind() == ErrorKind::TemplateNotFound => Ok(detected.to_string()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{Bean, MemoryBeans};
    use viewguard::BeanView;

    fn renderer() -> ViewRenderer {
        let beans = MemoryBeans::new()
            .with(Bean::new("Article#1", "article").with_field("title", "First"))
            .with(Bean::new("Article#2", "article").with_field("title", "Second"));
        ViewRenderer::new(beans)
    }

    #[test]
    fn template_names() {
        assert_eq!(template_name("article", "full"), "article/full.jinja");
    }

    #[test]
    fn renders_bean_fields() {
        let mut renderer = renderer();
        renderer
            .add_view("article", "full", "{{ bean.id }}: {{ bean.title }} ({{ view }})")
            .unwrap();

        let request = renderer.request();
        let out = renderer.render_to_string(&request, "Article#1", "full").unwrap();
        assert_eq!(out, "Article#1: First (full)");
        assert_eq!(request.depth(), 0);
    }

    #[test]
    fn include_accepts_id_or_bean() {
        let mut renderer = renderer();
        renderer
            .add_view(
                "article",
                "page",
                r#"{{ include_view("Article#2", "title") }}/{{ include_view(bean, "title") }}"#,
            )
            .unwrap();
        renderer.add_view("article", "title", "{{ bean.title }}").unwrap();

        let request = renderer.request();
        let out = renderer.render_to_string(&request, "Article#1", "page").unwrap();
        assert_eq!(out, "Second/First");
    }

    #[test]
    fn include_output_is_not_escaped() {
        let beans = MemoryBeans::new().with(Bean::new("p", "page"));
        let mut renderer = ViewRenderer::new(beans);
        renderer.add_view("page", "outer", r#"{{ include_view("p", "inner") }}"#).unwrap();
        renderer.add_view("page", "inner", "<b>&</b>").unwrap();

        let out = renderer
            .render_to_string(&renderer.request(), "p", "outer")
            .unwrap();
        assert_eq!(out, "<b>&</b>");
    }

    #[test]
    fn include_rejects_bad_arguments() {
        let mut renderer = renderer();
        renderer.add_view("article", "one", r#"{{ include_view("Article#2") }}"#).unwrap();
        renderer.add_view("article", "num", r#"{{ include_view(3, "full") }}"#).unwrap();

        let request = renderer.request();
        assert!(renderer.render_to_string(&request, "Article#1", "one").is_err());
        let request = renderer.request();
        assert!(renderer.render_to_string(&request, "Article#1", "num").is_err());
    }

    #[test]
    fn missing_bean_is_an_error() {
        let renderer = renderer();
        let err = renderer
            .render_to_string(&renderer.request(), "Article#404", "full")
            .unwrap_err();
        assert!(matches!(err, RenderError::BeanNotFound(ref id) if id == "Article#404"));
    }

    #[test]
    fn missing_template_is_an_error() {
        let renderer = renderer();
        let err = renderer
            .render_to_string(&renderer.request(), "Article#1", "full")
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(_)));
    }

    #[test]
    fn included_recursion_stays_a_separate_segment() {
        let mut renderer = renderer();
        renderer
            .add_view("article", "full", r#"<p>{{ include_view(bean, "full") }}</p>"#)
            .unwrap();

        let request = renderer.request();
        let segments =
            render_view(&renderer.env, &request.state, &"Article#1".into(), "full").unwrap();
        let detected = RecursionDetected::new(&BeanView::new("Article#1", "full"));
        assert_eq!(
            segments,
            Segments(vec![
                Segment::Content("<p>".into()),
                Segment::Recursion {
                    text: detected.to_string(),
                    detected,
                },
                Segment::Content("</p>".into()),
            ])
        );
    }

    #[test]
    fn unknown_markers_are_plain_content() {
        let state = renderer().request().state;
        let include = IncludeView::new(&state);
        let output = format!("a{MARKER}7{MARKER}b{MARKER}");

        assert_eq!(
            include.split(&output),
            Segments(vec![Segment::Content(output.clone())])
        );
    }

    #[test]
    fn has_view() {
        let mut renderer = renderer();
        renderer.add_view("article", "full", "x").unwrap();
        assert!(renderer.has_view("article", "full"));
        assert!(!renderer.has_view("article", "teaser"));
    }

    #[test]
    fn syntax_error_on_add() {
        let mut renderer = renderer();
        let err = renderer.add_view("article", "full", "{{ unclosed").unwrap_err();
        assert!(matches!(err, RenderError::TemplateError(_)));
    }
}
