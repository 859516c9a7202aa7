//! Node trees and the render-to-text boundary.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};

use crate::env::Environment;
use crate::error::RenderError;

/// A subtree that can be rendered to markup.
///
/// Rendering receives the ambient [`Environment`] visible at the node's
/// position. Implementations may suspend; siblings are rendered
/// concurrently and concatenated in document order.
#[async_trait]
pub trait Node: Send + Sync {
    /// Render this subtree to markup.
    async fn render(&self, env: &Environment) -> Result<String, RenderError>;
}

/// An owned, type-erased node.
pub type BoxNode = Box<dyn Node>;

#[async_trait]
impl Node for BoxNode {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        (**self).render(env).await
    }
}

/// Render a node tree to text.
pub async fn render_to_text(node: &dyn Node, env: &Environment) -> Result<String, RenderError> {
    node.render(env).await
}

/// Convenience conversions for nodes.
pub trait NodeExt: Node + Sized + 'static {
    /// Box this node.
    fn boxed(self) -> BoxNode {
        Box::new(self)
    }
}

impl<N: Node + 'static> NodeExt for N {}

/// Escape text for inclusion in markup or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

async fn render_children(children: &[BoxNode], env: &Environment) -> Result<String, RenderError> {
    let parts = try_join_all(children.iter().map(|child| child.render(env))).await?;
    Ok(parts.concat())
}

/// Renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

#[async_trait]
impl Node for Empty {
    async fn render(&self, _env: &Environment) -> Result<String, RenderError> {
        Ok(String::new())
    }
}

/// Trusted markup, emitted verbatim.
#[derive(Debug, Clone)]
pub struct Html(pub String);

impl Html {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }
}

#[async_trait]
impl Node for Html {
    async fn render(&self, _env: &Environment) -> Result<String, RenderError> {
        Ok(self.0.clone())
    }
}

/// Text content, escaped on render.
#[derive(Debug, Clone)]
pub struct Text(pub String);

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl Node for Text {
    async fn render(&self, _env: &Environment) -> Result<String, RenderError> {
        Ok(escape_html(&self.0))
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// An element with attributes and children.
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<BoxNode>,
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Append a child node.
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    /// Append a text child.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Text::new(text))
    }

    /// Append already boxed children.
    pub fn children(mut self, children: impl IntoIterator<Item = BoxNode>) -> Self {
        self.children.extend(children);
        self
    }
}

#[async_trait]
impl Node for Element {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let mut html = format!("<{}", self.tag);
        for (name, value) in &self.attrs {
            html.push_str(&format!(r#" {}="{}""#, name, escape_html(value)));
        }
        html.push('>');

        if self.children.is_empty() && VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return Ok(html);
        }

        html.push_str(&render_children(&self.children, env).await?);
        html.push_str(&format!("</{}>", self.tag));
        Ok(html)
    }
}

/// A sequence of sibling nodes without a wrapping element.
#[derive(Default)]
pub struct Fragment(pub Vec<BoxNode>);

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child node.
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.0.push(Box::new(child));
        self
    }
}

#[async_trait]
impl Node for Fragment {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        render_children(&self.0, env).await
    }
}

#[async_trait]
impl Node for Vec<BoxNode> {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        render_children(self, env).await
    }
}

/// Makes a value of type `T` visible to its subtree.
pub struct Provide<T> {
    value: Arc<T>,
    child: BoxNode,
}

impl<T: Send + Sync + 'static> Provide<T> {
    pub fn new(value: T, child: impl Node + 'static) -> Self {
        Self {
            value: Arc::new(value),
            child: Box::new(child),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Node for Provide<T> {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let env = env.with_shared(Arc::clone(&self.value));
        self.child.render(&env).await
    }
}

/// Builds its subtree from the visible value of type `T`.
pub struct Consume<T, F> {
    build: F,
    _value: PhantomData<fn() -> T>,
}

impl<T, F> Consume<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(Option<&T>) -> BoxNode + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self {
            build,
            _value: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> Node for Consume<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(Option<&T>) -> BoxNode + Send + Sync,
{
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let node = (self.build)(env.get::<T>());
        node.render(env).await
    }
}

/// A subtree that is only known once a future completes.
///
/// Rendering waits for the future; there is no fallback. The future is
/// consumed, so an `Await` renders once.
pub struct Await {
    content: Mutex<Option<BoxFuture<'static, Result<BoxNode, RenderError>>>>,
}

impl Await {
    pub fn new(content: BoxFuture<'static, Result<BoxNode, RenderError>>) -> Self {
        Self {
            content: Mutex::new(Some(content)),
        }
    }
}

#[async_trait]
impl Node for Await {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let content = self
            .content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(content) = content else {
            return Err(RenderError::FragmentConsumed);
        };
        let node = content.await?;
        node.render(env).await
    }
}
