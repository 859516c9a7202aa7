//! Document shell: the built-in page pattern and head content.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use defer_core::{escape_html, BoxNode, Environment, Node, RenderError};

use crate::template::{compile, CompiledTemplate};

/// Slot for the rendered head subtree.
pub const HEAD_SLOT: &str = "head";
/// Slot for the invisible padding element.
pub const SAFARI_PAD_SLOT: &str = "safariPad";
/// Slot for the rendered body subtree.
pub const BODY_SLOT: &str = "body";
/// Slot for the out-of-band patches of deferred content.
pub const DEFERRED_SLOTS: &str = "deferredSlots";
/// Slot for the optional trailing subtree.
pub const END_OF_BODY_SLOT: &str = "endOfBody";

/// The built-in whole-document pattern.
pub const DOCUMENT_PATTERN: &str = concat!(
    r#"<!DOCTYPE html><html lang="en"><head>{{head}}</head>"#,
    "<body>{{safariPad}}{{body}}{{deferredSlots}}{{endOfBody}}</body></html>",
);

/// The compiled built-in document pattern, shared by every render.
pub fn document_template() -> Arc<CompiledTemplate> {
    static TEMPLATE: OnceLock<Arc<CompiledTemplate>> = OnceLock::new();
    Arc::clone(TEMPLATE.get_or_init(|| Arc::new(compile(DOCUMENT_PATTERN))))
}

/// Invisible padding emitted before the body.
///
/// Safari does not render a streamed response incrementally until enough
/// visible bytes have arrived (https://bugs.webkit.org/show_bug.cgi?id=265386).
pub fn safari_pad() -> &'static str {
    static PAD: OnceLock<String> = OnceLock::new();
    PAD.get_or_init(|| {
        format!(
            r#"<span aria-hidden="true" style="user-select: none; position: absolute;">{}</span>"#,
            "\u{200B}".repeat(512)
        )
    })
}

/// Default head content: charset, viewport and title.
#[derive(Default)]
pub struct DefaultHead {
    title: Option<String>,
    children: Vec<BoxNode>,
}

impl DefaultHead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append head content after the title (stylesheets, scripts, ...).
    pub fn child(mut self, child: impl Node + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }
}

#[async_trait]
impl Node for DefaultHead {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let mut html = String::from(concat!(
            r#"<meta charset="UTF-8">"#,
            r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#,
        ));
        html.push_str(&format!(
            "<title>{}</title>",
            escape_html(self.title.as_deref().unwrap_or_default())
        ));
        html.push_str(&self.children.render(env).await?);
        Ok(html)
    }
}
