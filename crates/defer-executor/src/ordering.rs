//! Out-of-order streaming markup.
//!
//! A deferred fragment first appears as a placeholder holding its fallback.
//! Its content arrives later, after the body, as a patch: an inert
//! `<template>` plus a script that moves the template content over the
//! placeholder and removes both the template and itself.

/// Attribute marking a placeholder.
pub const SLOT_ATTRIBUTE: &str = "data-deferred-slot";

/// Attribute marking a patch template.
pub const TEMPLATE_ATTRIBUTE: &str = "data-deferred-template";

/// Wrap fallback markup in a placeholder for slot `id`.
///
/// `display: contents` keeps the wrapper out of layout.
pub fn placeholder(id: &str, fallback_html: &str) -> String {
    format!(
        r#"<div style="display: contents" {}="{}">{}</div>"#,
        SLOT_ATTRIBUTE, id, fallback_html
    )
}

/// Generate the script that relocates the patch for slot `id`.
pub fn relocation_script(id: &str) -> String {
    format!(
        r#"<script>
(function () {{
  const t = document.querySelector("[{template}='{id}']");
  document.querySelector("[{slot}='{id}']").replaceWith(t.content.cloneNode(true));
  t.remove();
  document.currentScript.remove();
}})();
</script>"#,
        template = TEMPLATE_ATTRIBUTE,
        slot = SLOT_ATTRIBUTE,
        id = id
    )
}

/// Build the patch markup for slot `id`.
pub fn patch_markup(id: &str, html: &str) -> String {
    format!(
        r#"<template {}="{}">{}</template>{}"#,
        TEMPLATE_ATTRIBUTE,
        id,
        html,
        relocation_script(id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        assert_eq!(
            placeholder("slot-3", "<span>loading</span>"),
            r#"<div style="display: contents" data-deferred-slot="slot-3"><span>loading</span></div>"#
        );
    }

    #[test]
    fn test_patch_targets_its_slot() {
        let patch = patch_markup("slot-3", "<p>done</p>");
        assert!(patch.starts_with(r#"<template data-deferred-template="slot-3"><p>done</p></template><script>"#));
        assert!(patch.contains(r#"document.querySelector("[data-deferred-slot='slot-3']")"#));
        assert!(patch.contains(r#"document.querySelector("[data-deferred-template='slot-3']")"#));
        assert!(patch.contains("document.currentScript.remove();"));
        assert!(patch.ends_with("</script>"));
    }
}
