//! `{{name}}` pattern compilation.

/// A pattern split into literal segments and placeholder names.
///
/// There is always exactly one more segment than there are placeholders:
/// rendering emits `segments[0]`, `slots[0]`, `segments[1]`, ... and ends
/// with the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    segments: Vec<String>,
    slots: Vec<String>,
}

impl CompiledTemplate {
    /// Literal text segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Placeholder names, in order. Names may repeat.
    pub fn slots(&self) -> &[String] {
        &self.slots
    }
}

/// Compile a pattern containing `{{name}}` placeholders.
///
/// Names are made of ASCII alphanumerics, `_` and `-`. Anything else between
/// braces, and an unterminated `{{`, stays literal text.
pub fn compile(pattern: &str) -> CompiledTemplate {
    let mut segments = Vec::new();
    let mut slots = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };

        let name = &after_open[..close];
        if is_slot_name(name) {
            literal.push_str(&rest[..open]);
            segments.push(std::mem::take(&mut literal));
            slots.push(name.to_string());
            rest = &after_open[close + 2..];
        } else {
            // Keep one brace and rescan, so `{{{name}}}` still finds `{{name}}`.
            literal.push_str(&rest[..open + 1]);
            rest = &rest[open + 1..];
        }
    }

    literal.push_str(rest);
    segments.push(literal);

    CompiledTemplate { segments, slots }
}

fn is_slot_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
