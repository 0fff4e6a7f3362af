//! Command formatter: turns a filtered line into the command sent to ebusd.
//!
//! Formatting is pure.  The same `(line, mode, input)` always produces the
//! same command text and nothing here touches the network.

use std::borrow::Cow;

use crate::domain::mode::Mode;

/// Placeholder replaced by the filtered line.
pub const LINE_PLACEHOLDER: &str = "${line}";

/// Placeholder replaced by the user-supplied input text.
pub const INPUT_PLACEHOLDER: &str = "${input}";

/// Default query: verbose, definition-relative read of the line.
pub const DEFAULT_QUERY_TEMPLATE: &str = r#"read -V -V -def -def -i "${input}" "${line}""#;

/// Upload: persist the line as a message definition.
pub const UPLOAD_TEMPLATE: &str = r#"define -r "${line}""#;

/// The shape applied to each line of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTemplate<'a> {
    /// The line is the command.
    Verbatim,
    /// A template with `${line}` / `${input}` placeholders.
    Template(Cow<'a, str>),
}

impl<'a> CommandTemplate<'a> {
    /// Selects the template for `mode`.
    pub fn for_mode(mode: &'a Mode) -> Self {
        match mode {
            Mode::Raw => CommandTemplate::Verbatim,
            Mode::Upload => CommandTemplate::Template(Cow::Borrowed(UPLOAD_TEMPLATE)),
            Mode::Query => CommandTemplate::Template(Cow::Borrowed(DEFAULT_QUERY_TEMPLATE)),
            Mode::CustomFormat(template) => CommandTemplate::Template(Cow::Borrowed(template)),
        }
    }

    /// Whether rendering uses an `${input}` value.
    pub fn needs_input(&self) -> bool {
        match self {
            CommandTemplate::Verbatim => false,
            CommandTemplate::Template(t) => t.contains(INPUT_PLACEHOLDER),
        }
    }

    /// Renders the command for one line.
    ///
    /// Placeholders are substituted in a single left-to-right pass, so a
    /// `${line}` appearing inside the input text (or vice versa) is copied
    /// literally instead of being expanded again.  Unknown `${...}` sequences
    /// are left untouched.
    pub fn render(&self, line: &str, input: &str) -> String {
        let template = match self {
            CommandTemplate::Verbatim => return line.to_string(),
            CommandTemplate::Template(t) => t.as_ref(),
        };

        let mut out = String::with_capacity(template.len() + line.len() + input.len());
        let mut rest = template;
        while let Some(pos) = rest.find("${") {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(LINE_PLACEHOLDER) {
                out.push_str(line);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(INPUT_PLACEHOLDER) {
                out.push_str(input);
                rest = after;
            } else {
                out.push_str("${");
                rest = &tail[2..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Formats `line` as the command text for `mode`.
///
/// `input` replaces `${input}` when the template has one; pass `""` when no
/// input was supplied.
///
/// # Example
///
/// ```rust
/// use ebus_core::{format_command, Mode};
///
/// assert_eq!(format_command("A1,foo", &Mode::Upload, ""), r#"define -r "A1,foo""#);
/// assert_eq!(format_command("info", &Mode::Raw, ""), "info");
/// ```
pub fn format_command(line: &str, mode: &Mode, input: &str) -> String {
    CommandTemplate::for_mode(mode).render(line, input)
}
