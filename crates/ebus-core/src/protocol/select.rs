//! Test-command selection from a converted definition set.
//!
//! A TypeSpec file usually converts into many definitions.  When the user
//! runs only part of it (one namespace, or one model), the matching filtered
//! lines are picked here before formatting.
//!
//! Filtered lines have the level column already removed, so the layout is
//! `type,circuit,name,...`.
//!
//! When nothing matches, lines of the [`SelectionPolicy::fallback_circuit`]
//! circuit are used instead.  The converter names the circuit after the input
//! file and falls back to `Main` when it has no file name to go by, so the
//! fallback catches definitions that lost their namespace in conversion.

use crate::domain::config::SelectionPolicy;

const CIRCUIT_COLUMN: usize = 1;
const NAME_COLUMN: usize = 2;

/// What the caller wants to exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    /// TypeSpec namespace, compared with the circuit column.
    pub namespace: Option<String>,
    /// TypeSpec model, compared with the message name column.
    pub model: Option<String>,
}

impl Target {
    /// `true` when neither a namespace nor a model is set.
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.model.is_none()
    }
}

fn column<'a>(line: &'a str, index: usize) -> Option<&'a str> {
    line.split(',').nth(index).map(str::trim)
}

fn eq_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.eq_ignore_ascii_case(b))
}

/// Selects the lines to send for `target`.
///
/// - An empty target selects everything.
/// - Otherwise a line matches when its circuit equals the namespace or its
///   name equals the model (ASCII case-insensitive).
/// - If nothing matches, lines whose circuit equals the policy's fallback
///   circuit are returned; with the fallback disabled the result is empty.
pub fn select_lines(lines: &[String], target: &Target, policy: &SelectionPolicy) -> Vec<String> {
    if target.is_empty() {
        return lines.to_vec();
    }

    let matched: Vec<String> = lines
        .iter()
        .filter(|line| {
            eq_ignore_case(column(line, CIRCUIT_COLUMN), target.namespace.as_deref())
                || eq_ignore_case(column(line, NAME_COLUMN), target.model.as_deref())
        })
        .cloned()
        .collect();
    if !matched.is_empty() {
        return matched;
    }

    let Some(fallback) = policy.fallback_circuit.as_deref() else {
        return Vec::new();
    };
    tracing::debug!("no line matches {target:?}; falling back to circuit {fallback}");
    lines
        .iter()
        .filter(|line| eq_ignore_case(column(line, CIRCUIT_COLUMN), Some(fallback)))
        .cloned()
        .collect()
}
