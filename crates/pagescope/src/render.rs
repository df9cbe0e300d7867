//! Report rendering.
//!
//! Two levels only: a value becomes sections, a section becomes rows. Values
//! nested deeper than a row are shown inline.
//!
//! | Shape | Sections | Rows |
//! |-------|----------|------|
//! | named list | one per entry, headed by its name | rows of the entry's value |
//! | list | one | one per element |
//! | mapping | one | one per key, `key: value` |
//! | text | one | one |

use crate::report::{JsonValue, Snapshot};
use std::fmt::Write as _;

/// A group of rows with an optional header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    /// Header text (named-list entries only)
    pub header: Option<String>,
    /// Row texts
    pub rows: Vec<String>,
}

/// Render a value as sections of rows
#[must_use]
pub fn render_value(value: &JsonValue) -> Vec<RenderedSection> {
    match value {
        JsonValue::NamedList(entries) => entries
            .iter()
            .map(|(name, inner)| RenderedSection {
                header: Some(name.clone()),
                rows: rows_of(inner),
            })
            .collect(),
        other => vec![RenderedSection {
            header: None,
            rows: rows_of(other),
        }],
    }
}

fn rows_of(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Text(text) => vec![text.clone()],
        JsonValue::List(items) => items.iter().map(row_text).collect(),
        JsonValue::Map(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", inline_text(v)))
            .collect(),
        JsonValue::NamedList(entries) => entries
            .iter()
            .map(|(k, v)| format!("{k}: {}", inline_text(v)))
            .collect(),
    }
}

/// Text shown for one row
///
/// Lists join their elements with newlines; mappings and named lists join
/// `key: value` lines. Anything below that is inline.
#[must_use]
pub fn row_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Text(text) => text.clone(),
        JsonValue::List(items) => items
            .iter()
            .map(inline_text)
            .collect::<Vec<_>>()
            .join("\n"),
        JsonValue::Map(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", inline_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        JsonValue::NamedList(entries) => entries
            .iter()
            .map(|(k, v)| format!("{k}: {}", inline_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Single-line description of a value
#[must_use]
pub fn inline_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Text(text) => text.clone(),
        JsonValue::List(items) => {
            let inner: Vec<String> = items.iter().map(inline_text).collect();
            format!("[{}]", inner.join(", "))
        }
        JsonValue::Map(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", inline_text(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        JsonValue::NamedList(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{k}: {}", inline_text(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// One page of the report view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTab {
    /// Uppercased section key
    pub title: String,
    /// Rendered content
    pub sections: Vec<RenderedSection>,
}

/// Page-tab view of a snapshot, one tab per section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    /// View title
    pub title: String,
    /// Tabs in report order
    pub tabs: Vec<ReportTab>,
}

impl ReportView {
    /// Build the view for a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let tabs = snapshot
            .sections()
            .iter()
            .map(|section| ReportTab {
                title: section.key.as_str().to_uppercase(),
                sections: render_value(&section.value),
            })
            .collect();
        Self {
            title: String::from("Debugger"),
            tabs,
        }
    }

    /// Tab titles in order
    #[must_use]
    pub fn tab_titles(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.title.as_str()).collect()
    }

    /// Plain-text layout of the whole view
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for tab in &self.tabs {
            let _ = writeln!(out, "== {} ==", tab.title);
            for section in &tab.sections {
                if let Some(header) = &section.header {
                    let _ = writeln!(out, "-- {header} --");
                }
                for row in &section.rows {
                    let _ = writeln!(out, "{row}");
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::report::{ReportSection, SectionKey};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_mapping_rows_flatten_nested_list() {
        let value = JsonValue::from_json(&json!({"a": [1, 2], "b": "x"}));
        let sections = render_value(&value);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, None);
        assert_eq!(sections[0].rows, vec!["a: [1, 2]", "b: x"]);
    }

    #[test]
    fn test_named_list_renders_headered_sections() {
        let value = JsonValue::NamedList(vec![
            ("Cookies".into(), JsonValue::text_list(["c1", "c2"])),
            ("LocalStorage".into(), JsonValue::text_map([("k", "v")])),
        ]);
        let sections = render_value(&value);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header.as_deref(), Some("Cookies"));
        assert_eq!(sections[0].rows, vec!["c1", "c2"]);
        assert_eq!(sections[1].header.as_deref(), Some("LocalStorage"));
        assert_eq!(sections[1].rows, vec!["k: v"]);
    }

    #[test]
    fn test_list_row_per_element() {
        let value = JsonValue::List(vec![
            JsonValue::Text("one".into()),
            JsonValue::text_list(["x", "y"]),
            JsonValue::text_map([("k", "v"), ("j", "w")]),
        ]);
        let sections = render_value(&value);
        assert_eq!(sections[0].rows, vec!["one", "x\ny", "j: w\nk: v"]);
    }

    #[test]
    fn test_text_single_row() {
        let sections = render_value(&JsonValue::Text("<html/>".into()));
        assert_eq!(sections[0].rows, vec!["<html/>"]);
    }

    #[test]
    fn test_rows_never_recurse_past_two_levels() {
        let deep = JsonValue::List(vec![JsonValue::List(vec![JsonValue::List(vec![
            JsonValue::Text("z".into()),
        ])])]);
        let sections = render_value(&deep);
        assert_eq!(sections[0].rows, vec!["[z]"]);
    }

    #[test]
    fn test_inline_empty_values() {
        assert_eq!(inline_text(&JsonValue::List(Vec::new())), "[]");
        assert_eq!(inline_text(&JsonValue::Map(BTreeMap::new())), "{}");
    }

    #[test]
    fn test_view_tabs() {
        let snapshot = Snapshot::from_sections([ReportSection::new(
            SectionKey::Console,
            JsonValue::text_list(["hello"]),
        )]);
        let view = ReportView::from_snapshot(&snapshot);
        assert_eq!(view.title, "Debugger");
        assert_eq!(
            view.tab_titles(),
            vec!["HTML", "NETWORK", "STORAGE", "CONSOLE", "SOURCES"]
        );
        let text = view.to_plain_text();
        assert!(text.contains("== CONSOLE ==\nhello\n"));
    }
}
