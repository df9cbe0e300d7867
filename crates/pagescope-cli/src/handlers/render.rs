//! Render command handler

use crate::commands::{RenderArgs, RenderFormat};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::format_view;
use pagescope::{ReportView, SectionKey, Snapshot};

/// Execute the render command
pub fn execute_render(config: &CliConfig, args: &RenderArgs) -> CliResult<()> {
    let text = std::fs::read_to_string(&args.file)?;
    let rendered = render_report(
        &text,
        args.section.as_deref(),
        args.format,
        config.color.should_color(),
    )?;
    print!("{rendered}");
    Ok(())
}

/// Render exported report text
pub fn render_report(
    text: &str,
    section: Option<&str>,
    format: RenderFormat,
    use_color: bool,
) -> CliResult<String> {
    let snapshot = Snapshot::from_serialized_text(text)?;
    let key = section
        .map(|name| {
            SectionKey::from_name(&name.to_lowercase()).ok_or_else(|| {
                CliError::invalid_argument(format!(
                    "unknown section '{name}' (expected one of: html, network, storage, console, sources)"
                ))
            })
        })
        .transpose()?;

    match format {
        RenderFormat::Json => {
            let mut out = match key {
                Some(key) => serde_json::to_string_pretty(&snapshot.section(key).to_json())
                    .map_err(pagescope::ScopeError::from)?,
                None => snapshot.to_serialized_text(),
            };
            out.push('\n');
            Ok(out)
        }
        RenderFormat::Text => {
            let mut view = ReportView::from_snapshot(&snapshot);
            if let Some(key) = key {
                let title = key.as_str().to_uppercase();
                view.tabs.retain(|tab| tab.title == title);
            }
            Ok(format_view(&view, use_color))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
  "html": "<html></html>",
  "network": [],
  "storage": {
    "Cookies": [],
    "LocalStorage": {"theme": "dark"},
    "SessionStorage": {}
  },
  "console": ["one", "two"],
  "sources": {}
}"#;

    #[test]
    fn test_text_has_every_tab() {
        let text = render_report(REPORT, None, RenderFormat::Text, false).unwrap();
        for title in ["== HTML ==", "== NETWORK ==", "== STORAGE ==", "== CONSOLE ==", "== SOURCES =="] {
            assert!(text.contains(title), "missing {title}");
        }
        assert!(text.contains("-- LocalStorage --\ntheme: dark\n"));
    }

    #[test]
    fn test_single_section() {
        let text = render_report(REPORT, Some("Console"), RenderFormat::Text, false).unwrap();
        assert_eq!(text, "== CONSOLE ==\none\ntwo\n\n");
    }

    #[test]
    fn test_json_section() {
        let text = render_report(REPORT, Some("console"), RenderFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, serde_json::json!(["one", "two"]));
    }

    #[test]
    fn test_json_normalizes_whole_report() {
        let text = render_report(REPORT, None, RenderFormat::Json, false).unwrap();
        let keys: Vec<&str> = ["\"html\"", "\"network\"", "\"storage\"", "\"console\"", "\"sources\""]
            .into_iter()
            .collect();
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unknown_section() {
        let err = render_report(REPORT, Some("dom"), RenderFormat::Text, false).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }

    #[test]
    fn test_not_a_report() {
        let err = render_report("[1, 2]", None, RenderFormat::Text, false).unwrap_err();
        assert!(matches!(err, CliError::Scope(_)));
    }
}
