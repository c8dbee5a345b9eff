//! Markdown documentation export for the registry.

use std::collections::BTreeMap;
use std::path::Path;

use crate::registry::ToolRecord;

/// Render the full documentation page. Categories are sorted; tools keep
/// registry order within a category.
pub fn render_markdown(tools: &[ToolRecord]) -> String {
    let mut by_category: BTreeMap<&str, Vec<&ToolRecord>> = BTreeMap::new();
    for tool in tools {
        by_category.entry(tool.category.as_str()).or_default().push(tool);
    }

    let mut out = String::from("# Toolforge Tools Documentation\n\n");
    out.push_str(&format!("Total tools: {}\n", tools.len()));

    for (category, entries) in by_category {
        out.push_str(&format!("\n## {}\n", category));
        for tool in entries {
            out.push_str(&format!("\n### {}\n\n", tool.name));
            out.push_str(&format!("`{}`\n\n", tool.signature()));
            if !tool.documentation.trim().is_empty() {
                out.push_str(tool.documentation.trim());
                out.push_str("\n\n");
            }
            out.push_str(&format!(
                "Validated in {} attempt(s) on {} input(s); added {}.\n\n",
                tool.validation_attempts,
                tool.test_outcomes.len(),
                tool.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str("```python\n");
            out.push_str(tool.source.trim_end());
            out.push_str("\n```\n");
        }
    }
    out
}

/// Regenerate the documentation file from scratch.
pub fn export(tools: &[ToolRecord], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_markdown(tools))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::record;

    #[test]
    fn groups_by_sorted_category_keeping_tool_order() {
        let tools = vec![record("zip_text", "text"), record("mean", "math"), record("upper", "text")];
        let md = render_markdown(&tools);
        assert!(md.starts_with("# Toolforge Tools Documentation\n\nTotal tools: 3\n"));
        let math = md.find("## math").unwrap();
        let text = md.find("## text").unwrap();
        assert!(math < text);
        assert!(md.find("### zip_text").unwrap() < md.find("### upper").unwrap());
        assert!(md.contains("`mean(text: str) -> str`"));
        assert!(md.contains("```python\ndef mean(text: str) -> str:\n    return text\n```"));
    }

    #[test]
    fn export_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/tools.md");
        export(&[record("a", "x")], &path).unwrap();
        export(&[], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Total tools: 0"));
        assert!(!content.contains("### a"));
    }
}
