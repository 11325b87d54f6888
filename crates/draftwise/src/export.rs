//! Render a document for download.

use crate::types::DocumentMetadata;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// The markdown source, unchanged.
pub fn to_markdown(text: &str) -> String {
    text.to_string()
}

/// A standalone page with the escaped source in a `<pre>` block.
pub fn to_html(title: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\"/>\n  <title>{}</title>\n</head>\n<body>\n  <pre>{}</pre>\n</body>\n</html>\n",
        escape_html(title),
        escape_html(text)
    )
}

#[derive(Serialize)]
struct JsonExport<'a> {
    metadata: &'a DocumentMetadata,
    content: &'a str,
}

/// `{ "metadata": ..., "content": ... }`, pretty-printed.
pub fn to_json(metadata: &DocumentMetadata, text: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonExport {
        metadata,
        content: text,
    })
}

pub fn render(
    format: ExportFormat,
    metadata: &DocumentMetadata,
    text: &str,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Markdown => Ok(to_markdown(text)),
        ExportFormat::Html => Ok(to_html(&metadata.title, text)),
        ExportFormat::Json => to_json(metadata, text),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escapes_source() {
        let html = to_html("Cats & Dogs", "# <Cats> \"rule\" 'ok'");
        assert!(html.contains("<title>Cats &amp; Dogs</title>"));
        assert!(html.contains("<pre># &lt;Cats&gt; &quot;rule&quot; &#039;ok&#039;</pre>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_markdown_is_verbatim() {
        assert_eq!(to_markdown("# Title\n\nBody"), "# Title\n\nBody");
    }

    #[test]
    fn test_json_export() {
        let meta = DocumentMetadata {
            title: "Cats".into(),
            ..Default::default()
        };
        let json = to_json(&meta, "body").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["content"], "body");
        assert_eq!(value["metadata"]["title"], "Cats");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Json.extension(), "json");
    }
}
