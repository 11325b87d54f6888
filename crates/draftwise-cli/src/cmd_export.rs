use crate::remote;
use anyhow::{Context, Result};
use draftwise::export::{self, ExportFormat};
use draftwise::{DocumentMetadata, Session, SessionBackend};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Where the exported text comes from.
pub enum Source<B> {
    Remote(Session<B>, u64),
    /// A local markdown file; the title is taken from the file stem.
    File(PathBuf),
}

pub async fn run<B: SessionBackend>(
    source: Source<B>,
    format: ExportFormat,
    output: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<()> {
    let (metadata, text) = match source {
        Source::Remote(session, id) => {
            remote::open(&session, id).await?;
            let store = session.lock().await;
            let doc = store.document();
            (doc.metadata().clone(), doc.text().to_string())
        }
        Source::File(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let metadata = DocumentMetadata {
                title,
                ..DocumentMetadata::default()
            };
            (metadata, text)
        }
    };

    let rendered = export::render(format, &metadata, &text)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), %format, "exported");
            eprintln!("Wrote {}", path.display());
        }
        None => {
            out.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwise::MemoryBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_file_to_html() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# A <b> tag").unwrap();

        let mut out = Vec::new();
        run(Source::<MemoryBackend>::File(path), ExportFormat::Html, None, &mut out)
            .await
            .unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<title>notes</title>"));
        assert!(html.contains("# A &lt;b&gt; tag"));
    }

    #[tokio::test]
    async fn test_export_remote_json_to_file() {
        let backend = MemoryBackend::new();
        let metadata = DocumentMetadata {
            title: "Cats".into(),
            ..DocumentMetadata::default()
        };
        let id = backend.insert_session(metadata, "Cats rule.", vec![]);
        let session = Session::new(backend);
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("cats.json");

        let mut out = Vec::new();
        run(
            Source::Remote(session, id),
            ExportFormat::Json,
            Some(target.clone()),
            &mut out,
        )
        .await
        .unwrap();
        assert!(out.is_empty());
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(value["metadata"]["title"], "Cats");
        assert_eq!(value["content"], "Cats rule.");
    }

    #[tokio::test]
    async fn test_export_markdown_adds_trailing_newline() {
        let backend = MemoryBackend::new();
        let id = backend.insert_session(DocumentMetadata::default(), "body", vec![]);
        let session = Session::new(backend);

        let mut out = Vec::new();
        run(Source::Remote(session, id), ExportFormat::Markdown, None, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"body\n");
    }
}
