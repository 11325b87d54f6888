use crate::output::{self, Options};
use crate::remote;
use anyhow::Result;
use clap::Args;
use draftwise::{DocumentMetadata, Session, SessionBackend};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Document title
    #[arg(long)]
    pub title: String,

    /// What the document is about
    #[arg(long)]
    pub description: String,

    /// Desired tone (e.g. "playful")
    #[arg(long)]
    pub tone: String,

    /// Who the document is for
    #[arg(long)]
    pub audience: String,

    /// Minimum length in words
    #[arg(long)]
    pub min: u32,

    /// Maximum length in words
    #[arg(long)]
    pub max: u32,

    /// Keyword (repeatable or comma-separated)
    #[arg(long = "keyword", value_delimiter = ',')]
    pub keywords: Vec<String>,
}

impl From<NewArgs> for DocumentMetadata {
    fn from(args: NewArgs) -> Self {
        DocumentMetadata {
            title: args.title,
            description: args.description,
            desired_tone: args.tone,
            target_audience: args.audience,
            length_min: args.min,
            length_max: args.max,
            keywords: args
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct Created<'a> {
    id: u64,
    title: &'a str,
}

pub async fn run<B: SessionBackend>(
    session: &Session<B>,
    args: NewArgs,
    opts: Options,
    out: &mut impl Write,
) -> Result<()> {
    let id = remote::applied(session.create(args.into()).await?)?;
    output::report_notices(session.take_notices().await);

    let store = session.lock().await;
    let Some(id) = id.persisted() else {
        anyhow::bail!("backend did not assign an id to the new document");
    };
    let title = &store.document().metadata().title;
    if opts.json {
        return output::write_json(out, &Created { id, title }, opts.pretty);
    }
    writeln!(out, "Created document {}: {}", id, title)?;
    Ok(())
}
