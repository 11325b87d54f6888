mod cmd_blocks;
mod cmd_checkpoint;
mod cmd_edit;
mod cmd_export;
mod cmd_list;
mod cmd_new;
mod cmd_send;
mod cmd_show;
mod output;
mod remote;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use draftwise_http::config::{DEFAULT_API_URL, ENV_API_URL, ENV_TOKEN};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "draft")]
#[command(about = "Co-author markdown documents with an AI assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL
    #[arg(long, global = true, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token for the backend
    #[arg(long, global = true, env = ENV_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// More logging on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List documents
    List,
    /// Create a document from a brief
    New(cmd_new::NewArgs),
    /// Show a document and its conversation
    Show {
        /// Document id
        id: u64,
    },
    /// Send a chat turn
    Send {
        /// Document id
        id: u64,

        /// What to ask for
        message: String,

        /// Block to attach as context (repeatable, e.g. block-2)
        #[arg(long = "context", value_name = "BLOCK")]
        context: Vec<String>,
    },
    /// Replace the document text by hand
    Edit {
        /// Document id
        id: u64,

        /// File with the new text (use - for stdin)
        #[arg(short, long)]
        input: String,
    },
    /// Create, view, restore, or delete checkpoints
    Checkpoint {
        #[command(subcommand)]
        op: cmd_checkpoint::CheckpointOp,
    },
    /// List the context blocks of a document
    Blocks {
        /// Document id
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<u64>,

        /// Read a local markdown file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Export a document
    Export {
        /// Document id
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<u64>,

        /// Read a local markdown file instead
        #[arg(long)]
        file: Option<PathBuf>,

        /// md, html or json
        #[arg(long, default_value = "md")]
        format: String,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let opts = output::Options {
        json: cli.json,
        pretty: cli.pretty,
    };
    let remote = remote::Remote::new(&cli.api_url, cli.token.as_deref());
    let mut stdout = std::io::stdout().lock();

    let result = match cli.command {
        Commands::List => cmd_list::run(&remote.connect()?, opts, &mut stdout).await,
        Commands::New(args) => cmd_new::run(&remote.connect()?, args, opts, &mut stdout).await,
        Commands::Show { id } => cmd_show::run(&remote.connect()?, id, opts, &mut stdout).await,
        Commands::Send {
            id,
            message,
            context,
        } => cmd_send::run(&remote.connect()?, id, message, context, opts, &mut stdout).await,
        Commands::Edit { id, input } => {
            let text = cmd_edit::read_input(&input)?;
            cmd_edit::run(&remote.connect()?, id, text, opts, &mut stdout).await
        }
        Commands::Checkpoint { op } => {
            let mut stdin = std::io::stdin().lock();
            cmd_checkpoint::run(&remote.connect()?, op, opts, &mut stdin, &mut stdout).await
        }
        Commands::Blocks { id, file } => match (id, file) {
            (_, Some(file)) => cmd_blocks::run_file(&file, opts, &mut stdout),
            (Some(id), None) => cmd_blocks::run(&remote.connect()?, id, opts, &mut stdout).await,
            (None, None) => bail!("either a document id or --file is required"),
        },
        Commands::Export {
            id,
            file,
            format,
            output,
        } => {
            let format = format.parse().map_err(anyhow::Error::msg)?;
            let source = match (id, file) {
                (_, Some(file)) => cmd_export::Source::File(file),
                (Some(id), None) => cmd_export::Source::Remote(remote.connect()?, id),
                (None, None) => bail!("either a document id or --file is required"),
            };
            cmd_export::run(source, format, output, &mut stdout).await
        }
    };
    stdout.flush()?;
    result
}
