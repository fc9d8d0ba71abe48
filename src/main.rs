//! CLI entry point for draftsmith

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use draftsmith::content::Format;

#[derive(Parser)]
#[command(name = "draftsmith")]
#[command(version = "0.1.0")]
#[command(about = "Editor backend: content conversion, auto-save and draft history", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Act as this user (defaults to `user` in _config.yml)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert content between html, json and markdown
    Convert {
        /// Input file
        input: PathBuf,

        /// Input format (inferred from the extension by default)
        #[arg(short, long)]
        from: Option<Format>,

        /// Output format
        #[arg(short, long)]
        to: Format,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show word count and reading time
    Stats {
        input: PathBuf,

        /// Input format (inferred from the extension by default)
        #[arg(short, long)]
        format: Option<Format>,
    },

    /// Manage draft snapshots
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Draft database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Auto-save a file while it is being edited
    Watch {
        file: PathBuf,

        /// Post the drafts belong to
        #[arg(short, long)]
        post: Option<String>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
enum DraftsAction {
    /// List draft versions, newest first
    List {
        /// Post id; omit for drafts of unsaved posts
        #[arg(short, long)]
        post: Option<String>,

        /// Maximum number of server drafts
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one draft
    Show { id: String },

    /// Save a file as a new draft
    Save {
        file: PathBuf,

        #[arg(short, long)]
        post: Option<String>,

        #[arg(short, long)]
        title: Option<String>,
    },

    /// Delete a draft
    Delete { id: String },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check that the draft database is reachable
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "draftsmith=debug,info"
    } else {
        "draftsmith=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let user = cli.user.as_deref();

    match cli.command {
        Commands::Convert {
            input,
            from,
            to,
            output,
        } => {
            draftsmith::commands::convert::run(&input, from, to, output.as_deref())?;
        }

        Commands::Stats { input, format } => {
            let app = draftsmith::Draftsmith::new(&base_dir)?;
            draftsmith::commands::stats::run(&app, &input, format)?;
        }

        Commands::Drafts { action } => {
            let app = draftsmith::Draftsmith::new(&base_dir)?;
            match action {
                DraftsAction::List { post, limit } => {
                    draftsmith::commands::drafts::list(&app, user, post.as_deref(), limit).await?;
                }
                DraftsAction::Show { id } => {
                    draftsmith::commands::drafts::show(&app, user, &id).await?;
                }
                DraftsAction::Save { file, post, title } => {
                    draftsmith::commands::drafts::save(&app, user, &file, post, title).await?;
                }
                DraftsAction::Delete { id } => {
                    draftsmith::commands::drafts::delete(&app, user, &id).await?;
                }
            }
        }

        Commands::Db { action } => {
            let app = draftsmith::Draftsmith::new(&base_dir)?;
            match action {
                DbAction::Check => draftsmith::commands::db::check(&app)?,
            }
        }

        Commands::Watch { file, post } => {
            let app = draftsmith::Draftsmith::new(&base_dir)?;
            let file = if file.is_absolute() {
                file
            } else {
                base_dir.join(file)
            };
            draftsmith::commands::watch::run(&app, user, &file, post).await?;
        }

        Commands::Version => {
            println!("draftsmith version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
