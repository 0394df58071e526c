use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rl",
    about = "Record Ledger: schema-validated records with full history",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Settings file (default: rl.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger write-ahead log, overriding the settings file
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Caller recorded as creator/updatedBy (default: $RL_CALLER)
    #[arg(long, global = true)]
    pub caller: Option<String>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create one record
    Create(CreateArgs),
    /// Create every record of a JSON array
    CreateBulk(CreateArgs),
    /// Update the mutable fields of a record
    UpdateStatus(UpdateArgs),
    /// Apply a JSON array of status updates
    UpdateStatusBulk(CreateArgs),
    /// Show one record by id
    Get(GetArgs),
    /// List records matching a selector
    Query(QueryArgs),
    /// Page through records matching a selector
    Page(PageArgs),
    /// Show every version of a record
    History(GetArgs),
    /// List record kinds, or show one kind's rules
    Kinds(KindsArgs),
    /// Run a raw action with positional arguments
    Invoke(InvokeArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

/// JSON arguments may be given inline or as `@path`.
#[derive(Args)]
pub struct CreateArgs {
    pub kind: String,
    pub json: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub kind: String,
    pub json: String,
    /// Target id (default: the id inside the JSON)
    #[arg(long, conflicts_with = "lookup")]
    pub id: Option<String>,
    /// Address the record by FIELD=VALUE instead of id
    #[arg(long, num_args = 2, value_names = ["FIELD", "VALUE"])]
    pub lookup: Option<Vec<String>>,
}

#[derive(Args)]
pub struct GetArgs {
    pub kind: String,
    pub id: String,
}

#[derive(Args)]
pub struct QueryArgs {
    pub kind: String,
    #[arg(default_value = "{}")]
    pub selector: String,
}

#[derive(Args)]
pub struct PageArgs {
    pub kind: String,
    #[arg(default_value = "{}")]
    pub selector: String,
    /// 0 selects the configured default
    #[arg(short = 'n', long, default_value = "0")]
    pub page_size: u32,
    #[arg(long, default_value = "")]
    pub bookmark: String,
    /// Follow bookmarks until the last page
    #[arg(long, conflicts_with = "bookmark")]
    pub all: bool,
}

#[derive(Args)]
pub struct KindsArgs {
    pub kind: Option<String>,
}

#[derive(Args)]
pub struct InvokeArgs {
    pub kind: String,
    pub action: String,
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Overrides `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Keep the ledger in memory, ignoring any configured path
    #[arg(long)]
    pub in_memory: bool,
}
