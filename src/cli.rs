use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "occurrence-sweep")]
#[command(about = "Cleans repeated occurrence reports and orphaned photos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sweep now and then on the configured interval until stopped
    Serve(ServeArgs),
    /// Run a single sweep now
    Sweep,
    /// List repeated occurrences without deleting anything
    Scan,
    /// List orphaned photos without deleting anything
    Orphans,
    /// Show occurrences as the app would see them
    History(HistoryArgs),
    /// Mark an occurrence resolved using an authority's confirmation key
    Confirm(ConfirmArgs),
    /// Apply pending database migrations
    Migrate,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Stop after this many sweep attempts instead of waiting for a signal
    #[arg(long)]
    pub max_sweeps: Option<usize>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Device uuid whose live occurrences to list
    #[arg(long, conflicts_with = "occurrence")]
    pub device: Option<String>,
    /// Row id of a single occurrence
    #[arg(long)]
    pub occurrence: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    /// `freguesia` or `municipio`
    pub authority: String,
    pub row_id: String,
    pub key: String,
}
