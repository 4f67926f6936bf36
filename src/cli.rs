use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dirview")]
#[command(about = "A directory view engine with history, live change tracking and search")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to an engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a folder once and exit
    List {
        /// Folder to list; empty for Home
        #[arg(default_value = "")]
        path: String,
        /// Print the published state as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a folder and print changes as they are reconciled
    Watch {
        /// Folder to watch
        path: String,
        /// Stop after this many seconds (runs until interrupted when omitted)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Search for files by name
    Search {
        /// Text to search for
        text: String,
        /// Folder to search in (defaults to $HOME)
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Run a navigation script and report assertion results
    Script {
        /// Path to the script file
        script: String,
        /// Value substituted for {root} in the script
        #[arg(short, long)]
        root: Option<String>,
        /// Maximum time to wait for the engine to settle (seconds)
        #[arg(long, default_value = "5")]
        settle_timeout: u64,
    },
}
