//! Command-line argument definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "buildsyncctl",
    about = "Control a running buildsync daemon",
    version
)]
pub struct Args {
    /// Daemon base URL
    #[arg(long, env = "BUILDSYNC_URL", default_value = "http://127.0.0.1:8787")]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scheduler and progress status
    Status,
    /// Start the scan scheduler
    Start,
    /// Stop the scan scheduler
    Stop,
    /// Pause the in-flight copy
    Pause,
    /// Resume a paused copy
    Resume,
    /// Trigger one scan cycle now
    Scan,
    /// Cancel the in-flight scan cycle
    Cancel,
    /// Print the current configuration
    Config,
    /// Change the scheduler interval
    SetInterval {
        /// New interval in minutes (minimum 5)
        minutes: u64,
    },
    /// Deploy a local path to one or all servers
    Deploy {
        /// "all" or one server id
        #[arg(long, default_value = "all")]
        server: String,
        #[arg(long)]
        local_path: String,
        #[arg(long)]
        remote_path: String,
    },
    /// Test SSH connectivity to one server
    Test {
        /// Server id from the configuration
        server_id: String,
    },
    /// Test SSH connectivity to every enabled server
    TestAll,
    /// Print journal entries, newest first
    Journal {
        /// Maximum number of entries to print
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Clear the journal
    ClearJournal,
    /// Print the audit history
    History,
    /// Clear the audit history
    ClearHistory,
}
