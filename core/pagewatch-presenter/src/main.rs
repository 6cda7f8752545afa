//! pagewatch-presenter: the two notification surfaces.
//!
//! - `alert`: the auto-popped notification window. Spawned by the daemon,
//!   which also owns its lifetime (auto-close after a fixed delay).
//! - `popup`: the on-demand toolbar popup, with a formatted timestamp line.
//!
//! Both read the persisted notification record and offer View (focus the
//! source tab via the daemon) and Dismiss (just exit).

mod client;
mod render;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagewatch-presenter")]
#[command(about = "pagewatch notification surfaces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Auto-popped alert window (spawned by the daemon)
    Alert {
        /// Window width hint from the daemon
        #[arg(long, default_value_t = 360)]
        width: u32,

        /// Window height hint from the daemon
        #[arg(long, default_value_t = 180)]
        height: u32,
    },

    /// On-demand toolbar popup
    Popup,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Alert { .. } => render::run_alert(),
        Commands::Popup => render::run_popup(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
