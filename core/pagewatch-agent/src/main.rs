//! pagewatch-agent: native watch host for an observed browser page.
//!
//! The in-page shim pipes raw page signals (submits, clicks, keypresses,
//! class-list snapshots, focus changes) into this process as JSON lines on
//! stdin and applies the UI commands it prints on stdout. Detection,
//! scheduling, sound, and daemon messaging all happen here.
//!
//! ## Subcommands
//!
//! - `watch`: main loop, reads page events from stdin
//! - `probe`: daemon reachability / permission diagnostic

mod audio;
mod daemon_client;
mod logging;
mod reply_socket;
mod watch;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pagewatch-agent")]
#[command(about = "pagewatch response watcher")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a page for response completion (reads page events from stdin)
    Watch {
        /// Tab identifier assigned by the in-page shim
        #[arg(long)]
        tab_id: u64,

        /// URL of the observed page, forwarded with notifications
        #[arg(long)]
        url: String,
    },

    /// Check daemon reachability and the notification permission probe
    Probe,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { tab_id, url } => {
            if let Err(e) = watch::run(tab_id, &url) {
                tracing::error!(error = %e, "pagewatch-agent watch failed");
                std::process::exit(1);
            }
        }
        Commands::Probe => {
            let health = daemon_client::daemon_health();
            let permission = daemon_client::check_permission();
            println!(
                "daemon: {}",
                match health {
                    Some(true) => "ok",
                    Some(false) => "unhealthy",
                    None => "unreachable",
                }
            );
            println!(
                "notification permission: {}",
                permission.as_deref().unwrap_or("unknown")
            );
        }
    }
}
