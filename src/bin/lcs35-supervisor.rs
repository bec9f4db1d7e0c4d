//! Supervisor: serves checkpoints to, and collects them from, a fleet of
//! LCS35 runners over the line-oriented TCP protocol.

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use lcs35::supervisor::{self, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "lcs35-supervisor", about = "Serve LCS35 checkpoints to a fleet of runners")]
struct Cli {
    /// Relational savefile to read from and append to.
    savefile: PathBuf,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_target(false).init();
    let cli = Cli::parse();

    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .with_context(|| format!("failed to listen on port {}", cli.port))?;
    supervisor::serve(listener, &cli.savefile)
}
