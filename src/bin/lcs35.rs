//! Runner: resume (or start) an LCS35 session and advance it in batches
//! until `i == t`, checkpointing regularly and saving on `SIGINT`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use lcs35::checkpoint::{self, Loaded};
use lcs35::session::Session;
use lcs35::{cpuinfo, progress};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Format {
    Text,
    Sqlite,
}

#[derive(Parser)]
#[command(name = "lcs35", about = "Advance an LCS35 time-lock puzzle computation")]
struct Cli {
    /// Savefile to resume from and write to.
    #[arg(default_value = "savefile")]
    savefile: PathBuf,

    /// Checkpoint format to write (read support for both is unconditional).
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Number of squarings performed per batch before a progress update.
    #[arg(long, default_value_t = 1 << 20)]
    batch_size: u64,

    /// Suppress all output.
    #[arg(short, long)]
    quiet: bool,

    /// Increase verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum verbosity, equivalent to -vvv.
    #[arg(short = 'd', long)]
    debug: bool,
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.debug || cli.verbose >= 3 {
        tracing::Level::TRACE
    } else {
        match cli.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    let filter = tracing_subscriber::EnvFilter::new(level.to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_target(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(filter)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if !cli.quiet {
        println!("{}", cpuinfo::brand_string());
    }

    checkpoint::recover_dangling_new(&cli.savefile)
        .context("failed to recover a dangling .new savefile")?;

    let mut session = match load(&cli.savefile)? {
        Loaded::Resumed(session) => session,
        Loaded::None => Session::new(),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown);
    // Install the handler only now, after the session is fully loaded:
    // a SIGINT delivered earlier and acted on immediately would persist an
    // empty session.
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
            signal_flag.store(true, Ordering::SeqCst);
        })
    }
    .context("failed to install SIGINT handler")?;

    let start = Instant::now();
    while session.i < session.t {
        session.work(cli.batch_size);
        if !session.check() {
            anyhow::bail!("inconsistency detected at i = {:#x}", session.i);
        }
        if !cli.quiet {
            progress::show(session.i, session.t, start.elapsed().as_secs_f64());
        }
        if session.i % (1 << 25) == 0 || shutdown.load(Ordering::SeqCst) {
            save(&cli.savefile, &session, cli.format)?;
        }
        if shutdown.load(Ordering::SeqCst) {
            if !cli.quiet {
                eprintln!();
            }
            return Ok(());
        }
    }

    save(&cli.savefile, &session, cli.format)?;
    if !cli.quiet {
        progress::show_complete();
    }
    let w = session.w.clone().rem_euc(session.n.clone());
    println!("w = {}", w.to_string_radix(10));
    Ok(())
}

fn load(path: &PathBuf) -> Result<Loaded> {
    match checkpoint::sqlite::load(path) {
        Ok(Loaded::Resumed(session)) => Ok(Loaded::Resumed(session)),
        _ => checkpoint::text::load(path),
    }
}

fn save(path: &PathBuf, session: &Session, format: Format) -> Result<()> {
    match format {
        Format::Text => checkpoint::text::save_with_verification(path, session),
        Format::Sqlite => {
            let conn = checkpoint::sqlite::open(path)?;
            checkpoint::sqlite::append(&conn, session)
        }
    }
}
