//! Validator: independently re-derive every checkpoint in a savefile (or
//! set of text savefiles) and confirm it matches what was recorded.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use lcs35::validator::{self, DEFAULT_WORKERS};

#[derive(Parser)]
#[command(name = "lcs35-validate", about = "Re-verify a saved LCS35 checkpoint sequence")]
struct Cli {
    /// A single `savefile.db` (relational) or one or more text savefiles,
    /// each representing one checkpoint of the same puzzle instance.
    files: Vec<PathBuf>,

    /// Number of worker threads re-deriving segments concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_target(false).init();
    let cli = Cli::parse();

    if cli.files.is_empty() {
        bail!("usage: lcs35-validate <savefile.db | file1 file2 ...>");
    }

    println!("Working...");
    if cli.files.len() == 1
        && cli.files[0]
            .extension()
            .map(|ext| ext == "db")
            .unwrap_or(false)
    {
        let conn = lcs35::checkpoint::sqlite::open(&cli.files[0])
            .with_context(|| format!("failed to open {}", cli.files[0].display()))?;
        let checkpoints = lcs35::checkpoint::sqlite::all_checkpoints(&conn)?;
        validator::validate_all(&checkpoints, cli.workers)?;
    } else {
        let paths: Vec<&std::path::Path> = cli.files.iter().map(|p| p.as_path()).collect();
        validator::validate_text_files(&paths, cli.workers)?;
    }
    println!("All checkpoints verified.");
    Ok(())
}
