//! Line-oriented TCP protocol for handing out and collecting checkpoints
//! across a fleet of otherwise-unrelated runners, matching the original
//! puzzle's supervisor/worker protocol. This is informative plumbing, not
//! required by the single-machine runner or validator.
//!
//! Protocol, one command per connection:
//! - `resume:` -> reply `<hex i>:<decimal w>` for the most advanced known
//!   checkpoint (`0x0:2` if none exists yet).
//! - `save:<hex i>:<decimal w>` -> record a new checkpoint, after checking
//!   its internal consistency; no reply.

use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use rug::Integer;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::checkpoint::sqlite;
use crate::session::Session;

/// Default port the original supervisor listens on.
pub const DEFAULT_PORT: u16 = 4242;

/// Accept connections forever, handling one command per connection. Each
/// connection error is logged and the listener keeps running, matching the
/// original server's "log and continue" posture.
pub fn serve(listener: TcpListener, db_path: &Path) -> Result<()> {
    let conn = sqlite::open(db_path)?;
    info!("listening on {:?}", listener.local_addr());
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = handle_client(stream, &conn) {
                    error!("client error: {err:#}");
                }
            }
            Err(err) => error!("failed to accept connection: {err}"),
        }
    }
    Ok(())
}

fn handle_client(mut stream: TcpStream, conn: &Connection) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).context("failed to read socket")?;
    let command = std::str::from_utf8(&buffer[..n]).context("non-utf8 command")?;
    info!("command: {}", command.trim());

    if let Some(rest) = command.strip_prefix("resume:") {
        let _ = rest;
        let (i, w) = last_checkpoint(conn)?;
        let reply = format!("{:#x}:{}", i, w.to_string_radix(10));
        stream
            .write_all(reply.as_bytes())
            .context("failed to write reply")?;
    } else if let Some(rest) = command.strip_prefix("save:") {
        let (i, w) = parse_save(rest)?;
        append_checked(conn, i, &w)?;
    } else if command.starts_with("mandate:") || command.starts_with("validate:") {
        warn!("command not yet implemented: {}", command.trim());
    } else {
        bail!("unknown command: {}", command.trim());
    }
    Ok(())
}

fn last_checkpoint(conn: &Connection) -> Result<(u64, Integer)> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT i, w FROM checkpoint ORDER BY i DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .ok();
    match row {
        Some((i, w)) => {
            let w = Integer::parse(&w).map(Integer::from).context("invalid w in database")?;
            Ok((i as u64, w))
        }
        None => Ok((0, Integer::from(2u32))),
    }
}

fn parse_save(rest: &str) -> Result<(u64, Integer)> {
    let (i_str, w_str) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("save command missing ':' separator"))?;
    let i = parse_prefixed_u64(i_str)?;
    let w = Integer::parse(w_str).map(Integer::from).context("invalid w in save command")?;
    Ok((i, w))
}

fn parse_prefixed_u64(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).context("invalid hex i")
    } else {
        s.parse().context("invalid decimal i")
    }
}

/// Validate an incoming `(i, w)` pair against the puzzle's consistency
/// check before persisting it, matching the original supervisor's guard
/// against accepting garbage from a misbehaving client.
fn append_checked(conn: &Connection, i: u64, w: &Integer) -> Result<()> {
    let mut session = Session::new();
    session.i = i;
    session.w = w.clone();
    if !session.check() {
        bail!("rejected inconsistent checkpoint at i={i:#x}");
    }
    conn.execute(
        "INSERT OR IGNORE INTO checkpoint (i, w) VALUES (?1, ?2)",
        rusqlite::params![i as i64, w.to_string_radix(10)],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_prefixed_u64_accepts_hex_and_decimal() {
        assert_eq!(parse_prefixed_u64("0x2a").unwrap(), 42);
        assert_eq!(parse_prefixed_u64("42").unwrap(), 42);
    }

    #[test]
    fn parse_save_splits_i_and_w() {
        let (i, w) = parse_save("0x10:12345").unwrap();
        assert_eq!(i, 16);
        assert_eq!(w, Integer::from(12345u32));
    }

    #[test]
    fn last_checkpoint_defaults_to_fresh_state() {
        let dir = tempdir().unwrap();
        let conn = sqlite::open(&dir.path().join("db.sqlite")).unwrap();
        let (i, w) = last_checkpoint(&conn).unwrap();
        assert_eq!(i, 0);
        assert_eq!(w, Integer::from(2u32));
    }

    #[test]
    fn append_checked_rejects_inconsistent_pair() {
        let dir = tempdir().unwrap();
        let conn = sqlite::open(&dir.path().join("db.sqlite")).unwrap();
        let bogus_w = Integer::from(999_999_937u32);
        assert!(append_checked(&conn, 5, &bogus_w).is_err());
    }

    #[test]
    fn append_checked_accepts_fresh_session_pair() {
        let dir = tempdir().unwrap();
        let conn = sqlite::open(&dir.path().join("db.sqlite")).unwrap();
        assert!(append_checked(&conn, 0, &Integer::from(2u32)).is_ok());
        let (i, w) = last_checkpoint(&conn).unwrap();
        assert_eq!(i, 0);
        assert_eq!(w, Integer::from(2u32));
    }
}
