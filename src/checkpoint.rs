//! Checkpoint persistence for a [`Session`](crate::session::Session).
//!
//! Two on-disk formats are supported, matching the two the original puzzle
//! programs used: a flat text format (one decimal field per line) and a
//! relational format (a single-file SQLite database with one `checkpoint`
//! table). Both are written atomically: data is written to a sibling path,
//! fsynced, closed, then renamed over the destination.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use rug::Integer;

use crate::session::Session;

/// Outcome of attempting to resume a session from a savefile.
pub enum Loaded {
    /// No savefile was present; start from scratch.
    None,
    /// A savefile was present, parsed, and passed its consistency check.
    Resumed(Session),
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = sibling_tmp_path(path);
    {
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to fsync {}", tmp.display()))?;
    }
    rename_over(&tmp, path)
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".new");
    path.with_file_name(name)
}

/// Rename `from` over `to`, falling back to remove-then-rename on
/// platforms (Windows) where `rename` refuses to overwrite an existing
/// file.
fn rename_over(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if to.exists() => {
            fs::remove_file(to)
                .with_context(|| format!("failed to remove stale {}", to.display()))?;
            fs::rename(from, to)
                .with_context(|| format!("failed to rename {} to {}", from.display(), to.display()))
        }
        Err(err) => Err(err).with_context(|| {
            format!("failed to rename {} to {}", from.display(), to.display())
        }),
    }
}

/// Flat-text checkpoint store: one decimal ASCII field per line, in the
/// order `t, i, c, n, w[, n_validations]`. The trailing `n_validations`
/// field is optional for backward compatibility with savefiles that
/// predate it.
pub mod text {
    use super::*;

    pub fn load(path: &Path) -> Result<Loaded> {
        if !path.exists() {
            return Ok(Loaded::None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let session = parse(&contents)?;
        if !session.check() {
            bail!("checkpoint at {} failed consistency check", path.display());
        }
        Ok(Loaded::Resumed(session))
    }

    fn parse(contents: &str) -> Result<Session> {
        let mut lines = contents.lines();
        let t: u64 = lines
            .next()
            .ok_or_else(|| anyhow!("missing t field"))?
            .trim()
            .parse()
            .context("invalid t field")?;
        let i: u64 = lines
            .next()
            .ok_or_else(|| anyhow!("missing i field"))?
            .trim()
            .parse()
            .context("invalid i field")?;
        let c_line = lines.next().ok_or_else(|| anyhow!("missing c field"))?.trim();
        // legacy disambiguation: c was originally always a small u64 prime;
        // prefer that parse, but fall back to arbitrary precision so a
        // savefile with a wider c still loads.
        let c = match c_line.parse::<u64>() {
            Ok(value) => Integer::from(value),
            Err(_) => Integer::parse(c_line)
                .map(Integer::from)
                .context("invalid c field")?,
        };
        let n_line = lines.next().ok_or_else(|| anyhow!("missing n field"))?.trim();
        let n = Integer::parse(n_line).map(Integer::from).context("invalid n field")?;
        let w_line = lines.next().ok_or_else(|| anyhow!("missing w field"))?.trim();
        let w = Integer::parse(w_line).map(Integer::from).context("invalid w field")?;
        let n_validations = lines
            .next()
            .and_then(|line| line.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let n_times_c = Integer::from(&n * &c);
        Ok(Session {
            t,
            i,
            c,
            n,
            w,
            n_times_c,
            n_validations,
        })
    }

    fn encode(session: &Session) -> String {
        let mut buf = String::new();
        buf.push_str(&session.t.to_string());
        buf.push('\n');
        buf.push_str(&session.i.to_string());
        buf.push('\n');
        buf.push_str(&session.c.to_string_radix(10));
        buf.push('\n');
        buf.push_str(&session.n.to_string_radix(10));
        buf.push('\n');
        buf.push_str(&session.w.to_string_radix(10));
        buf.push('\n');
        buf.push_str(&session.n_validations.to_string());
        buf.push('\n');
        buf
    }

    pub fn save(path: &Path, session: &Session) -> Result<()> {
        atomic_write(path, encode(session).as_bytes())
    }

    /// Write-and-verify: write the `.new` sibling, read it back into a
    /// fresh session, and only rename it over `path` once the reloaded
    /// session both consistency-checks and is found `isafter` the
    /// in-memory session. Guards against a single bit-flip corrupting the
    /// write before it becomes the savefile of record; a mismatch is
    /// fatal rather than silently discarded, since rolling back would
    /// trust a state that could itself be the corrupted one.
    pub fn save_with_verification(path: &Path, session: &Session) -> Result<()> {
        let tmp = sibling_tmp_path(path);
        {
            let mut file = File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            file.write_all(encode(session).as_bytes())
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            file.sync_all()
                .with_context(|| format!("failed to fsync {}", tmp.display()))?;
        }

        let verified = (|| -> Result<()> {
            let contents = fs::read_to_string(&tmp)
                .with_context(|| format!("failed to read back {}", tmp.display()))?;
            let reloaded = parse(&contents)?;
            if !reloaded.check() {
                bail!("reloaded checkpoint at {} failed consistency check", tmp.display());
            }
            if !session.isafter(&reloaded) {
                bail!(
                    "reloaded checkpoint at {} is not isafter the in-memory session",
                    tmp.display()
                );
            }
            Ok(())
        })();

        if let Err(err) = verified {
            fs::remove_file(&tmp).ok();
            return Err(err).context("write-and-verify failed; leaving previous savefile in place");
        }

        rename_over(&tmp, path)
    }
}

/// Relational checkpoint store: a single-file SQLite database with one
/// `checkpoint(i INTEGER UNIQUE, w TEXT, first_computed TIMESTAMP,
/// last_computed TIMESTAMP)` table. Writes use `INSERT OR IGNORE` so
/// re-validating an already-known `(i, w)` pair is idempotent.
pub mod sqlite {
    use super::*;
    use rusqlite::Connection;

    pub fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoint (
                i INTEGER UNIQUE,
                w TEXT,
                first_computed TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                last_computed TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(conn)
    }

    /// Load the session described by the greatest `i` in the table, if
    /// any, starting from fresh puzzle parameters.
    pub fn load(path: &Path) -> Result<Loaded> {
        if !path.exists() {
            return Ok(Loaded::None);
        }
        let conn = open(path)?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT i, w FROM checkpoint ORDER BY i DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        let Some((i, w)) = row else {
            return Ok(Loaded::None);
        };
        let mut session = Session::new();
        session.i = i as u64;
        session.w = Integer::parse(&w).map(Integer::from).context("invalid w in checkpoint row")?;
        if !session.check() {
            bail!("checkpoint at {} failed consistency check", path.display());
        }
        Ok(Loaded::Resumed(session))
    }

    /// Insert a new checkpoint row for `(session.i, session.w)`, ignoring
    /// the insert if that `i` is already present.
    pub fn append(conn: &Connection, session: &Session) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO checkpoint (i, w) VALUES (?1, ?2)",
            rusqlite::params![session.i as i64, session.w.to_string_radix(10)],
        )?;
        Ok(())
    }

    /// Update the `last_computed` timestamp for an existing row (used by
    /// the validator when it re-derives a checkpoint already on record).
    pub fn touch(conn: &Connection, i: u64) -> Result<()> {
        conn.execute(
            "UPDATE checkpoint SET last_computed = CURRENT_TIMESTAMP WHERE i = ?1",
            rusqlite::params![i as i64],
        )?;
        Ok(())
    }

    /// Fetch all `(i, w)` rows in increasing order of `i`, for the
    /// validator's cursor.
    pub fn all_checkpoints(conn: &Connection) -> Result<Vec<(u64, Integer)>> {
        let mut stmt = conn.prepare("SELECT i, w FROM checkpoint ORDER BY i")?;
        let rows = stmt.query_map([], |row| {
            let i: i64 = row.get(0)?;
            let w: String = row.get(1)?;
            Ok((i, w))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (i, w) = row?;
            let w = Integer::parse(&w)
                .map(Integer::from)
                .map_err(|e| anyhow!("invalid w at i={i}: {e}"))?;
            out.push((i as u64, w));
        }
        Ok(out)
    }
}

/// At runner startup, recover from a crash that left a `.new` file
/// half-written alongside (or instead of) the real savefile: if `.new`
/// exists and parses and checks out, and is at least as advanced as
/// `path`, promote it.
pub fn recover_dangling_new(path: &Path) -> Result<()> {
    let tmp = sibling_tmp_path(path);
    if !tmp.exists() {
        return Ok(());
    }
    match text::load(&tmp) {
        Ok(Loaded::Resumed(candidate)) => {
            let promote = match text::load(path) {
                Ok(Loaded::Resumed(current)) => current.i <= candidate.i,
                _ => true,
            };
            if promote {
                rename_over(&tmp, path)?;
            } else {
                fs::remove_file(&tmp).ok();
            }
        }
        _ => {
            // Unparsable leftover: the crash happened mid-write. Discard
            // it rather than let it shadow a good savefile forever.
            fs::remove_file(&tmp).ok();
        }
    }
    Ok(())
}
