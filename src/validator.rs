//! Independent re-verification of a saved checkpoint sequence: for every
//! consecutive pair of checkpoints, redo the squaring between them from
//! scratch and check the result matches what was recorded.
//!
//! A fixed-size worker pool pulls `(i_prev, w_prev, i_next, w_next)`
//! segment tuples from a mutex-protected cursor over the sorted checkpoint
//! sequence. Workers hold the lock only long enough to copy the next
//! tuple; the actual recomputation happens lock-free, so segments are
//! processed with no ordering constraint between them.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rug::Integer;
use tracing::{error, info};

use crate::checkpoint::{self, Loaded};
use crate::session::Session;

const DEFAULT_BATCH: u64 = 1 << 20;
pub const DEFAULT_WORKERS: usize = 4;

struct Segment {
    prev_i: u64,
    prev_w: Integer,
    next_i: u64,
    next_w: Integer,
}

struct Cursor {
    segments: Vec<Segment>,
    next: usize,
}

impl Cursor {
    fn pop(&mut self) -> Option<(u64, Integer, u64, Integer)> {
        let segment = self.segments.get_mut(self.next)?;
        self.next += 1;
        Some((
            segment.prev_i,
            std::mem::replace(&mut segment.prev_w, Integer::new()),
            segment.next_i,
            std::mem::replace(&mut segment.next_w, Integer::new()),
        ))
    }
}

/// Re-derive and check every consecutive pair in `checkpoints` (which must
/// already be sorted by `i`), implicitly anchored at `(0, w=2)` before the
/// first recorded checkpoint. Returns an error naming the first segment
/// found inconsistent; callers that want "cancel the whole run" semantics
/// should treat any `Err` as fatal and exit immediately rather than retry.
pub fn validate_all(checkpoints: &[(u64, Integer)], workers: usize) -> Result<()> {
    let mut segments = Vec::with_capacity(checkpoints.len());
    let mut prev_i = 0u64;
    let mut prev_w = Integer::from(2u32);
    for (next_i, next_w) in checkpoints {
        segments.push(Segment {
            prev_i,
            prev_w: prev_w.clone(),
            next_i: *next_i,
            next_w: next_w.clone(),
        });
        prev_i = *next_i;
        prev_w = next_w.clone();
    }

    let cursor = Mutex::new(Cursor { segments, next: 0 });
    let failure: Mutex<Option<String>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            scope.spawn(|| worker(&cursor, &failure));
        }
    });

    match failure.into_inner().unwrap() {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn worker(cursor: &Mutex<Cursor>, failure: &Mutex<Option<String>>) {
    loop {
        if failure.lock().unwrap().is_some() {
            return;
        }
        let next = {
            let mut cursor = cursor.lock().unwrap();
            cursor.pop()
        };
        let Some((prev_i, prev_w, next_i, next_w)) = next else {
            return;
        };

        let mut session = Session::new();
        session.i = prev_i;
        session.w = prev_w;
        session.t = next_i;
        session.refresh_n_times_c();

        while session.i < session.t {
            let step = DEFAULT_BATCH.min(session.t - session.i);
            session.work(step);
        }

        if session.w != next_w {
            let message = format!(
                "checkpoint mismatch: {:#014x} -> {:#014x} recomputed to a different w",
                prev_i, next_i
            );
            error!("{message}");
            let mut failure = failure.lock().unwrap();
            if failure.is_none() {
                *failure = Some(message);
            }
        } else {
            info!("{:#014x} -> {:#014x}: verified", prev_i, next_i);
        }
    }
}

/// Validate a set of text savefiles, each representing one checkpoint of
/// the same puzzle instance, and record that each was independently
/// re-checked by incrementing its own `n_validations` counter in place.
pub fn validate_text_files(paths: &[&Path], workers: usize) -> Result<()> {
    let mut checkpoints = Vec::with_capacity(paths.len());
    for path in paths {
        match checkpoint::text::load(path)? {
            Loaded::Resumed(session) => checkpoints.push((session.i, session.w)),
            Loaded::None => return Err(anyhow!("{} does not exist", path.display())),
        }
    }
    checkpoints.sort_by_key(|(i, _)| *i);

    validate_all(&checkpoints, workers)?;

    for path in paths {
        if let Loaded::Resumed(mut session) = checkpoint::text::load(path)? {
            session.n_validations += 1;
            checkpoint::text::save(path, &session)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_consistent_chain() {
        let mut session = Session::new();
        let mut checkpoints = Vec::new();
        for _ in 0..3 {
            session.work(50);
            checkpoints.push((session.i, session.w.clone()));
        }
        assert!(validate_all(&checkpoints, 2).is_ok());
    }

    #[test]
    fn detects_tampered_checkpoint() {
        let mut session = Session::new();
        session.work(50);
        let mut checkpoints = vec![(session.i, session.w.clone())];
        session.work(50);
        let mut tampered_w = session.w.clone();
        tampered_w += 1u32;
        checkpoints.push((session.i, tampered_w));

        assert!(validate_all(&checkpoints, 2).is_err());
    }

    #[test]
    fn empty_sequence_is_trivially_valid() {
        assert!(validate_all(&[], 4).is_ok());
    }

    #[test]
    fn single_worker_matches_multi_worker_result() {
        let mut session = Session::new();
        let mut checkpoints = Vec::new();
        for _ in 0..5 {
            session.work(20);
            checkpoints.push((session.i, session.w.clone()));
        }
        assert!(validate_all(&checkpoints, 1).is_ok());
        assert!(validate_all(&checkpoints, 8).is_ok());
    }

    #[test]
    fn scenario_6_two_text_files_validate_and_bump_n_validations() {
        let dir = tempfile::tempdir().unwrap();
        let path1 = dir.path().join("savefile1");
        let path2 = dir.path().join("savefile2");

        let mut session = Session::new();
        session.work(40);
        checkpoint::text::save(&path1, &session).unwrap();
        session.work(40);
        checkpoint::text::save(&path2, &session).unwrap();

        validate_text_files(&[&path1, &path2], 2).unwrap();

        for path in [&path1, &path2] {
            match checkpoint::text::load(path).unwrap() {
                Loaded::Resumed(s) => assert_eq!(s.n_validations, 1),
                Loaded::None => panic!("expected a resumed session"),
            }
        }
    }
}
