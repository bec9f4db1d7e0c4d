//! CLI-level integration tests driving the compiled binaries directly.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use rug::Integer;
use tempfile::tempdir;

fn tiny_savefile(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("savefile");
    // t=1000, c=127, n=521: small enough to finish in milliseconds, large
    // enough to exercise more than one batch boundary.
    let contents = format!("1000\n0\n127\n521\n2\n0\n");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn runner_completes_a_small_puzzle_and_prints_w() {
    let dir = tempdir().unwrap();
    let path = tiny_savefile(dir.path());

    Command::cargo_bin("lcs35")
        .unwrap()
        .arg("--batch-size")
        .arg("37")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("w = "));

    let saved = fs::read_to_string(&path).unwrap();
    let mut lines = saved.lines();
    let t: u64 = lines.next().unwrap().parse().unwrap();
    let i: u64 = lines.next().unwrap().parse().unwrap();
    assert_eq!(t, 1000);
    assert_eq!(i, 1000);
}

#[test]
fn runner_resumes_from_an_existing_savefile() {
    let dir = tempdir().unwrap();
    let path = tiny_savefile(dir.path());

    Command::cargo_bin("lcs35")
        .unwrap()
        .arg("--batch-size")
        .arg("200")
        .arg(&path)
        .assert()
        .success();

    let saved = fs::read_to_string(&path).unwrap();
    let i: u64 = saved.lines().nth(1).unwrap().parse().unwrap();
    assert!(i > 0);
}

#[test]
fn runner_rejects_a_tampered_savefile() {
    let dir = tempdir().unwrap();
    let path = tiny_savefile(dir.path());
    let mut contents = fs::read_to_string(&path).unwrap();
    contents = contents.replacen("\n2\n0\n", "\n3\n0\n", 1);
    fs::write(&path, contents).unwrap();

    Command::cargo_bin("lcs35")
        .unwrap()
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn validator_accepts_two_consistent_checkpoints() {
    let dir = tempdir().unwrap();
    let path1 = dir.path().join("step1");
    let path2 = dir.path().join("step2");

    let w_at_500 = Integer::from(2u32)
        .pow_mod(&(Integer::from(1u32) << 500u32), &Integer::from(521u32 * 127u32))
        .unwrap();
    let w_at_1000 = Integer::from(2u32)
        .pow_mod(&(Integer::from(1u32) << 1000u32), &Integer::from(521u32 * 127u32))
        .unwrap();

    fs::write(
        &path1,
        format!("1000\n500\n127\n521\n{}\n0\n", w_at_500.to_string_radix(10)),
    )
    .unwrap();
    fs::write(
        &path2,
        format!("1000\n1000\n127\n521\n{}\n0\n", w_at_1000.to_string_radix(10)),
    )
    .unwrap();

    Command::cargo_bin("lcs35-validate")
        .unwrap()
        .arg(&path1)
        .arg(&path2)
        .assert()
        .success()
        .stdout(predicate::str::contains("All checkpoints verified"));

    for path in [&path1, &path2] {
        let saved = fs::read_to_string(path).unwrap();
        let n_validations: u64 = saved.lines().nth(5).unwrap().parse().unwrap();
        assert_eq!(n_validations, 1);
    }
}

#[test]
fn validator_rejects_tampered_checkpoint() {
    let dir = tempdir().unwrap();
    let path1 = dir.path().join("step1");
    let path2 = dir.path().join("step2");

    let w_at_500 = Integer::from(2u32)
        .pow_mod(&(Integer::from(1u32) << 500u32), &Integer::from(521u32 * 127u32))
        .unwrap();

    fs::write(
        &path1,
        format!("1000\n500\n127\n521\n{}\n0\n", w_at_500.to_string_radix(10)),
    )
    .unwrap();
    fs::write(&path2, "1000\n1000\n127\n521\n999999999999\n0\n").unwrap();

    Command::cargo_bin("lcs35-validate")
        .unwrap()
        .arg(&path1)
        .arg(&path2)
        .assert()
        .failure();
}
