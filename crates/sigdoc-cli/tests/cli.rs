//! End-to-end runs of the `sigdoc` binary against recorded fixtures.

use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sigdoc-cli-{test}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn sigdoc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sigdoc"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run sigdoc")
}

fn path_str(p: &Path) -> &str {
    p.to_str().expect("utf-8 path")
}

#[test]
fn csv_selection_downloads_named_agreement() {
    let out = scratch_dir("download");
    let csv = fixture("team.csv");
    let events = fixture("signature_events.json");
    let run = sigdoc(&[
        "--csv",
        path_str(&csv),
        "--query",
        "ch0",
        "--events",
        path_str(&events),
        "--date",
        "2026-10-18",
        "--out",
        path_str(&out),
    ]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let expected = out.join("Asset_Agreement_Jane_Smith_CH002_2026-10-18.pdf");
    assert_eq!(
        String::from_utf8_lossy(&run.stdout).trim(),
        path_str(&expected)
    );
    let bytes = std::fs::read(&expected).expect("saved agreement");
    assert!(bytes.starts_with(b"%PDF-"));
    // No temp files left next to it.
    assert_eq!(std::fs::read_dir(&out).expect("list out").count(), 1);
}

#[test]
fn several_records_without_selection_fail() {
    let out = scratch_dir("ambiguous");
    let csv = fixture("team.csv");
    let events = fixture("signature_events.json");
    let run = sigdoc(&[
        "--csv",
        path_str(&csv),
        "--events",
        path_str(&events),
        "--out",
        path_str(&out),
    ]);
    assert!(!run.status.success());
    assert!(String::from_utf8_lossy(&run.stderr).contains("3 records loaded"));
    assert_eq!(std::fs::read_dir(&out).expect("list out").count(), 0);
}

#[test]
fn manual_entry_preview_and_signature_png() {
    let out = scratch_dir("preview");
    let preview = out.join("preview.pdf");
    let png = out.join("signature.png");
    let events = fixture("signature_events.json");
    let run = sigdoc(&[
        "--name",
        "Bob Lee",
        "--asset-name",
        "Laptop",
        "--asset-id",
        "LP100",
        "--extra",
        "Dock",
        "--events",
        path_str(&events),
        "--preview",
        path_str(&preview),
        "--signature-png",
        path_str(&png),
    ]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert!(std::fs::read(&preview).expect("preview").starts_with(b"%PDF-"));
    assert!(std::fs::read(&png).expect("png").starts_with(b"\x89PNG"));
}

#[test]
fn empty_event_log_is_rejected() {
    let out = scratch_dir("empty");
    let events = out.join("events.json");
    std::fs::write(&events, "[]").expect("write events");
    let run = sigdoc(&[
        "--name",
        "Bob Lee",
        "--asset-name",
        "Laptop",
        "--asset-id",
        "LP100",
        "--events",
        path_str(&events),
        "--out",
        path_str(&out),
    ]);
    assert!(!run.status.success());
    assert!(String::from_utf8_lossy(&run.stderr).contains("signature"));
}
