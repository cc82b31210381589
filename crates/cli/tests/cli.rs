// ABOUTME: Integration tests for the letterbox CLI binary.
// ABOUTME: Runs ingest, render, stats, and cleanup against a temporary base directory.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn letterbox_cmd(base: &Path) -> Command {
    let mut cmd = Command::cargo_bin("letterbox").unwrap();
    cmd.env_remove("INSTAPAPER_USER")
        .env_remove("INSTAPAPER_PASS")
        .env_remove("LETTERBOX_MAX_ARTICLES")
        .arg("--base-dir")
        .arg(base)
        .arg("--public-url")
        .arg("http://read.example");
    cmd
}

fn ingest_text(base: &Path, body: &str, subject: &str) -> serde_json::Value {
    let text_path = base.join(format!("{}.txt", subject));
    fs::write(&text_path, body).unwrap();
    let output = letterbox_cmd(base)
        .arg("ingest")
        .arg("--text")
        .arg(&text_path)
        .arg("--subject")
        .arg(subject)
        .arg("--date")
        .arg("Tue, 2 Jan 2024 19:15:00 +0000")
        .arg("--no-publish")
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn ingest_prints_article_json() {
    let dir = TempDir::new().unwrap();
    let article = ingest_text(dir.path(), "hello reader", "first");

    assert_eq!(article["mapping"]["og_title"], "first");
    assert_eq!(article["mapping"]["mail_date"], "2 ocak 2024 Salı Saat 22.15");
    assert_eq!(article["published"], serde_json::Value::Null);
    let id = article["article_id"].as_str().unwrap();
    assert!(dir.path().join("articles").join(format!("{}.html", id)).exists());
    assert!(dir.path().join("data").join(format!("{}.json", id)).exists());
}

#[test]
fn render_serves_stored_article() {
    let dir = TempDir::new().unwrap();
    let article = ingest_text(dir.path(), "served body", "render-me");
    let filename = format!("{}.html", article["article_id"].as_str().unwrap());

    letterbox_cmd(dir.path())
        .arg("render")
        .arg(&filename)
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>served body</p>"))
        .stdout(predicate::str::contains(format!(
            "http://read.example/read/{}",
            filename
        )));
}

#[test]
fn render_rejects_bad_names() {
    let dir = TempDir::new().unwrap();
    letterbox_cmd(dir.path())
        .arg("render")
        .arg("../secret.html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn cleanup_and_stats() {
    let dir = TempDir::new().unwrap();
    for subject in ["one", "two", "three"] {
        ingest_text(dir.path(), subject, subject);
    }

    letterbox_cmd(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("articles: 3"));

    letterbox_cmd(dir.path())
        .arg("cleanup")
        .arg("--max")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 2 article(s)"));

    let output = letterbox_cmd(dir.path())
        .arg("stats")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_articles"], 1);
    assert_eq!(stats["data"]["count"], 1);
}

#[test]
fn ingest_requires_a_body() {
    let dir = TempDir::new().unwrap();
    letterbox_cmd(dir.path())
        .arg("ingest")
        .arg("--subject")
        .arg("empty")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--html or --text"));
}
