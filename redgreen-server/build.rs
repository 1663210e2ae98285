//! Build identification for the startup log line
//!
//! Exports `GIT_HASH` (suffixed `-dirty` for uncommitted changes),
//! `BUILD_TIMESTAMP` and `BUILD_PROFILE`.

use chrono::{SecondsFormat, Utc};
use std::env;
use std::process::Command;

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|out| out.trim().to_string())
}

fn revision() -> String {
    let Some(hash) = git(&["rev-parse", "--short=8", "HEAD"]) else {
        return "unknown".to_string();
    };
    match git(&["status", "--porcelain", "--untracked-files=no"]) {
        Some(changes) if !changes.is_empty() => format!("{}-dirty", hash),
        _ => hash,
    }
}

fn main() {
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", revision());
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    // Workspace-level git metadata
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-changed=src");
}
