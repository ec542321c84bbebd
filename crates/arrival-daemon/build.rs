use std::process::Command;

/// Commit shown by `arrival --version`.
///
/// Source tarballs have no `.git`; packagers set `ARRIVAL_GIT_SHA` instead.
fn commit_sha() -> String {
    if let Ok(sha) = std::env::var("ARRIVAL_GIT_SHA") {
        if !sha.trim().is_empty() {
            return sha.trim().to_string();
        }
    }
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rustc-env=ARRIVAL_GIT_SHA={}", commit_sha());

    println!("cargo:rerun-if-env-changed=ARRIVAL_GIT_SHA");
    // HEAD alone does not change when a branch gains commits
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");
}
