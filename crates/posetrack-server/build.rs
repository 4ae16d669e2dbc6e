use chrono::Utc;
use std::process::Command;

fn is_short_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.chars().all(|c| c.is_ascii_hexdigit())
}

/// Short commit hash, from `POSETRACK_GIT_SHA` or `git rev-parse`
fn git_short_sha() -> Option<String> {
    if let Ok(sha) = std::env::var("POSETRACK_GIT_SHA") {
        let sha = sha.trim().to_string();
        if is_short_sha(&sha) {
            return Some(sha);
        }
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    is_short_sha(&sha).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=POSETRACK_GIT_SHA");

    // YYYY.MM.DD, with +g<sha> when the commit is known
    let date = Utc::now().format("%Y.%m.%d").to_string();
    let build_id = match git_short_sha() {
        Some(sha) => format!("{date}+g{sha}"),
        None => date,
    };

    println!("cargo:rustc-env=POSETRACK_BUILD_ID={build_id}");
}
