//! Revision checkout through the `git` command line.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

#[derive(Debug)]
pub enum VcsError {
    Spawn(io::Error),
    Checkout { revision: String, detail: String },
}

impl fmt::Display for VcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsError::Spawn(err) => write!(f, "failed to run git: {err}"),
            VcsError::Checkout { revision, detail } => {
                write!(f, "checkout of {revision} failed: {detail}")
            }
        }
    }
}

impl std::error::Error for VcsError {}

/// Checks out `revision` in the working tree at `repo`. Collection calls
/// this once per entry of the revision sequence; the tree is left on the
/// last revision checked out.
pub fn checkout(repo: &Path, revision: &str) -> Result<(), VcsError> {
    let output = Command::new("git")
        .arg("checkout")
        .arg("--quiet")
        .arg(revision)
        .current_dir(repo)
        .output()
        .map_err(VcsError::Spawn)?;

    if !output.status.success() {
        let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if detail.is_empty() {
            detail = format!("git exited with {}", output.status);
        }
        return Err(VcsError::Checkout {
            revision: revision.to_string(),
            detail,
        });
    }
    Ok(())
}
