//! Workspace identity document (`CLAUDE.md`) and its `AGENTS.md` companion link.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::io::atomic::write_atomic;
use crate::io::workspace::WorkspacePaths;

const IDENTITY_TEMPLATE: &str = include_str!("templates/identity.md");
const LINK_TARGET: &str = "CLAUDE.md";

/// Render the identity document for a fleet CLI named `fleet`.
pub fn render_identity_doc(fleet: &str) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("identity", IDENTITY_TEMPLATE)
        .context("load identity template")?;
    let rendered = env
        .get_template("identity")?
        .render(context! { fleet => fleet })
        .context("render identity template")?;
    Ok(rendered)
}

/// State of the identity document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Missing,
    Stale,
    Current,
}

pub fn identity_state(paths: &WorkspacePaths, expected: &str) -> Result<IdentityState> {
    let path = &paths.identity_doc_path;
    match fs::read_to_string(path) {
        Ok(current) if current == expected => Ok(IdentityState::Current),
        Ok(_) => Ok(IdentityState::Stale),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(IdentityState::Missing),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

pub fn write_identity_doc(paths: &WorkspacePaths, expected: &str) -> Result<()> {
    write_atomic(&paths.identity_doc_path, expected)
}

/// True if anything (including a dangling link) occupies the companion path.
pub fn link_present(paths: &WorkspacePaths) -> bool {
    fs::symlink_metadata(&paths.identity_link_path).is_ok()
}

/// Create `AGENTS.md -> CLAUDE.md` when absent. Returns `true` if created.
pub fn ensure_identity_link(paths: &WorkspacePaths) -> Result<bool> {
    if link_present(paths) {
        return Ok(false);
    }
    symlink(Path::new(LINK_TARGET), &paths.identity_link_path)
        .with_context(|| format!("symlink {}", paths.identity_link_path.display()))?;
    debug!(path = %paths.identity_link_path.display(), "created identity link");
    Ok(true)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fleet_name_and_trailing_newline() {
        let doc = render_identity_doc("gt").expect("render");
        assert!(doc.starts_with("# Gas Town\n"));
        assert!(doc.contains("determined by `gt prime`"));
        assert!(doc.ends_with("`gt prime`.\n"));
    }

    #[test]
    fn state_tracks_document_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());
        let expected = render_identity_doc("gt").expect("render");

        assert_eq!(
            identity_state(&paths, &expected).expect("state"),
            IdentityState::Missing
        );
        fs::write(&paths.identity_doc_path, "old").expect("write");
        assert_eq!(
            identity_state(&paths, &expected).expect("state"),
            IdentityState::Stale
        );
        write_identity_doc(&paths, &expected).expect("write");
        assert_eq!(
            identity_state(&paths, &expected).expect("state"),
            IdentityState::Current
        );
    }

    #[cfg(unix)]
    #[test]
    fn link_is_created_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WorkspacePaths::new(temp.path());
        assert!(ensure_identity_link(&paths).expect("create"));
        assert!(!ensure_identity_link(&paths).expect("again"));
        assert_eq!(
            fs::read_link(&paths.identity_link_path).expect("read link"),
            Path::new("CLAUDE.md")
        );
    }
}
