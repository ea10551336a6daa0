//! Single-entry remote operations: create directory, remove, rename and link.

use tracing::instrument;

use crate::error::Result;
use crate::progress::Reporter;
use crate::session::{LinkKind, RemoteSession};

#[instrument(skip(session, reporter))]
pub fn make_directory<S: RemoteSession + ?Sized>(
    session: &mut S,
    path: &str,
    reporter: &mut Reporter,
) -> Result<()> {
    session
        .make_directory(path)
        .map_err(|err| err.context(format!("mkdir: failed creating {path:?}")))?;
    reporter.message(&format!("Created directory: {path}"));
    Ok(())
}

/// Remove one remote file, link or empty directory.
#[instrument(skip(session, reporter))]
pub fn remove<S: RemoteSession + ?Sized>(
    session: &mut S,
    path: &str,
    reporter: &mut Reporter,
) -> Result<()> {
    tracing::debug!("remove: {:?}", path);
    session
        .remove_path(path)
        .map_err(|err| err.context(format!("rm: failed removing {path:?}")))?;
    reporter.message(&format!("Removed: {path}"));
    Ok(())
}

#[instrument(skip(session, reporter))]
pub fn rename<S: RemoteSession + ?Sized>(
    session: &mut S,
    from: &str,
    to: &str,
    reporter: &mut Reporter,
) -> Result<()> {
    session
        .rename_path(from, to)
        .map_err(|err| err.context(format!("rename: failed renaming {from:?} to {to:?}")))?;
    reporter.message(&format!("Renamed {from} to {to}"));
    Ok(())
}

#[instrument(skip(session, reporter))]
pub fn link<S: RemoteSession + ?Sized>(
    session: &mut S,
    kind: LinkKind,
    target: &str,
    link_path: &str,
    reporter: &mut Reporter,
) -> Result<()> {
    let label = match kind {
        LinkKind::Hard => "hard-link",
        LinkKind::Symbolic => "symbolic-link",
    };
    session
        .make_link(kind, target, link_path)
        .map_err(|err| {
            err.context(format!(
                "link: failed creating {label} {link_path:?} -> {target:?}"
            ))
        })?;
    reporter.message(&format!("Created {label} {link_path} -> {target}"));
    Ok(())
}
