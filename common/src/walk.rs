//! Flattened enumeration of a remote directory tree.
//!
//! Entries come out in pre-order: a directory always precedes everything below it, and
//! siblings keep the order the service listed them in. Consumers can therefore create
//! directories and write files in a single pass.

use tracing::instrument;

use crate::error::{self, ErrorKind};
use crate::metadata::{self, EntryKind, RemoteEntry};
use crate::session::RemoteSession;

/// Enumeration failure that preserves the entries collected before it.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct Error {
    #[source]
    pub source: error::Error,
    pub entries: Vec<RemoteEntry>,
}

impl Error {
    #[must_use]
    pub fn new(source: error::Error, entries: Vec<RemoteEntry>) -> Self {
        Error { source, entries }
    }
}

/// Join a child name onto a remote directory path.
///
/// The root (empty path) and paths that already end in `/` are not given another separator.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// List `path`, descending into subdirectories when `recursive` is set.
///
/// A listing of `path` itself that fails with a read error means it is not a directory; the
/// result is the single entry describing `path` itself.
#[instrument(skip(session))]
pub fn enumerate<S: RemoteSession + ?Sized>(
    session: &mut S,
    path: &str,
    recursive: bool,
) -> Result<Vec<RemoteEntry>, Error> {
    let mut entries = vec![];
    match enumerate_into(session, path, recursive, true, &mut entries) {
        Ok(()) => Ok(entries),
        Err(error) => Err(Error::new(error, entries)),
    }
}

fn enumerate_into<S: RemoteSession + ?Sized>(
    session: &mut S,
    path: &str,
    recursive: bool,
    top_level: bool,
    entries: &mut Vec<RemoteEntry>,
) -> error::Result<()> {
    tracing::debug!("reading directory contents at {:?}", path);
    let names = match session.list_directory(path) {
        Ok(names) => names,
        Err(error) if top_level && error.kind == ErrorKind::ReadError => {
            tracing::debug!(
                "directory read error -- falling back to file info at {:?}",
                path
            );
            entries.push(metadata::fetch(session, path)?);
            return Ok(());
        }
        Err(error) => {
            return Err(error.context(format!("failed listing {path:?}")));
        }
    };
    for name in names {
        if name == "." || name == ".." {
            continue;
        }
        let child = join_path(path, &name);
        let entry = match metadata::fetch(session, &child) {
            Ok(entry) => entry,
            Err(error) if error.kind == ErrorKind::Unsupported => {
                tracing::debug!("skipping {:?}: {:#}", child, &error);
                continue;
            }
            Err(error) => return Err(error),
        };
        match entry.kind {
            EntryKind::Directory if recursive => {
                tracing::trace!("{:?} is a directory, descending", child);
                entries.push(entry);
                enumerate_into(session, &child, true, false, entries)?;
            }
            EntryKind::Directory | EntryKind::File | EntryKind::SymbolicLink => {
                entries.push(entry);
            }
        }
    }
    Ok(())
}
