//! Clone (mirrored) and export (flattened) replication of a remote subtree to local disk.
//!
//! Both operations are fail-soft: a failed entry is logged and counted, the remaining entries
//! are still attempted, and the overall result is a failure if any entry failed. Only
//! transport failures stop the run early since no further entry could succeed.

use anyhow::anyhow;
use tracing::instrument;

use crate::config::TransferConfig;
use crate::error::{self, ErrorKind};
use crate::fsops;
use crate::metadata::{EntryKind, RemoteEntry};
use crate::progress::{Reporter, Summary};
use crate::session::RemoteSession;
use crate::transfer;
use crate::walk;

/// Error type for replication that preserves the summary of what was done before failing.
///
/// # Logging Convention
/// The Display implementation shows the full error chain:
/// ```ignore
/// tracing::error!("clone failed: {}", &error);
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

/// Local path mirroring `remote_path` under `root`.
///
/// Empty, `.` and `..` segments are dropped so a remote name can never escape `root`.
#[must_use]
pub fn local_path_for(root: &std::path::Path, remote_path: &str) -> std::path::PathBuf {
    let mut path = root.to_path_buf();
    for segment in remote_path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(segment);
    }
    path
}

enum Enumerated {
    Complete(Vec<RemoteEntry>),
    Partial(Vec<RemoteEntry>),
}

fn enumerate_for_replication<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_root: &str,
    recursive: bool,
) -> Result<Enumerated, Error> {
    match walk::enumerate(session, remote_root, recursive) {
        Ok(entries) => Ok(Enumerated::Complete(entries)),
        Err(walk::Error { source, entries }) => {
            if source.kind == ErrorKind::Transport || entries.is_empty() {
                return Err(Error::new(
                    anyhow::Error::new(source)
                        .context(format!("failed enumerating {remote_root:?}")),
                    Summary::default(),
                ));
            }
            tracing::error!(
                "enumerating {:?} failed, continuing with {} entries found so far: {:#}",
                remote_root,
                entries.len(),
                &source
            );
            Ok(Enumerated::Partial(entries))
        }
    }
}

fn create_local_dir(path: &std::path::Path) -> error::Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(path)
        .map_err(|err| error::Error::local(err, format!("cannot create directory {path:?}")))?;
    Ok(true)
}

/// Download one entry to `local_path`, then remove the remote source if cleanup is enabled.
fn replicate_file<S: RemoteSession + ?Sized>(
    session: &mut S,
    entry: &RemoteEntry,
    local_path: &std::path::Path,
    settings: &TransferConfig,
    reporter: &mut Reporter,
) -> Result<Summary, error::Error> {
    let mut summary = Summary::default();
    if let Some(parent) = local_path.parent() {
        if create_local_dir(parent)? {
            tracing::debug!("created missing parent directory {:?}", parent);
            summary.directories_created += 1;
        }
    }
    tracing::info!("{:?} -> {:?}", entry.path, local_path);
    let bytes = transfer::download(session, &entry.path, local_path, entry.size_bytes, reporter)?;
    summary.bytes_transferred += bytes;
    summary.files_transferred += 1;
    if settings.cleanup {
        // only the transferred entry itself, directories are never removed
        fsops::remove(session, &entry.path, reporter)
            .map_err(|err| err.context(format!("cleanup of {:?} failed", entry.path)))?;
        summary.files_removed += 1;
    }
    Ok(summary)
}

enum Outcome {
    Continue,
    Abort(anyhow::Error),
}

fn record_failure(
    operation: &str,
    entry: &RemoteEntry,
    error: error::Error,
    summary: &mut Summary,
) -> Outcome {
    summary.entries_failed += 1;
    if error.kind == ErrorKind::Transport {
        return Outcome::Abort(
            anyhow::Error::new(error).context(format!("{operation}: session lost at {:?}", entry.path)),
        );
    }
    tracing::error!("{}: {:?} failed with: {:#}", operation, entry.path, &error);
    Outcome::Continue
}

/// Mirror the remote tree rooted at `remote_root` into `local_root`.
///
/// Every entry lands at `local_root/<entry path>`, so the remote root's own path segments are
/// reproduced locally as well.
#[instrument(skip(session, reporter))]
pub fn clone<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_root: &str,
    local_root: &std::path::Path,
    settings: &TransferConfig,
    reporter: &mut Reporter,
) -> Result<Summary, Error> {
    let (entries, mut success) = match enumerate_for_replication(session, remote_root, true)? {
        Enumerated::Complete(entries) => (entries, true),
        Enumerated::Partial(entries) => (entries, false),
    };
    let mut summary = Summary::default();
    match create_local_dir(local_root) {
        Ok(created) => summary.directories_created += usize::from(created),
        Err(error) => return Err(Error::new(anyhow::Error::new(error), summary)),
    }
    for entry in &entries {
        let local_path = local_path_for(local_root, &entry.path);
        let result = match entry.kind {
            EntryKind::Directory => create_local_dir(&local_path).map(|created| Summary {
                directories_created: usize::from(created),
                ..Default::default()
            }),
            EntryKind::File | EntryKind::SymbolicLink => {
                replicate_file(session, entry, &local_path, settings, reporter)
            }
        };
        match result {
            Ok(entry_summary) => summary = summary + entry_summary,
            Err(error) => {
                success = false;
                if let Outcome::Abort(error) = record_failure("clone", entry, error, &mut summary) {
                    return Err(Error::new(error, summary));
                }
            }
        }
    }
    if !success {
        return Err(Error::new(
            anyhow!("clone: {:?} -> {:?} failed!", remote_root, local_root),
            summary,
        ));
    }
    Ok(summary)
}

/// Copy the non-directory children of `remote_dir` directly into `local_dir`.
#[instrument(skip(session, reporter))]
pub fn export<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_dir: &str,
    local_dir: &std::path::Path,
    settings: &TransferConfig,
    reporter: &mut Reporter,
) -> Result<Summary, Error> {
    let (entries, mut success) = match enumerate_for_replication(session, remote_dir, false)? {
        Enumerated::Complete(entries) => (entries, true),
        Enumerated::Partial(entries) => (entries, false),
    };
    let mut summary = Summary::default();
    match create_local_dir(local_dir) {
        Ok(created) => summary.directories_created += usize::from(created),
        Err(error) => return Err(Error::new(anyhow::Error::new(error), summary)),
    }
    for entry in &entries {
        if entry.is_dir() {
            tracing::debug!("export: skipping directory {:?}", entry.path);
            continue;
        }
        let local_path = local_dir.join(entry.file_name());
        match replicate_file(session, entry, &local_path, settings, reporter) {
            Ok(entry_summary) => summary = summary + entry_summary,
            Err(error) => {
                success = false;
                if let Outcome::Abort(error) = record_failure("export", entry, error, &mut summary) {
                    return Err(Error::new(error, summary));
                }
            }
        }
    }
    if !success {
        return Err(Error::new(
            anyhow!("export: {:?} -> {:?} failed!", remote_dir, local_dir),
            summary,
        ));
    }
    Ok(summary)
}
