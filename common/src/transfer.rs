//! Byte-stream transfers between one remote file and one local file.
//!
//! Data moves in fixed chunks. The remote handle is closed on every path; a failed download
//! leaves whatever was written locally in place so it can be inspected.

use std::io::{Read, Write};

use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};
use crate::metadata;
use crate::progress::Reporter;
use crate::session::{OpenMode, RemoteFile, RemoteSession};

/// Chunk size used for both directions.
pub const CHUNK_SIZE: usize = 8192;

fn label_for(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn pump_download<S: RemoteSession + ?Sized>(
    remote: &mut RemoteFile<'_, S>,
    local: &mut std::fs::File,
    local_path: &std::path::Path,
    expected_size: u64,
    reporter: &mut Reporter,
    bytes_moved: &mut u64,
) -> Result<()> {
    let label = label_for(local_path);
    loop {
        let chunk = remote.read_chunk(CHUNK_SIZE).map_err(|err| {
            err.with_kind(ErrorKind::PartialTransfer)
                .context(format!("error while reading {:?}", remote.path()))
        })?;
        if chunk.is_empty() {
            return Ok(());
        }
        local
            .write_all(&chunk)
            .map_err(|err| Error::local(err, format!("failed writing to {local_path:?}")))?;
        *bytes_moved += chunk.len() as u64;
        if expected_size > 0 {
            reporter.update(*bytes_moved, expected_size, &label);
        }
    }
}

/// Download `remote_path` into `local_path`, creating or truncating the local file.
///
/// `expected_size` only drives progress; zero means unknown.
#[instrument(skip(session, reporter))]
pub fn download<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_path: &str,
    local_path: &std::path::Path,
    expected_size: u64,
    reporter: &mut Reporter,
) -> Result<u64> {
    tracing::debug!("downloading {:?} to {:?}", remote_path, local_path);
    let mut remote = RemoteFile::open(session, remote_path, OpenMode::ReadOnly)?;
    // File::create never translates line endings, binary content is written as-is
    let mut local = std::fs::File::create(local_path).map_err(|err| {
        Error::local(err, format!("cannot open {local_path:?} for writing"))
    })?;
    let mut bytes_moved = 0;
    let outcome = pump_download(
        &mut remote,
        &mut local,
        local_path,
        expected_size,
        reporter,
        &mut bytes_moved,
    );
    drop(local);
    let closed = remote.close();
    reporter.finish();
    match outcome {
        Ok(()) => {
            if let Err(error) = closed {
                tracing::warn!("{:#}", &error);
            }
            reporter.message(&format!(
                "Saved {} bytes to {}",
                bytes_moved,
                local_path.display()
            ));
            Ok(bytes_moved)
        }
        Err(error) => {
            tracing::warn!(
                "{} bytes read - incomplete data in {:?} may have resulted",
                bytes_moved,
                local_path
            );
            Err(error.context(format!(
                "failed downloading {remote_path:?} to {local_path:?}, {bytes_moved} bytes transferred - incomplete data may have resulted"
            )))
        }
    }
}

/// Download a single remote file, looking up its size first for progress reporting.
#[instrument(skip(session, reporter))]
pub fn get<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_path: &str,
    local_path: &std::path::Path,
    reporter: &mut Reporter,
) -> Result<u64> {
    let expected_size = match metadata::fetch(session, remote_path) {
        Ok(entry) => entry.size_bytes,
        Err(error) if error.kind == ErrorKind::Transport => {
            return Err(error.context(format!("failed fetching {remote_path:?}")));
        }
        Err(error) => {
            tracing::debug!("size of {:?} unknown: {:#}", remote_path, &error);
            0
        }
    };
    download(session, remote_path, local_path, expected_size, reporter)
}

fn write_all_remote<S: RemoteSession + ?Sized>(
    remote: &mut RemoteFile<'_, S>,
    mut data: &[u8],
) -> Result<()> {
    while !data.is_empty() {
        let written = remote.write_chunk(data).map_err(|err| {
            err.with_kind(ErrorKind::PartialTransfer)
                .context(format!("error while writing {:?}", remote.path()))
        })?;
        if written == 0 {
            return Err(Error::new(
                ErrorKind::PartialTransfer,
                anyhow::anyhow!("remote side accepted no data for {:?}", remote.path()),
            ));
        }
        data = &data[std::cmp::min(written, data.len())..];
    }
    Ok(())
}

fn pump_upload<S: RemoteSession + ?Sized>(
    local: &mut std::fs::File,
    local_path: &std::path::Path,
    remote: &mut RemoteFile<'_, S>,
    total: u64,
    reporter: &mut Reporter,
    bytes_moved: &mut u64,
) -> Result<()> {
    let label = label_for(local_path);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match local.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(Error::local(err, format!("failed reading {local_path:?}")));
            }
        };
        write_all_remote(remote, &buffer[..read])?;
        *bytes_moved += read as u64;
        if total > 0 {
            reporter.update(*bytes_moved, total, &label);
        }
    }
}

/// Upload `local_path` to `remote_path`, creating or truncating the remote file.
///
/// Nothing is opened remotely when the local file cannot be read.
#[instrument(skip(session, reporter))]
pub fn upload<S: RemoteSession + ?Sized>(
    session: &mut S,
    local_path: &std::path::Path,
    remote_path: &str,
    reporter: &mut Reporter,
) -> Result<u64> {
    let mut local = std::fs::File::open(local_path)
        .map_err(|err| Error::local(err, format!("cannot open {local_path:?} for reading")))?;
    let local_metadata = local
        .metadata()
        .map_err(|err| Error::local(err, format!("failed reading metadata of {local_path:?}")))?;
    if !local_metadata.is_file() {
        return Err(Error::new(
            ErrorKind::LocalIo,
            anyhow::anyhow!("cannot upload {local_path:?}: not a regular file"),
        ));
    }
    let total = local_metadata.len();
    tracing::debug!("uploading {:?} to {:?}", local_path, remote_path);
    let mut remote = RemoteFile::open(session, remote_path, OpenMode::WriteOnly)?;
    let mut bytes_moved = 0;
    let outcome = pump_upload(
        &mut local,
        local_path,
        &mut remote,
        total,
        reporter,
        &mut bytes_moved,
    );
    let closed = remote.close();
    reporter.finish();
    match outcome.and(closed) {
        Ok(()) => {
            reporter.message(&format!("Uploaded {bytes_moved} bytes to {remote_path}"));
            Ok(bytes_moved)
        }
        Err(error) => {
            tracing::warn!(
                "{} bytes written - incomplete data in {:?} may have resulted",
                bytes_moved,
                remote_path
            );
            Err(error.context(format!(
                "failed uploading {local_path:?} to {remote_path:?}, {bytes_moved} bytes transferred - incomplete data may have resulted"
            )))
        }
    }
}

/// Stream a remote file into `writer`.
#[instrument(skip(session, writer))]
pub fn cat<S: RemoteSession + ?Sized>(
    session: &mut S,
    remote_path: &str,
    writer: &mut dyn Write,
) -> Result<u64> {
    let mut remote = RemoteFile::open(session, remote_path, OpenMode::ReadOnly)?;
    let mut bytes_moved = 0u64;
    let outcome = loop {
        let chunk = match remote.read_chunk(CHUNK_SIZE) {
            Ok(chunk) => chunk,
            Err(error) => {
                break Err(error
                    .with_kind(ErrorKind::PartialTransfer)
                    .context(format!("error while reading {remote_path:?}")));
            }
        };
        if chunk.is_empty() {
            break Ok(());
        }
        if let Err(error) = writer.write_all(&chunk) {
            break Err(Error::local(error, "failed writing output".to_string()));
        }
        bytes_moved += chunk.len() as u64;
    };
    let closed = remote.close();
    outcome?;
    if let Err(error) = closed {
        tracing::warn!("{:#}", &error);
    }
    writer
        .flush()
        .map_err(|err| Error::local(err, "failed flushing output".to_string()))?;
    Ok(bytes_moved)
}
