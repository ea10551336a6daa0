//! A session serving a local directory tree through the remote-session interface.
//!
//! Useful for a device filesystem exposed through a mount bridge, or any staging directory.
//! OS errors are translated into the protocol's status codes so callers see the same error
//! classes they would get from a device.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;

use anyhow::anyhow;
use tracing::instrument;

use crate::error::{AfcStatus, Error, ErrorKind, Result};
use crate::session::{FileHandle, LinkKind, OpenMode, RemoteSession};

pub struct DirectorySession {
    root: std::path::PathBuf,
    handles: HashMap<u64, std::fs::File>,
    next_handle: u64,
}

fn status_for(error: &std::io::Error) -> AfcStatus {
    match error.kind() {
        std::io::ErrorKind::NotFound => AfcStatus::ObjectNotFound,
        std::io::ErrorKind::PermissionDenied => AfcStatus::PermDenied,
        std::io::ErrorKind::AlreadyExists => AfcStatus::ObjectExists,
        std::io::ErrorKind::IsADirectory => AfcStatus::ObjectIsDir,
        std::io::ErrorKind::DirectoryNotEmpty => AfcStatus::DirNotEmpty,
        std::io::ErrorKind::NotADirectory => AfcStatus::ReadError,
        std::io::ErrorKind::StorageFull => AfcStatus::NoSpaceLeft,
        std::io::ErrorKind::InvalidInput => AfcStatus::InvalidArg,
        std::io::ErrorKind::Interrupted => AfcStatus::OpInterrupted,
        std::io::ErrorKind::WouldBlock => AfcStatus::OpWouldBlock,
        std::io::ErrorKind::Unsupported => AfcStatus::OpNotSupported,
        _ => AfcStatus::IoError,
    }
}

fn io_error_with(status: AfcStatus, error: std::io::Error, operation: &str, path: &str) -> Error {
    Error {
        kind: status.kind(),
        code: Some(status),
        source: anyhow::Error::new(error).context(format!("{operation} {path:?} failed: {status}")),
    }
}

fn io_error(error: std::io::Error, operation: &str, path: &str) -> Error {
    let status = status_for(&error);
    io_error_with(status, error, operation, path)
}

fn ifmt(file_type: std::fs::FileType) -> &'static str {
    use std::os::unix::fs::FileTypeExt;
    if file_type.is_symlink() {
        "S_IFLNK"
    } else if file_type.is_dir() {
        "S_IFDIR"
    } else if file_type.is_file() {
        "S_IFREG"
    } else if file_type.is_block_device() {
        "S_IFBLK"
    } else if file_type.is_char_device() {
        "S_IFCHR"
    } else if file_type.is_fifo() {
        "S_IFIFO"
    } else {
        "S_IFSOCK"
    }
}

fn nanos(secs: i64, nsecs: i64) -> u64 {
    u64::try_from(secs)
        .unwrap_or(0)
        .saturating_mul(1_000_000_000)
        .saturating_add(u64::try_from(nsecs).unwrap_or(0))
}

impl DirectorySession {
    /// Serve `root`; fails with a transport-class error when it is not a readable directory.
    #[instrument]
    pub fn open(root: &std::path::Path) -> Result<Self> {
        let metadata = std::fs::metadata(root).map_err(|err| {
            Error::new(
                ErrorKind::Transport,
                anyhow::Error::new(err).context(format!("cannot open session root {root:?}")),
            )
        })?;
        if !metadata.is_dir() {
            return Err(Error::new(
                ErrorKind::Transport,
                anyhow!("session root {root:?} is not a directory"),
            ));
        }
        tracing::debug!("serving {:?}", root);
        Ok(Self {
            root: root.to_path_buf(),
            handles: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Map a protocol path onto the served tree; `..` segments are refused.
    fn resolve(&self, path: &str, operation: &str) -> Result<std::path::PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(Error::remote(AfcStatus::PermDenied, operation, path)
                        .context("paths may not leave the served directory"));
                }
                _ => resolved.push(segment),
            }
        }
        Ok(resolved)
    }

    fn file(&mut self, handle: FileHandle, operation: &str) -> Result<&mut std::fs::File> {
        self.handles.get_mut(&handle.0).ok_or_else(|| {
            Error::remote(
                AfcStatus::InvalidArg,
                operation,
                &format!("<handle {}>", handle.0),
            )
        })
    }
}

impl RemoteSession for DirectorySession {
    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        let local = self.resolve(path, "open")?;
        if local.is_dir() {
            return Err(Error::remote(AfcStatus::ObjectIsDir, "open", path));
        }
        let file = match mode {
            OpenMode::ReadOnly => std::fs::File::open(&local),
            OpenMode::WriteOnly => std::fs::File::create(&local),
        }
        .map_err(|err| io_error(err, "open", path))?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, file);
        tracing::trace!("opened {:?} as handle {}", path, handle);
        Ok(FileHandle(handle))
    }

    fn read_chunk(&mut self, handle: FileHandle, max_bytes: usize) -> Result<Vec<u8>> {
        let file = self.file(handle, "read")?;
        let mut buffer = vec![0u8; max_bytes];
        loop {
            match file.read(&mut buffer) {
                Ok(read) => {
                    buffer.truncate(read);
                    return Ok(buffer);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(io_error_with(
                        AfcStatus::ReadError,
                        err,
                        "read",
                        &format!("<handle {}>", handle.0),
                    ));
                }
            }
        }
    }

    fn write_chunk(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize> {
        let file = self.file(handle, "write")?;
        file.write(data).map_err(|err| {
            let status = match status_for(&err) {
                AfcStatus::NoSpaceLeft => AfcStatus::NoSpaceLeft,
                _ => AfcStatus::WriteError,
            };
            io_error_with(status, err, "write", &format!("<handle {}>", handle.0))
        })
    }

    fn close_file(&mut self, handle: FileHandle) -> Result<()> {
        let mut file = self.handles.remove(&handle.0).ok_or_else(|| {
            Error::remote(
                AfcStatus::InvalidArg,
                "close",
                &format!("<handle {}>", handle.0),
            )
        })?;
        file.flush()
            .map_err(|err| io_error(err, "close", &format!("<handle {}>", handle.0)))
    }

    fn list_directory(&mut self, path: &str) -> Result<Vec<String>> {
        let local = self.resolve(path, "read directory")?;
        let reader = std::fs::read_dir(&local).map_err(|err| {
            // some platforms report ENOTDIR as a generic error, check the type ourselves
            if local.exists() && !local.is_dir() {
                Error::remote(AfcStatus::ReadError, "read directory", path)
            } else {
                io_error(err, "read directory", path)
            }
        })?;
        let mut names = vec![".".to_string(), "..".to_string()];
        for entry in reader {
            let entry = entry.map_err(|err| io_error(err, "read directory", path))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        Ok(names)
    }

    fn get_metadata(&mut self, path: &str) -> Result<Vec<(String, String)>> {
        let local = self.resolve(path, "get file info")?;
        let metadata =
            std::fs::symlink_metadata(&local).map_err(|err| io_error(err, "get file info", path))?;
        let mut pairs = vec![
            ("st_size".to_string(), metadata.size().to_string()),
            ("st_blocks".to_string(), metadata.blocks().to_string()),
            ("st_nlink".to_string(), metadata.nlink().to_string()),
            ("st_ifmt".to_string(), ifmt(metadata.file_type()).to_string()),
            (
                "st_mtime".to_string(),
                nanos(metadata.mtime(), metadata.mtime_nsec()).to_string(),
            ),
        ];
        let birthtime = metadata
            .created()
            .ok()
            .and_then(|created| created.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|since| u64::try_from(since.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_else(|| nanos(metadata.ctime(), metadata.ctime_nsec()));
        pairs.push(("st_birthtime".to_string(), birthtime.to_string()));
        if metadata.file_type().is_symlink() {
            let target =
                std::fs::read_link(&local).map_err(|err| io_error(err, "get file info", path))?;
            pairs.push(("LinkTarget".to_string(), target.to_string_lossy().to_string()));
        }
        Ok(pairs)
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        let local = self.resolve(path, "make directory")?;
        if local.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&local).map_err(|err| io_error(err, "make directory", path))
    }

    fn remove_path(&mut self, path: &str) -> Result<()> {
        let local = self.resolve(path, "remove")?;
        if local == self.root {
            return Err(Error::remote(AfcStatus::PermDenied, "remove", path));
        }
        let metadata =
            std::fs::symlink_metadata(&local).map_err(|err| io_error(err, "remove", path))?;
        if metadata.is_dir() {
            std::fs::remove_dir(&local)
        } else {
            std::fs::remove_file(&local)
        }
        .map_err(|err| io_error(err, "remove", path))
    }

    fn rename_path(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from, "rename")?;
        let destination = self.resolve(to, "rename")?;
        std::fs::rename(&source, &destination).map_err(|err| io_error(err, "rename", from))
    }

    fn make_link(&mut self, kind: LinkKind, target: &str, link_path: &str) -> Result<()> {
        let link = self.resolve(link_path, "make link")?;
        match kind {
            LinkKind::Hard => {
                let original = self.resolve(target, "make link")?;
                std::fs::hard_link(&original, &link)
            }
            // stored verbatim, the way the service records link targets
            LinkKind::Symbolic => std::os::unix::fs::symlink(target, &link),
        }
        .map_err(|err| io_error(err, "make link", link_path))
    }
}
