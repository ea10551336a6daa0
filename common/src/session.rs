//! The remote-session capability consumed by every core operation.
//!
//! A session is established once by the command layer and borrowed mutably for the whole
//! command; nothing in this crate reconnects or closes it.

use tracing::instrument;

use crate::error::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Create or truncate
    WriteOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Hard,
    Symbolic,
}

/// Opaque handle of a file opened on the remote side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

/// Operations the remote file-access service offers.
///
/// Paths use `/` as separator and are interpreted by the service, usually relative to the
/// root of the exposed filesystem.
pub trait RemoteSession {
    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle>;

    /// Read at most `max_bytes`; an empty buffer signals end of file.
    fn read_chunk(&mut self, handle: FileHandle, max_bytes: usize) -> Result<Vec<u8>>;

    /// Returns the number of bytes the service accepted.
    fn write_chunk(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize>;

    fn close_file(&mut self, handle: FileHandle) -> Result<()>;

    /// Names of the directory children, `.` and `..` included when the service reports them.
    fn list_directory(&mut self, path: &str) -> Result<Vec<String>>;

    /// Ordered key/value metadata pairs, e.g. `st_ifmt`, `st_size`, `st_mtime`.
    fn get_metadata(&mut self, path: &str) -> Result<Vec<(String, String)>>;

    fn make_directory(&mut self, path: &str) -> Result<()>;

    fn remove_path(&mut self, path: &str) -> Result<()>;

    fn rename_path(&mut self, from: &str, to: &str) -> Result<()>;

    fn make_link(&mut self, kind: LinkKind, target: &str, link_path: &str) -> Result<()>;
}

/// A remote file that is closed exactly once.
///
/// Call [`RemoteFile::close`] to observe the close status; a guard dropped on an early-return
/// path closes the handle itself and logs any failure.
pub struct RemoteFile<'s, S: RemoteSession + ?Sized> {
    session: &'s mut S,
    handle: Option<FileHandle>,
    path: String,
}

impl<'s, S: RemoteSession + ?Sized> RemoteFile<'s, S> {
    #[instrument(skip(session))]
    pub fn open(session: &'s mut S, path: &str, mode: OpenMode) -> Result<Self> {
        tracing::debug!("opening remote file");
        let handle = session
            .open_file(path, mode)
            .map_err(|err| err.context(format!("cannot open remote file {path:?}")))?;
        Ok(Self {
            session,
            handle: Some(handle),
            path: path.to_string(),
        })
    }

    pub fn read_chunk(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let handle = self.live_handle();
        self.session.read_chunk(handle, max_bytes)
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        let handle = self.live_handle();
        self.session.write_chunk(handle, data)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self
                .session
                .close_file(handle)
                .map_err(|err| err.context(format!("failed closing remote file {:?}", self.path))),
            None => Ok(()),
        }
    }

    fn live_handle(&self) -> FileHandle {
        // the handle is only taken by close() which consumes self
        self.handle.unwrap_or(FileHandle(u64::MAX))
    }
}

impl<S: RemoteSession + ?Sized> Drop for RemoteFile<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!("closing remote file {:?} on early exit", self.path);
            if let Err(error) = self.session.close_file(handle) {
                tracing::warn!("failed closing remote file {:?}: {:#}", self.path, &error);
            }
        }
    }
}
