//! In-memory session used by the unit tests.
//!
//! Children are kept in insertion order so tests can rely on listing order the way they would
//! on a real device. Failures can be injected per path and every removal is recorded.

use std::collections::HashMap;

use crate::error::{AfcStatus, Error, Result};
use crate::session::{FileHandle, LinkKind, OpenMode, RemoteSession};

#[derive(Debug, Clone)]
enum Node {
    Dir { children: Vec<String> },
    File { data: Vec<u8> },
    Link { target: String },
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    mode: OpenMode,
    pos: usize,
    delivered: usize,
}

#[derive(Debug, Default)]
pub struct MemorySession {
    nodes: HashMap<String, Node>,
    handles: HashMap<u64, OpenFile>,
    next_handle: u64,
    opened: usize,
    closed: usize,
    removed: Vec<String>,
    fail_list: HashMap<String, AfcStatus>,
    fail_metadata: HashMap<String, AfcStatus>,
    fail_open: HashMap<String, AfcStatus>,
    fail_read_after: HashMap<String, usize>,
    fail_write_after: HashMap<String, usize>,
    fail_remove: HashMap<String, AfcStatus>,
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_of(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}

impl MemorySession {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), Node::Dir { children: vec![] });
        Self {
            nodes,
            next_handle: 1,
            ..Default::default()
        }
    }

    fn insert(&mut self, path: &str, node: Node) {
        let path = normalize(path);
        let (parent, name) = parent_of(&path);
        if !self.nodes.contains_key(&parent) {
            self.add_dir(&parent);
        }
        if let Some(Node::Dir { children }) = self.nodes.get_mut(&parent) {
            if !children.contains(&name) {
                children.push(name);
            }
        }
        self.nodes.insert(path, node);
    }

    pub fn add_dir(&mut self, path: &str) {
        let path = normalize(path);
        if path.is_empty() || self.nodes.contains_key(&path) {
            return;
        }
        self.insert(&path, Node::Dir { children: vec![] });
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        self.insert(
            path,
            Node::File {
                data: data.to_vec(),
            },
        );
    }

    pub fn add_symlink(&mut self, path: &str, target: &str) {
        self.insert(
            path,
            Node::Link {
                target: target.to_string(),
            },
        );
    }

    pub fn fail_list(&mut self, path: &str, status: AfcStatus) {
        self.fail_list.insert(normalize(path), status);
    }

    pub fn fail_metadata(&mut self, path: &str, status: AfcStatus) {
        self.fail_metadata.insert(normalize(path), status);
    }

    pub fn fail_open(&mut self, path: &str, status: AfcStatus) {
        self.fail_open.insert(normalize(path), status);
    }

    /// Reads of `path` fail once `bytes` have been delivered.
    pub fn fail_read_after(&mut self, path: &str, bytes: usize) {
        self.fail_read_after.insert(normalize(path), bytes);
    }

    /// Writes to `path` fail once `bytes` have been accepted.
    pub fn fail_write_after(&mut self, path: &str, bytes: usize) {
        self.fail_write_after.insert(normalize(path), bytes);
    }

    pub fn fail_remove(&mut self, path: &str, status: AfcStatus) {
        self.fail_remove.insert(normalize(path), status);
    }

    pub fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.get(&normalize(path)) {
            Some(Node::File { data }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(&normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(&normalize(path)), Some(Node::Dir { .. }))
    }

    pub fn link_target(&self, path: &str) -> Option<String> {
        match self.nodes.get(&normalize(path)) {
            Some(Node::Link { target }) => Some(target.clone()),
            _ => None,
        }
    }

    pub fn opened(&self) -> usize {
        self.opened
    }

    pub fn closed(&self) -> usize {
        self.closed
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    fn resolve_link(&self, path: &str) -> String {
        let mut current = normalize(path);
        for _ in 0..16 {
            match self.nodes.get(&current) {
                Some(Node::Link { target }) => {
                    current = if target.starts_with('/') {
                        normalize(target)
                    } else {
                        let (parent, _) = parent_of(&current);
                        normalize(&format!("{parent}/{target}"))
                    };
                }
                _ => break,
            }
        }
        current
    }
}

impl RemoteSession for MemorySession {
    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        let key = normalize(path);
        if let Some(status) = self.fail_open.get(&key) {
            return Err(Error::remote(*status, "open", path));
        }
        let resolved = self.resolve_link(&key);
        match mode {
            OpenMode::ReadOnly => match self.nodes.get(&resolved) {
                Some(Node::File { .. }) => {}
                Some(_) => return Err(Error::remote(AfcStatus::ObjectIsDir, "open", path)),
                None => return Err(Error::remote(AfcStatus::ObjectNotFound, "open", path)),
            },
            OpenMode::WriteOnly => {
                let (parent, _) = parent_of(&resolved);
                match self.nodes.get(&parent) {
                    Some(Node::Dir { .. }) => {}
                    _ => return Err(Error::remote(AfcStatus::ObjectNotFound, "open", path)),
                }
                if matches!(self.nodes.get(&resolved), Some(Node::Dir { .. })) {
                    return Err(Error::remote(AfcStatus::ObjectIsDir, "open", path));
                }
                self.insert(&resolved, Node::File { data: vec![] });
            }
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.opened += 1;
        self.handles.insert(
            handle,
            OpenFile {
                path: resolved,
                mode,
                pos: 0,
                delivered: 0,
            },
        );
        Ok(FileHandle(handle))
    }

    fn read_chunk(&mut self, handle: FileHandle, max_bytes: usize) -> Result<Vec<u8>> {
        let file = self
            .handles
            .get_mut(&handle.0)
            .ok_or_else(|| Error::remote(AfcStatus::InvalidArg, "read", "<bad handle>"))?;
        if file.mode != OpenMode::ReadOnly {
            return Err(Error::remote(AfcStatus::InvalidArg, "read", &file.path));
        }
        if let Some(limit) = self.fail_read_after.get(&file.path) {
            if file.delivered >= *limit {
                return Err(Error::remote(AfcStatus::ReadError, "read", &file.path));
            }
        }
        let data = match self.nodes.get(&file.path) {
            Some(Node::File { data }) => data,
            _ => return Err(Error::remote(AfcStatus::ObjectNotFound, "read", &file.path)),
        };
        let end = std::cmp::min(file.pos + max_bytes, data.len());
        let chunk = data[file.pos..end].to_vec();
        file.pos = end;
        file.delivered += chunk.len();
        Ok(chunk)
    }

    fn write_chunk(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize> {
        let file = self
            .handles
            .get_mut(&handle.0)
            .ok_or_else(|| Error::remote(AfcStatus::InvalidArg, "write", "<bad handle>"))?;
        if file.mode != OpenMode::WriteOnly {
            return Err(Error::remote(AfcStatus::InvalidArg, "write", &file.path));
        }
        if let Some(limit) = self.fail_write_after.get(&file.path) {
            if file.delivered >= *limit {
                return Err(Error::remote(AfcStatus::WriteError, "write", &file.path));
            }
        }
        match self.nodes.get_mut(&file.path) {
            Some(Node::File { data: contents }) => contents.extend_from_slice(data),
            _ => return Err(Error::remote(AfcStatus::ObjectNotFound, "write", &file.path)),
        }
        file.delivered += data.len();
        Ok(data.len())
    }

    fn close_file(&mut self, handle: FileHandle) -> Result<()> {
        match self.handles.remove(&handle.0) {
            Some(_) => {
                self.closed += 1;
                Ok(())
            }
            None => Err(Error::remote(AfcStatus::InvalidArg, "close", "<bad handle>")),
        }
    }

    fn list_directory(&mut self, path: &str) -> Result<Vec<String>> {
        let key = normalize(path);
        if let Some(status) = self.fail_list.get(&key) {
            return Err(Error::remote(*status, "read directory", path));
        }
        match self.nodes.get(&key) {
            Some(Node::Dir { children }) => {
                let mut names = vec![".".to_string(), "..".to_string()];
                names.extend(children.iter().cloned());
                Ok(names)
            }
            Some(_) => Err(Error::remote(AfcStatus::ReadError, "read directory", path)),
            None => Err(Error::remote(
                AfcStatus::ObjectNotFound,
                "read directory",
                path,
            )),
        }
    }

    fn get_metadata(&mut self, path: &str) -> Result<Vec<(String, String)>> {
        let key = normalize(path);
        if let Some(status) = self.fail_metadata.get(&key) {
            return Err(Error::remote(*status, "get file info", path));
        }
        let node = self
            .nodes
            .get(&key)
            .ok_or_else(|| Error::remote(AfcStatus::ObjectNotFound, "get file info", path))?;
        let (ifmt, size, nlink) = match node {
            Node::Dir { children } => ("S_IFDIR", 64 + 32 * children.len(), 2 + children.len()),
            Node::File { data } => ("S_IFREG", data.len(), 1),
            Node::Link { target } => ("S_IFLNK", target.len(), 1),
        };
        let mut pairs = vec![
            ("st_size".to_string(), size.to_string()),
            ("st_blocks".to_string(), size.div_ceil(512).to_string()),
            ("st_nlink".to_string(), nlink.to_string()),
            ("st_ifmt".to_string(), ifmt.to_string()),
            ("st_mtime".to_string(), "1413989837000000000".to_string()),
            ("st_birthtime".to_string(), "1409934234000000000".to_string()),
        ];
        if let Node::Link { target } = node {
            pairs.push(("LinkTarget".to_string(), target.clone()));
        }
        Ok(pairs)
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        let key = normalize(path);
        match self.nodes.get(&key) {
            Some(Node::Dir { .. }) => return Ok(()),
            Some(_) => return Err(Error::remote(AfcStatus::ObjectExists, "make directory", path)),
            None => {}
        }
        self.add_dir(&key);
        Ok(())
    }

    fn remove_path(&mut self, path: &str) -> Result<()> {
        let key = normalize(path);
        self.removed.push(key.clone());
        if let Some(status) = self.fail_remove.get(&key) {
            return Err(Error::remote(*status, "remove", path));
        }
        match self.nodes.get(&key) {
            None => return Err(Error::remote(AfcStatus::ObjectNotFound, "remove", path)),
            Some(Node::Dir { children }) if !children.is_empty() => {
                return Err(Error::remote(AfcStatus::DirNotEmpty, "remove", path));
            }
            Some(_) => {}
        }
        self.nodes.remove(&key);
        let (parent, name) = parent_of(&key);
        if let Some(Node::Dir { children }) = self.nodes.get_mut(&parent) {
            children.retain(|child| child != &name);
        }
        Ok(())
    }

    fn rename_path(&mut self, from: &str, to: &str) -> Result<()> {
        let from_key = normalize(from);
        let node = self
            .nodes
            .get(&from_key)
            .cloned()
            .ok_or_else(|| Error::remote(AfcStatus::ObjectNotFound, "rename", from))?;
        if matches!(node, Node::Dir { .. }) {
            return Err(Error::remote(AfcStatus::OpNotSupported, "rename", from));
        }
        self.nodes.remove(&from_key);
        let (parent, name) = parent_of(&from_key);
        if let Some(Node::Dir { children }) = self.nodes.get_mut(&parent) {
            children.retain(|child| child != &name);
        }
        self.insert(to, node);
        Ok(())
    }

    fn make_link(&mut self, kind: LinkKind, target: &str, link_path: &str) -> Result<()> {
        if self.exists(link_path) {
            return Err(Error::remote(AfcStatus::ObjectExists, "make link", link_path));
        }
        match kind {
            LinkKind::Symbolic => self.add_symlink(link_path, target),
            LinkKind::Hard => {
                let data = self
                    .file_data(target)
                    .ok_or_else(|| Error::remote(AfcStatus::ObjectNotFound, "make link", target))?;
                self.add_file(link_path, &data);
            }
        }
        Ok(())
    }
}
