//! Remote entry metadata: parsing the service's key/value pairs and the long listing format.

use anyhow::anyhow;
use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};
use crate::session::RemoteSession;

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    SymbolicLink,
}

impl EntryKind {
    /// Parse the protocol's `st_ifmt` value; other object types are not materialized.
    #[must_use]
    pub fn from_ifmt(ifmt: &str) -> Option<Self> {
        match ifmt {
            "S_IFREG" => Some(EntryKind::File),
            "S_IFDIR" => Some(EntryKind::Directory),
            "S_IFLNK" => Some(EntryKind::SymbolicLink),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_char(self) -> char {
        match self {
            EntryKind::File => 'f',
            EntryKind::Directory => 'd',
            EntryKind::SymbolicLink => 'l',
        }
    }
}

/// One filesystem object discovered on the remote side.
///
/// Timestamps are kept exactly as the device reports them (nanoseconds since the epoch); use
/// [`RemoteEntry::modified`] and [`RemoteEntry::created`] for display or comparison.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RemoteEntry {
    pub path: String,
    pub kind: EntryKind,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    pub modified_ns: u64,
    pub created_ns: u64,
    pub link_count: u64,
}

fn parse_number(path: &str, key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|err| {
        Error::new(
            ErrorKind::Other,
            anyhow!("invalid {key} value {value:?} in metadata of {path:?}: {err}"),
        )
    })
}

fn nanos_to_datetime(nanos: u64) -> chrono::DateTime<chrono::Utc> {
    let secs = (nanos / NANOS_PER_SEC) as i64;
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    chrono::DateTime::from_timestamp(secs, subsec).unwrap_or_default()
}

impl RemoteEntry {
    /// Build an entry from the ordered key/value pairs returned by the service.
    ///
    /// Missing numeric keys default to zero; a missing or unknown `st_ifmt` is an error of kind
    /// [`ErrorKind::Unsupported`].
    pub fn from_pairs(path: &str, pairs: &[(String, String)]) -> Result<Self> {
        let mut ifmt = None;
        let mut entry = RemoteEntry {
            path: path.to_string(),
            kind: EntryKind::File,
            size_bytes: 0,
            link_target: None,
            modified_ns: 0,
            created_ns: 0,
            link_count: 0,
        };
        for (key, value) in pairs {
            match key.as_str() {
                "st_ifmt" => ifmt = Some(value.as_str()),
                "st_size" => entry.size_bytes = parse_number(path, key, value)?,
                "st_nlink" => entry.link_count = parse_number(path, key, value)?,
                "st_mtime" => entry.modified_ns = parse_number(path, key, value)?,
                "st_birthtime" => entry.created_ns = parse_number(path, key, value)?,
                "LinkTarget" => entry.link_target = Some(value.clone()),
                _ => {}
            }
        }
        entry.kind = match ifmt.and_then(EntryKind::from_ifmt) {
            Some(kind) => kind,
            None => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    anyhow!("{path:?} has unsupported file type {:?}", ifmt.unwrap_or("")),
                ));
            }
        };
        if entry.kind != EntryKind::SymbolicLink {
            entry.link_target = None;
        }
        Ok(entry)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn modified(&self) -> chrono::DateTime<chrono::Utc> {
        nanos_to_datetime(self.modified_ns)
    }

    #[must_use]
    pub fn created(&self) -> chrono::DateTime<chrono::Utc> {
        nanos_to_datetime(self.created_ns)
    }

    /// Final `/`-separated segment of the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        basename(&self.path)
    }
}

/// Final segment of a remote path, ignoring trailing separators.
#[must_use]
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Fetch and parse the metadata of a single remote path.
#[instrument(skip(session))]
pub fn fetch<S: RemoteSession + ?Sized>(session: &mut S, path: &str) -> Result<RemoteEntry> {
    let pairs = session
        .get_metadata(path)
        .map_err(|err| err.context(format!("info error for path {path:?}")))?;
    RemoteEntry::from_pairs(path, &pairs)
}

/// `ls -l` style line: type, link count, size, modification time and path.
#[must_use]
pub fn long_listing<Tz: chrono::TimeZone>(entry: &RemoteEntry, now: &chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    use chrono::Datelike;
    let modified = entry.modified().with_timezone(&now.timezone());
    let time = if modified.year() == now.year() {
        modified.format("%b %d %H:%M").to_string()
    } else {
        modified.format("%b %d  %Y").to_string()
    };
    let mut line = format!(
        "{} {:>5}\t{:>10}\t{}\t{}",
        entry.kind.type_char(),
        entry.link_count,
        entry.size_bytes,
        time,
        entry.path
    );
    if let Some(target) = &entry.link_target {
        line.push_str(" -> ");
        line.push_str(target);
    }
    line
}
