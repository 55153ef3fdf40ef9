use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Directory listing returned by the index fetcher, keyed by entry name in
/// the order the upstream JSON object lists them.
pub type Index = IndexMap<String, EntryMeta>;

/// `designation -> full version -> OS entries`, in traversal order.
pub type HarvestDocument = IndexMap<String, IndexMap<String, Vec<OsEntry>>>;

/// `os` value used for source artifacts found directly under a full version.
pub const SOURCE_OS: &str = "source";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Dir,
    File,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    #[serde(rename = "type", default)]
    pub kind: EntryType,
    #[serde(rename = "staticLink", default)]
    pub static_link: String,
    #[serde(default)]
    pub size: u64,
}

impl EntryMeta {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    pub file_href: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chksum_href: Option<String>,
}

impl FileInfo {
    /// Builds the record for a file entry without a checksum link.
    pub fn from_entry(name: &str, meta: &EntryMeta) -> Self {
        Self {
            file_name: name.to_string(),
            file_href: meta.static_link.clone(),
            file_size: meta.size,
            chksum_href: None,
        }
    }
}

/// Target platform inferred from a package file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "amd64")]
    Amd64,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "i386_64")]
    I386_64,
    #[serde(rename = "i386")]
    I386,
    #[serde(rename = "source")]
    Source,
    #[serde(rename = "txz")]
    Txz,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::X86_64 => "x86_64",
            Arch::I386_64 => "i386_64",
            Arch::I386 => "i386",
            Arch::Source => "source",
            Arch::Txz => "txz",
            Arch::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchEntry {
    pub arch: Arch,
    pub file_info: FileInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    pub architectures: Vec<ArchEntry>,
}

/// One entry in a full version's OS list.
///
/// Serializes as `{os: source, file_info: ...}` or `{os: <name>, versions: [...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsEntry {
    /// A source artifact listed directly under the full version directory.
    Source(FileInfo),
    /// An operating system directory and its per-release packages.
    PerOs {
        name: String,
        versions: Vec<VersionEntry>,
    },
}

impl OsEntry {
    pub fn os(&self) -> &str {
        match self {
            OsEntry::Source(_) => SOURCE_OS,
            OsEntry::PerOs { name, .. } => name,
        }
    }
}

impl Serialize for OsEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            OsEntry::Source(file_info) => {
                map.serialize_entry("os", SOURCE_OS)?;
                map.serialize_entry("file_info", file_info)?;
            }
            OsEntry::PerOs { name, versions } => {
                map.serialize_entry("os", name)?;
                map.serialize_entry("versions", versions)?;
            }
        }
        map.end()
    }
}
