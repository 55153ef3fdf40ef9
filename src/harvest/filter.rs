//! Per-level filters and file-name classification used during traversal.

use crate::model::{Arch, EntryMeta};

/// Marker entry present at several directory levels; never a version.
pub const CURRENT: &str = "CURRENT";

/// Substring patterns tested in order; the first match decides.
const ARCH_PATTERNS: &[(&str, Arch)] = &[
    ("amd64", Arch::Amd64),
    ("x86_64", Arch::X86_64),
    ("i386_64", Arch::I386_64),
    ("i386", Arch::I386),
    ("src", Arch::Source),
];

/// Extension of compressed package archives classified as `txz`.
const TXZ_EXTENSION: &str = ".txz";

/// True for directory entries the traversal should descend into.
pub fn is_traversable_dir(name: &str, meta: &EntryMeta) -> bool {
    meta.is_dir() && name != CURRENT
}

/// Outcome of testing a major version key against a project minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorVersion {
    Included,
    BelowMinimum,
    /// The key is not a finite number. Such keys are excluded.
    Unparseable,
}

/// Parses `key` as a number and compares it to the inclusive `min_version`.
pub fn classify_major(key: &str, min_version: f64) -> MajorVersion {
    match key.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= min_version => MajorVersion::Included,
        Ok(value) if value.is_finite() => MajorVersion::BelowMinimum,
        _ => MajorVersion::Unparseable,
    }
}

/// Checksum files are recognised by the marker appearing anywhere in the name.
pub fn is_checksum_file(name: &str, checksum_suffix: &str) -> bool {
    name.contains(checksum_suffix)
}

/// Infers the target architecture from a package file name.
pub fn infer_arch(file_name: &str) -> Arch {
    ARCH_PATTERNS
        .iter()
        .find(|(pattern, _)| file_name.contains(pattern))
        .map(|(_, arch)| *arch)
        .unwrap_or_else(|| {
            if file_name.ends_with(TXZ_EXTENSION) {
                Arch::Txz
            } else {
                Arch::Unknown
            }
        })
}
