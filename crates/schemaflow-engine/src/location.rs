//! Scan roots for migration scripts.
//!
//! A location is either a filesystem directory, scanned recursively, or a
//! path prefix into a set of scripts bundled into the binary. Location order
//! determines scan order only; apply order is governed by script versions.

use std::fmt;
use std::path::PathBuf;

use rust_embed::RustEmbed;

/// Prefix marking a filesystem location. Bare strings default to this.
pub const FILESYSTEM_PREFIX: &str = "filesystem:";

/// Prefix marking a location inside a registered [`EmbeddedScripts`] set.
pub const EMBEDDED_PREFIX: &str = "embedded:";

/// A scan root searched recursively for migration scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A directory on disk.
    Filesystem(PathBuf),
    /// A path prefix into scripts bundled with the binary.
    Embedded(String),
}

impl Location {
    /// Parse a location string. `embedded:` and `filesystem:` prefixes are
    /// recognized; anything else is taken as a filesystem path.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(EMBEDDED_PREFIX) {
            Location::Embedded(rest.trim_start_matches('/').to_string())
        } else if let Some(rest) = raw.strip_prefix(FILESYSTEM_PREFIX) {
            Location::Filesystem(PathBuf::from(rest))
        } else {
            Location::Filesystem(PathBuf::from(raw))
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Location::Filesystem(path.into())
    }

    pub fn embedded(prefix: impl Into<String>) -> Self {
        Location::Embedded(prefix.into())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Filesystem(path) => write!(f, "{}{}", FILESYSTEM_PREFIX, path.display()),
            Location::Embedded(prefix) => write!(f, "{}{}", EMBEDDED_PREFIX, prefix),
        }
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Location::parse(raw)
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        Location::parse(&raw)
    }
}

/// Scripts bundled into the binary through a [`RustEmbed`] asset type.
///
/// Resolves `embedded:` locations by path prefix, recursively, against the
/// captured asset set.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedScripts {
    files: Vec<(String, Vec<u8>)>,
}

impl EmbeddedScripts {
    /// Capture every file of an embedded asset type.
    pub fn from_assets<E: RustEmbed>() -> Self {
        let mut files: Vec<(String, Vec<u8>)> = E::iter()
            .filter_map(|path| {
                let file = E::get(&path)?;
                Some((path.to_string(), file.data.into_owned()))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Files under `prefix`, recursively. An empty prefix matches everything.
    pub(crate) fn under(&self, prefix: &str) -> Vec<(&str, &[u8])> {
        let prefix = prefix.trim_end_matches('/');
        self.files
            .iter()
            .filter(|(path, _)| {
                prefix.is_empty()
                    || path
                        .strip_prefix(prefix)
                        .map_or(false, |rest| rest.starts_with('/'))
            })
            .map(|(path, data)| (path.as_str(), data.as_slice()))
            .collect()
    }
}
