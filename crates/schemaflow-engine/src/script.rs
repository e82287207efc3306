//! Migration script discovery and parsing.
//!
//! Scripts are plain SQL files named `V{version}__{description}.sql`. The
//! version determines apply order and identity; the description is carried
//! into the history table with underscores turned into spaces.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EngineError, EngineResult};
use crate::location::{EmbeddedScripts, Location};

/// A single versioned migration, discovered from a location.
#[derive(Debug, Clone)]
pub struct MigrationScript {
    pub version: u32,
    pub description: String,
    pub sql: String,
    /// Hex SHA-256 of the raw script bytes, recorded in the history table.
    pub checksum: String,
    /// Where the script was found, for error messages.
    pub script: String,
}

pub(crate) fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parse a `V{version}__{description}.sql` file name.
///
/// Returns `Ok(None)` for files that are not SQL at all; a `.sql` file with a
/// name that does not follow the pattern is an error.
fn parse_file_name(name: &str) -> EngineResult<Option<(u32, String)>> {
    let Some(stem) = name.strip_suffix(".sql") else {
        return Ok(None);
    };
    let parsed = stem
        .strip_prefix('V')
        .and_then(|rest| rest.split_once("__"))
        .and_then(|(version, description)| {
            let version: u32 = version.parse().ok()?;
            Some((version, description.replace('_', " ")))
        });
    match parsed {
        Some(parsed) => Ok(Some(parsed)),
        None => Err(EngineError::Script {
            script: name.to_string(),
            reason: "file name must match V{version}__{description}.sql".to_string(),
        }),
    }
}

fn script_from_bytes(
    version: u32,
    description: String,
    script: String,
    bytes: Vec<u8>,
) -> EngineResult<MigrationScript> {
    let checksum = checksum(&bytes);
    let sql = String::from_utf8(bytes).map_err(|_| EngineError::Script {
        script: script.clone(),
        reason: "script is not valid UTF-8".to_string(),
    })?;
    Ok(MigrationScript {
        version,
        description,
        sql,
        checksum,
        script,
    })
}

fn scan_filesystem(
    location: &Location,
    dir: &Path,
    out: &mut Vec<MigrationScript>,
) -> EngineResult<()> {
    if !dir.is_dir() {
        return Err(EngineError::Location {
            location: location.to_string(),
            reason: "directory does not exist".to_string(),
        });
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::Location {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let Some((version, description)) = parse_file_name(&name)? else {
            continue;
        };
        let path = entry.path();
        let bytes = std::fs::read(path).map_err(|e| EngineError::Location {
            location: location.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        out.push(script_from_bytes(
            version,
            description,
            path.display().to_string(),
            bytes,
        )?);
    }
    Ok(())
}

fn scan_embedded(
    location: &Location,
    prefix: &str,
    embedded: Option<&EmbeddedScripts>,
    out: &mut Vec<MigrationScript>,
) -> EngineResult<()> {
    let Some(embedded) = embedded else {
        return Err(EngineError::Location {
            location: location.to_string(),
            reason: "no embedded scripts registered".to_string(),
        });
    };
    let files = embedded.under(prefix);
    if files.is_empty() {
        return Err(EngineError::Location {
            location: location.to_string(),
            reason: "no bundled files under this prefix".to_string(),
        });
    }
    for (path, bytes) in files {
        let name = path.rsplit('/').next().unwrap_or(path);
        let Some((version, description)) = parse_file_name(name)? else {
            continue;
        };
        out.push(script_from_bytes(
            version,
            description,
            path.to_string(),
            bytes.to_vec(),
        )?);
    }
    Ok(())
}

/// Discover scripts from every location, in location order, then sort them by
/// version. Duplicate versions are rejected regardless of which locations
/// contributed them.
pub(crate) fn discover(
    locations: &[Location],
    embedded: Option<&EmbeddedScripts>,
) -> EngineResult<Vec<MigrationScript>> {
    let mut scripts = Vec::new();
    for location in locations {
        match location {
            Location::Filesystem(dir) => scan_filesystem(location, dir, &mut scripts)?,
            Location::Embedded(prefix) => scan_embedded(location, prefix, embedded, &mut scripts)?,
        }
    }
    scripts.sort_by_key(|script| script.version);
    for pair in scripts.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(EngineError::DuplicateVersion {
                version: pair[0].version,
                first: pair[0].script.clone(),
                second: pair[1].script.clone(),
            });
        }
    }
    debug!(count = scripts.len(), "discovered migration scripts");
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_file_names() {
        let (version, description) = parse_file_name("V1__create_accounts.sql")
            .unwrap()
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(description, "create accounts");

        let (version, _) = parse_file_name("V42__x.sql").unwrap().unwrap();
        assert_eq!(version, 42);
    }

    #[test]
    fn ignores_files_that_are_not_sql() {
        assert!(parse_file_name("README.md").unwrap().is_none());
        assert!(parse_file_name("V1__notes.txt").unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_sql_file_names() {
        for name in ["V1_missing_separator.sql", "1__no_prefix.sql", "Vx__bad_version.sql", "create.sql"] {
            let err = parse_file_name(name).unwrap_err();
            assert!(matches!(err, EngineError::Script { .. }), "{}", name);
        }
    }

    #[test]
    fn checksum_is_hex_sha256() {
        let sum = checksum(b"SELECT 1;");
        assert_eq!(sum.len(), 64);
        assert_eq!(sum, checksum(b"SELECT 1;"));
        assert_ne!(sum, checksum(b"SELECT 2;"));
    }

    #[test]
    fn embedded_location_without_registered_scripts_fails() {
        let location = Location::embedded("migration");
        let err = discover(std::slice::from_ref(&location), None).unwrap_err();
        assert!(matches!(err, EngineError::Location { .. }));
    }
}
