use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use db_access::DbError;

/// Manifest file name, resolved relative to the migrations directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk manifest enumerating the generated migrations.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: u32,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub idx: u32,
    pub tag: String,
}

/// One migration named by the manifest: its tag and the SQL file backing it.
/// The SQL body is read lazily, at application time.
#[derive(Debug, Clone)]
pub struct PendingMigration {
    pub tag: String,
    pub sql_path: PathBuf,
}

impl PendingMigration {
    pub fn load_sql(&self) -> Result<String, DbError> {
        fs::read_to_string(&self.sql_path).map_err(|e| {
            DbError::config(format!(
                "failed to read migration file '{}': {e}",
                self.sql_path.display()
            ))
        })
    }
}

/// The full, ordered set of migrations named by the manifest.
#[derive(Debug, Clone)]
pub struct MigrationSet {
    pub entries: Vec<PendingMigration>,
}

impl MigrationSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locator for migration artifacts under one directory.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
}

impl MigrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `None` when the directory or its manifest is absent -- the
    /// defined "nothing to run" case, not an error. A manifest that exists
    /// but cannot be parsed is a configuration error.
    pub fn discover(&self) -> Result<Option<MigrationSet>, DbError> {
        if !self.dir.is_dir() {
            debug!(
                "artifact_check=miss reason=no_directory dir={}",
                self.dir.display()
            );
            return Ok(None);
        }
        let manifest_path = self.dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            debug!(
                "artifact_check=miss reason=no_manifest path={}",
                manifest_path.display()
            );
            return Ok(None);
        }

        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            DbError::config(format!(
                "failed to read migration manifest '{}': {e}",
                manifest_path.display()
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            DbError::config(format!(
                "malformed migration manifest '{}': {e}",
                manifest_path.display()
            ))
        })?;

        let mut entries = manifest.entries;
        entries.sort_by_key(|e| e.idx);

        let mut set = Vec::with_capacity(entries.len());
        for entry in entries {
            validate_tag(&entry.tag)?;
            let sql_path = self.dir.join(format!("{}.sql", entry.tag));
            set.push(PendingMigration {
                tag: entry.tag,
                sql_path,
            });
        }

        debug!("artifact_check=hit entries={}", set.len());
        Ok(Some(MigrationSet { entries: set }))
    }
}

// Tags end up inside SQL literals and file names; keep them to a
// conservative charset.
fn validate_tag(tag: &str) -> Result<(), DbError> {
    let ok = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !ok {
        return Err(DbError::config(format!(
            "invalid migration tag '{tag}' in manifest"
        )));
    }
    Ok(())
}
