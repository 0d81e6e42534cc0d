use std::{
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one audio note.
///
/// Identity is the generated `file_name`; two records with the same file name
/// are the same record regardless of display name or timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Display name chosen by the user.
    pub name: String,
    /// Generated file name inside the record folder.
    pub file_name: String,
    /// When the record was created.
    pub create_time: DateTime<Utc>,
}

impl Record {
    /// Path of the record's audio file inside `record_folder`.
    pub fn file_path(&self, record_folder: &Path) -> PathBuf {
        record_folder.join(&self.file_name)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file_name.hash(state);
    }
}
