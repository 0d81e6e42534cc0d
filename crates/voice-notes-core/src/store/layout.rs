use crate::store::LIST_FILE_NAME;

use std::path::{Path, PathBuf};

/// Folder holding the audio files, relative to the store root.
const RECORD_FOLDER_NAME: &str = "Record";

/// Scratch area for in-progress recordings, relative to the OS temp dir.
const TEMPORARY_FOLDER_NAME: &str = "voice-notes";

/// On-disk locations used by a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Persisted record list.
    pub list_file: PathBuf,
    /// Directory holding one audio file per record.
    pub record_folder: PathBuf,
    /// Scratch directory for recordings that are not yet records.
    pub temporary_dir: PathBuf,
}

impl StoreLayout {
    /// Standard layout rooted at `root`: `records_list.json` and `Record/`
    /// under the root, scratch files under the OS temp directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            list_file: root.join(LIST_FILE_NAME),
            record_folder: root.join(RECORD_FOLDER_NAME),
            temporary_dir: std::env::temp_dir().join(TEMPORARY_FOLDER_NAME),
        }
    }

    /// Override the scratch directory.
    pub fn with_temporary_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temporary_dir = dir.as_ref().to_path_buf();
        self
    }
}
