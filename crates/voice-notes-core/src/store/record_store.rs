use crate::{
    CoreError, CoreResult,
    store::{Record, StoreLayout},
};

use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    io::{self, Write},
    panic::Location,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, TimeDelta, Utc};
use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// File name of the persisted record list.
pub(crate) const LIST_FILE_NAME: &str = "records_list.json";

/// Owns the record list and the audio files it references.
///
/// Every operation, reads included, runs under one mutex so a reader never
/// observes a list entry whose file is still being moved or deleted. The list
/// is rewritten as a whole after each mutation through a temp file + rename,
/// and an in-memory mutation is rolled back when that write fails.
///
/// # Thread Safety
///
/// `RecordStore` is `Sync`; share it behind an `Arc` between threads.
pub struct RecordStore {
    layout: StoreLayout,
    entries: Mutex<Vec<Record>>,
}

impl RecordStore {
    /// Load the persisted record list described by `layout`.
    ///
    /// A missing list yields an empty store. An unreadable or malformed list
    /// is moved aside (`<list>.corrupt-<timestamp>`) and the store starts
    /// empty; neither case is an error.
    #[instrument]
    pub fn open(layout: StoreLayout) -> Self {
        let entries = load_entries(&layout.list_file);

        info!(
            list_file = ?layout.list_file,
            record_count = entries.len(),
            "Record store opened"
        );

        Self {
            layout,
            entries: Mutex::new(entries),
        }
    }

    /// Snapshot of all records, most recent first.
    pub fn list(&self) -> Vec<Record> {
        self.lock().iter().rev().cloned().collect()
    }

    /// Move `source` into the record folder and append a new record for it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidName`] if `name` is empty.
    /// - [`CoreError::SourceMissing`] if `source` does not exist.
    /// - [`CoreError::StoreUnavailable`] if the record folder cannot be used.
    /// - [`CoreError::SaveFailed`] if the move or the list write fails. When
    ///   only the list write fails, the moved file stays in the record folder.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn create_record(&self, source: &Path, name: &str, extension: &str) -> CoreResult<Record> {
        if name.is_empty() {
            return Err(CoreError::InvalidName {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !source.exists() {
            warn!(source = ?source, "Record source file does not exist");
            return Err(CoreError::SourceMissing {
                path: source.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.ensure_record_folder()?;

        let mut entries = self.lock();

        let (file_name, target) = self.unique_target(&entries, extension);

        move_file(source, &target).map_err(|e| CoreError::SaveFailed {
            reason: format!("Failed to move record file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let record = Record {
            name: name.to_string(),
            file_name,
            create_time: next_create_time(entries.last()),
        };

        entries.push(record.clone());

        if let Err(e) = persist(&self.layout.list_file, &entries) {
            entries.pop();
            error!(
                file_name = %record.file_name,
                error = %e,
                "Failed to write record list, new record rolled back (audio file kept)"
            );
            return Err(CoreError::SaveFailed {
                reason: format!("Failed to write record list: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!(file_name = %record.file_name, "Record created");

        Ok(record)
    }

    /// Delete `record` and its audio file.
    ///
    /// The file delete is best-effort: a failure is logged and the metadata
    /// edit still proceeds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RemoveFailed`] if the list write fails; the entry
    /// is restored at its original position.
    ///
    /// Aborts the process if `record` is not in the store. That can only
    /// happen when a caller's view has diverged from the store.
    #[track_caller]
    #[instrument(skip(self, record), fields(file_name = %record.file_name))]
    pub fn remove_record(&self, record: &Record) -> CoreResult<()> {
        let mut entries = self.lock();

        let Some(index) = entries.iter().position(|entry| entry == record) else {
            error!(
                file_name = %record.file_name,
                "Attempted to remove a record that is not in the store"
            );
            std::process::abort();
        };

        let path = record.file_path(&self.layout.record_folder);
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = ?path, error = %e, "Failed to delete record file");
        }

        let removed = entries.remove(index);

        if let Err(e) = persist(&self.layout.list_file, &entries) {
            entries.insert(index, removed);
            error!(error = %e, "Failed to write record list, removal rolled back");
            return Err(CoreError::RemoveFailed {
                reason: format!("Failed to write record list: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!("Record removed");

        Ok(())
    }

    /// Best-effort delete of a scratch recording that never became a record.
    #[instrument(skip(self))]
    pub fn remove_temporary_file(&self, path: &Path) {
        let _entries = self.lock();

        match fs::remove_file(path) {
            Ok(()) => debug!("Temporary recording removed"),
            Err(e) => warn!(error = %e, "Failed to remove temporary recording"),
        }
    }

    /// Fresh scratch path for a recording, inside the temporary area.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] if the temporary area cannot
    /// be created.
    #[track_caller]
    pub fn temporary_record_path(&self, extension: &str) -> CoreResult<PathBuf> {
        let dir = &self.layout.temporary_dir;

        fs::create_dir_all(dir).map_err(|e| CoreError::StoreUnavailable {
            reason: format!("Failed to create temporary directory {:?}: {}", dir, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(dir.join(random_file_name(extension)))
    }

    /// Delete files in the record folder that no record references.
    ///
    /// Returns the number of files removed.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn sweep_orphaned_files(&self) -> CoreResult<usize> {
        let entries = self.lock();
        let known: HashSet<&str> = entries.iter().map(|r| r.file_name.as_str()).collect();

        let dir = match fs::read_dir(&self.layout.record_folder) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            if file_name.to_str().is_some_and(|name| known.contains(name)) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    removed += 1;
                    debug!(file_name = ?file_name, "Orphaned record file removed");
                }
                Err(e) => warn!(file_name = ?file_name, error = %e, "Failed to remove orphaned file"),
            }
        }

        info!(removed, "Orphan sweep complete");

        Ok(removed)
    }

    /// Path of `record`'s audio file.
    pub fn record_path(&self, record: &Record) -> PathBuf {
        record.file_path(&self.layout.record_folder)
    }

    /// Directory holding the audio files.
    pub fn record_folder(&self) -> &Path {
        &self.layout.record_folder
    }

    /// Locations used by this store.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        // A poisoned lock still holds a list that matches the last durable
        // write or a rolled-back mutation in progress; keep serving it.
        self.entries.lock().unwrap_or_else(|e| {
            error!("Record list lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }

    #[track_caller]
    fn ensure_record_folder(&self) -> CoreResult<()> {
        let folder = &self.layout.record_folder;

        match fs::metadata(folder) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => {
                warn!(folder = ?folder, "Record folder path is not a directory");
                Err(CoreError::StoreUnavailable {
                    reason: format!("{:?} is not a directory", folder),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(folder).map_err(|e| CoreError::StoreUnavailable {
                    reason: format!("Failed to create record folder {:?}: {}", folder, e),
                    location: ErrorLocation::from(Location::caller()),
                })?;
                debug!(folder = ?folder, "Created record folder");
                Ok(())
            }
            Err(e) => Err(CoreError::StoreUnavailable {
                reason: format!("Failed to inspect record folder {:?}: {}", folder, e),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    fn unique_target(&self, entries: &[Record], extension: &str) -> (String, PathBuf) {
        loop {
            let file_name = random_file_name(extension);
            let target = self.layout.record_folder.join(&file_name);

            if !target.exists() && !entries.iter().any(|r| r.file_name == file_name) {
                return (file_name, target);
            }

            debug!(file_name = %file_name, "Generated file name already taken, retrying");
        }
    }
}

/// Random UUID-based file name with `extension` (omitted when empty).
pub(crate) fn random_file_name(extension: &str) -> String {
    let id = Uuid::new_v4().to_string().to_uppercase();
    if extension.is_empty() {
        id
    } else {
        format!("{}.{}", id, extension)
    }
}

/// Creation times strictly increase along the list even when the clock
/// has not advanced (or went backwards) since the previous record.
fn next_create_time(last: Option<&Record>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last.create_time => last.create_time + TimeDelta::microseconds(1),
        _ => now,
    }
}

fn load_entries(list_file: &Path) -> Vec<Record> {
    let contents = match fs::read(list_file) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(list_file = ?list_file, "No record list yet, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(list_file = ?list_file, error = %e, "Record list unreadable, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Vec<Record>>(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            let backup = quarantine_path(list_file);
            match fs::rename(list_file, &backup) {
                Ok(()) => warn!(
                    backup = ?backup,
                    error = %e,
                    "Record list malformed, moved aside and starting empty"
                ),
                Err(rename_err) => warn!(
                    error = %e,
                    rename_error = %rename_err,
                    "Record list malformed and could not be moved aside, starting empty"
                ),
            }
            Vec::new()
        }
    }
}

/// Fresh `<list>.corrupt-<timestamp>-<id>` sibling; never an existing file.
fn quarantine_path(list_file: &Path) -> PathBuf {
    loop {
        let id = Uuid::new_v4().simple().to_string();
        let backup = suffixed(
            list_file,
            &format!(
                ".corrupt-{}-{}",
                Utc::now().format("%Y%m%d%H%M%S"),
                &id[..8]
            ),
        );
        if !backup.exists() {
            return backup;
        }
    }
}

fn persist(list_file: &Path, entries: &[Record]) -> io::Result<()> {
    if let Some(parent) = list_file.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_vec_pretty(entries)?;
    let temp_path = suffixed(list_file, ".tmp");

    let result = write_and_rename(&temp_path, list_file, &contents);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn write_and_rename(temp_path: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut temp_file = fs::File::create(temp_path)?;
    temp_file.write_all(contents)?;
    temp_file.sync_all()?;
    fs::rename(temp_path, target)
}

/// Moves `source` to `target`. Copies and deletes only when the two live on
/// different filesystems; any other rename failure is returned as is.
///
/// The move either completes or leaves `source` in place and `target` absent.
pub(crate) fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(error = %e, "Rename crosses filesystems, falling back to copy");
        }
        Err(e) => return Err(e),
    }

    if let Err(copy_err) = fs::copy(source, target) {
        let _ = fs::remove_file(target);
        return Err(copy_err);
    }

    if let Err(e) = fs::remove_file(source) {
        warn!(source = ?source, error = %e, "Copied record file but could not remove source");
        let _ = fs::remove_file(target);
        return Err(e);
    }

    Ok(())
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
