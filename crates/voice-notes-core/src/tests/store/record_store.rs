use crate::{
    CoreError, RecordStore,
    store::move_file,
    tests::support::{test_layout, write_source},
};

use std::fs;

const AUDIO_BYTES: &[u8] = b"RIFF fake audio payload";

/// WHAT: Creating a record moves the file in and lists it
/// WHY: Saved recordings must survive in the store, not the scratch area
#[test]
#[allow(clippy::unwrap_used)]
fn given_source_file_when_creating_record_then_file_moved_and_listed() {
    // Given: An empty store and a scratch recording
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let source = write_source(&dir.path().join("scratch"), "take.wav", AUDIO_BYTES);

    // When: Creating a record from it
    let record = store.create_record(&source, "Groceries", "wav").unwrap();

    // Then: Listed, moved byte-for-byte, source gone
    assert_eq!(store.list(), vec![record.clone()]);
    assert_eq!(record.name, "Groceries");
    assert!(record.file_name.ends_with(".wav"));
    assert_eq!(fs::read(store.record_path(&record)).unwrap(), AUDIO_BYTES);
    assert!(!source.exists());
}

/// WHAT: Listing returns the most recent record first
/// WHY: The UI shows newest notes on top
#[test]
#[allow(clippy::unwrap_used)]
fn given_three_records_when_listing_then_newest_first_with_increasing_times() {
    // Given: Three records created in order
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let scratch = dir.path().join("scratch");
    for name in ["first", "second", "third"] {
        let source = write_source(&scratch, &format!("{}.wav", name), AUDIO_BYTES);
        store.create_record(&source, name, "wav").unwrap();
    }

    // When: Listing
    let records = store.list();

    // Then: Reverse creation order, strictly decreasing timestamps
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["third", "second", "first"]);
    assert!(records.windows(2).all(|w| w[0].create_time > w[1].create_time));
}

/// WHAT: Records survive reopening the store
/// WHY: The list is the durable source of truth across launches
#[test]
#[allow(clippy::unwrap_used)]
fn given_saved_records_when_reopening_then_same_records_loaded() {
    // Given: Two records in a store
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    let store = RecordStore::open(test_layout(dir.path()));
    let a = store
        .create_record(&write_source(&scratch, "a.wav", AUDIO_BYTES), "a", "wav")
        .unwrap();
    let b = store
        .create_record(&write_source(&scratch, "b.wav", AUDIO_BYTES), "b", "m4a")
        .unwrap();
    drop(store);

    // When: Reopening
    let reopened = RecordStore::open(test_layout(dir.path()));

    // Then: Same records, same order, same timestamps
    let records = reopened.list();
    assert_eq!(records, vec![b.clone(), a.clone()]);
    assert_eq!(records[0].create_time, b.create_time);
    assert_eq!(records[1].name, "a");
}

/// WHAT: The list file is a JSON array of name, file name and timestamp
/// WHY: The on-disk format is read by later versions
#[test]
#[allow(clippy::unwrap_used)]
fn given_record_when_saved_then_list_file_is_json_array() {
    // Given: A store with one record
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    let store = RecordStore::open(layout.clone());
    let record = store
        .create_record(&write_source(dir.path(), "x.wav", AUDIO_BYTES), "x", "wav")
        .unwrap();

    // When: Reading the list file
    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(&layout.list_file).unwrap()).unwrap();

    // Then: One entry with all three fields
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "x");
    assert_eq!(entries[0]["file_name"], record.file_name.as_str());
    assert!(entries[0]["create_time"].is_string());
}

/// WHAT: Empty names are rejected without touching the source
/// WHY: Every record needs a display name
#[test]
#[allow(clippy::unwrap_used)]
fn given_empty_name_when_creating_record_then_invalid_name() {
    // Given: A store and a source file
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let source = write_source(dir.path(), "take.wav", AUDIO_BYTES);

    // When: Creating with an empty name
    let result = store.create_record(&source, "", "wav");

    // Then: Rejected, source still there, store empty
    assert!(matches!(result, Err(CoreError::InvalidName { .. })));
    assert!(source.exists());
    assert!(store.list().is_empty());
}

/// WHAT: Missing sources are reported
/// WHY: A recording that never reached disk cannot become a record
#[test]
#[allow(clippy::unwrap_used)]
fn given_missing_source_when_creating_record_then_source_missing() {
    // Given: A store and a path with nothing behind it
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));

    // When: Creating
    let result = store.create_record(&dir.path().join("nope.wav"), "n", "wav");

    // Then: Reported, store empty
    assert!(matches!(result, Err(CoreError::SourceMissing { .. })));
    assert!(store.list().is_empty());
}

/// WHAT: A regular file where the record folder should be is reported
/// WHY: The store must not overwrite unrelated files
#[test]
#[allow(clippy::unwrap_used)]
fn given_file_at_record_folder_path_when_creating_then_store_unavailable() {
    // Given: A file occupying the record folder path
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    fs::write(&layout.record_folder, b"in the way").unwrap();
    let store = RecordStore::open(layout);
    let source = write_source(&dir.path().join("scratch"), "take.wav", AUDIO_BYTES);

    // When: Creating
    let result = store.create_record(&source, "n", "wav");

    // Then: Store unavailable, source kept
    assert!(matches!(result, Err(CoreError::StoreUnavailable { .. })));
    assert!(source.exists());
}

/// WHAT: A failed list write rolls the new record back
/// WHY: Memory and disk must never disagree about which records exist
#[test]
#[allow(clippy::unwrap_used)]
fn given_unwritable_list_when_creating_record_then_save_failed_and_rolled_back() {
    // Given: A store whose list file path is blocked by a directory
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    let store = RecordStore::open(layout.clone());
    fs::create_dir_all(&layout.list_file).unwrap();
    let source = write_source(&dir.path().join("scratch"), "take.wav", AUDIO_BYTES);

    // When: Creating
    let result = store.create_record(&source, "n", "wav");

    // Then: Save failed, nothing listed, no temp file left
    assert!(matches!(result, Err(CoreError::SaveFailed { .. })));
    assert!(store.list().is_empty());
    let mut temp = layout.list_file.clone().into_os_string();
    temp.push(".tmp");
    assert!(!std::path::Path::new(&temp).exists());
}

/// WHAT: Removing a record deletes its file and entry
/// WHY: Deleted notes must be gone after a relaunch
#[test]
#[allow(clippy::unwrap_used)]
fn given_two_records_when_removing_one_then_other_remains_durably() {
    // Given: Two records
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    let store = RecordStore::open(test_layout(dir.path()));
    let keep = store
        .create_record(&write_source(&scratch, "a.wav", AUDIO_BYTES), "keep", "wav")
        .unwrap();
    let drop_me = store
        .create_record(&write_source(&scratch, "b.wav", AUDIO_BYTES), "drop", "wav")
        .unwrap();
    let dropped_path = store.record_path(&drop_me);

    // When: Removing one
    store.remove_record(&drop_me).unwrap();

    // Then: File and entry gone, also after reopening
    assert!(!dropped_path.exists());
    assert_eq!(store.list(), vec![keep.clone()]);
    assert_eq!(RecordStore::open(test_layout(dir.path())).list(), vec![keep]);
}

/// WHAT: Removal proceeds when the audio file is already gone
/// WHY: The file delete is best-effort
#[test]
#[allow(clippy::unwrap_used)]
fn given_record_without_file_when_removing_then_entry_removed() {
    // Given: A record whose file was deleted behind the store's back
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let record = store
        .create_record(&write_source(dir.path(), "a.wav", AUDIO_BYTES), "a", "wav")
        .unwrap();
    fs::remove_file(store.record_path(&record)).unwrap();

    // When: Removing
    let result = store.remove_record(&record);

    // Then: Entry gone
    assert!(result.is_ok());
    assert!(store.list().is_empty());
}

/// WHAT: A failed list write restores the removed entry in place
/// WHY: The in-memory list must match the last durable write
#[test]
#[allow(clippy::unwrap_used)]
fn given_unwritable_list_when_removing_then_remove_failed_and_order_restored() {
    // Given: Three records, then the list file path blocked by a directory
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    let layout = test_layout(dir.path());
    let store = RecordStore::open(layout.clone());
    for name in ["a", "b", "c"] {
        let source = write_source(&scratch, &format!("{}.wav", name), AUDIO_BYTES);
        store.create_record(&source, name, "wav").unwrap();
    }
    let before = store.list();
    fs::remove_file(&layout.list_file).unwrap();
    fs::create_dir(&layout.list_file).unwrap();

    // When: Removing the middle record
    let result = store.remove_record(&before[1]);

    // Then: Failed, same records in the same order
    assert!(matches!(result, Err(CoreError::RemoveFailed { .. })));
    assert_eq!(store.list(), before);
}

/// WHAT: A malformed list is moved aside and the store starts empty
/// WHY: One bad write must not brick the app, and the data stays recoverable
#[test]
#[allow(clippy::unwrap_used)]
fn given_corrupt_list_when_opening_then_empty_and_list_quarantined() {
    // Given: Garbage in the list file
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    fs::write(&layout.list_file, b"{ not json").unwrap();

    // When: Opening
    let store = RecordStore::open(layout.clone());

    // Then: Empty, original moved to a .corrupt- sibling
    assert!(store.list().is_empty());
    assert!(!layout.list_file.exists());
    let quarantined = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("records_list.json.corrupt-")
        });
    assert!(quarantined);
}

/// WHAT: Two corrupt lists in a row are both kept
/// WHY: A second quarantine within the same second must not overwrite the first
#[test]
#[allow(clippy::unwrap_used)]
fn given_repeated_corruption_when_opening_twice_then_both_payloads_kept() {
    // Given: A corrupt list that gets quarantined
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    fs::write(&layout.list_file, b"FIRST corrupt payload").unwrap();
    let _ = RecordStore::open(layout.clone());

    // When: The list is corrupt again and the store reopens right away
    fs::write(&layout.list_file, b"SECOND corrupt payload").unwrap();
    let store = RecordStore::open(layout.clone());

    // Then: Both payloads sit in separate quarantine files
    assert!(store.list().is_empty());
    let mut payloads: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("records_list.json.corrupt-")
        })
        .map(|entry| fs::read_to_string(entry.path()).unwrap())
        .collect();
    payloads.sort();
    assert_eq!(
        payloads,
        vec![
            "FIRST corrupt payload".to_string(),
            "SECOND corrupt payload".to_string()
        ]
    );
}

/// WHAT: A failed same-filesystem move reports the error and creates nothing
/// WHY: Copy fallback is only for moves across filesystems
#[test]
#[allow(clippy::unwrap_used)]
fn given_missing_source_when_moving_then_error_and_no_target() {
    // Given: A source that does not exist
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("gone.wav");
    let target = dir.path().join("moved.wav");

    // When: Moving it
    let result = move_file(&source, &target);

    // Then: The rename error comes back and no target is left behind
    assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    assert!(!target.exists());
}

/// WHAT: Moving within one filesystem leaves only the target
/// WHY: A record file must exist exactly once after it is saved
#[test]
#[allow(clippy::unwrap_used)]
fn given_source_when_moving_then_source_gone_and_bytes_at_target() {
    // Given: A scratch file
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir.path().join("scratch"), "take.wav", AUDIO_BYTES);
    let target = dir.path().join("moved.wav");

    // When: Moving it
    move_file(&source, &target).unwrap();

    // Then: Source gone, bytes intact at target
    assert!(!source.exists());
    assert_eq!(fs::read(&target).unwrap(), AUDIO_BYTES);
}

/// WHAT: A missing list opens as an empty store
/// WHY: First launch has no list yet
#[test]
#[allow(clippy::unwrap_used)]
fn given_no_list_file_when_opening_then_empty() {
    // Given: An empty directory
    let dir = tempfile::tempdir().unwrap();

    // When/Then: Empty store
    assert!(RecordStore::open(test_layout(dir.path())).list().is_empty());
}

/// WHAT: Files no record references are swept
/// WHY: Crashes between move and list write leave orphans behind
#[test]
#[allow(clippy::unwrap_used)]
fn given_orphaned_file_when_sweeping_then_only_orphan_removed() {
    // Given: One record and one stray file in the record folder
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let record = store
        .create_record(&write_source(dir.path(), "a.wav", AUDIO_BYTES), "a", "wav")
        .unwrap();
    let stray = write_source(store.record_folder(), "stray.wav", AUDIO_BYTES);

    // When: Sweeping
    let removed = store.sweep_orphaned_files().unwrap();

    // Then: Only the stray file went
    assert_eq!(removed, 1);
    assert!(!stray.exists());
    assert!(store.record_path(&record).exists());
}

/// WHAT: Scratch paths are unique and live in the temporary area
/// WHY: Concurrent recordings must never share a file
#[test]
#[allow(clippy::unwrap_used)]
fn given_store_when_requesting_scratch_paths_then_unique_in_temporary_dir() {
    // Given: A store
    let dir = tempfile::tempdir().unwrap();
    let layout = test_layout(dir.path());
    let store = RecordStore::open(layout.clone());

    // When: Asking twice
    let first = store.temporary_record_path("wav").unwrap();
    let second = store.temporary_record_path("wav").unwrap();

    // Then: Distinct .wav paths under an existing temporary dir
    assert_ne!(first, second);
    assert_eq!(first.parent(), Some(layout.temporary_dir.as_path()));
    assert_eq!(first.extension().unwrap(), "wav");
    assert!(layout.temporary_dir.is_dir());
}

/// WHAT: Scratch files can be discarded, even twice
/// WHY: Failed or discarded recordings must not pile up
#[test]
#[allow(clippy::unwrap_used)]
fn given_scratch_file_when_removing_twice_then_gone_without_panic() {
    // Given: A scratch file
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(test_layout(dir.path()));
    let path = store.temporary_record_path("wav").unwrap();
    fs::write(&path, AUDIO_BYTES).unwrap();

    // When: Removing it twice
    store.remove_temporary_file(&path);
    store.remove_temporary_file(&path);

    // Then: Gone
    assert!(!path.exists());
}
