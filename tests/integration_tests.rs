/// Integration tests for peanut
///
/// These tests drive the engines end to end against a temporary store and
/// a temporary home-like folder layout.
///
/// Test categories:
/// 1. Persistence store round trips
/// 2. Schedule engine and cleanup passes
/// 3. Redirect rules
/// 4. Batch search and transforms
/// 5. Error log behavior
use chrono::{DateTime, TimeDelta, Utc};
use peanut::{
    AppConfig, BatchProcessor, CleanupCategory, Clock, FixedClock, Frequency, PersistenceStore,
    RenameKind, RenameMode, RuleEngine, ScheduleEngine, SystemInfo,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary installation: a store, a Downloads folder registered in the
/// system info, and a cleanup root.
struct TestFixture {
    temp_dir: TempDir,
    store: PersistenceStore,
    config: AppConfig,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = PersistenceStore::open(temp_dir.path().join("state").join("store.json"));

        fs::create_dir(temp_dir.path().join("Downloads")).expect("Failed to create Downloads");
        fs::create_dir(temp_dir.path().join("Desktop")).expect("Failed to create Desktop");
        store
            .set_system_info(&SystemInfo {
                os: "linux".to_string(),
                downloads_directory: temp_dir.path().join("Downloads").display().to_string(),
                desktop_directory: temp_dir.path().join("Desktop").display().to_string(),
                ..Default::default()
            })
            .expect("Failed to save system info");

        let mut config = AppConfig::default();
        config.cleanup.roots = vec![temp_dir.path().join("Downloads")];

        TestFixture {
            temp_dir,
            store,
            config,
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn downloads(&self) -> PathBuf {
        self.path().join("Downloads")
    }

    /// Create a file (and its parent folders) relative to the fixture root.
    fn create_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&path).expect("Failed to create file");
        file.write_all(content).expect("Failed to write file content");
        path
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }
}

fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

// ============================================================================
// Persistence Store
// ============================================================================

#[test]
fn test_fresh_store_reads_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = PersistenceStore::open(temp_dir.path().join("never-written.json"));

    let prefs = store.get_preferences().unwrap();
    assert_eq!(prefs.theme, "system");
    assert_eq!(prefs.ui_scale_percent, 100);

    let settings = store.get_cleanup_settings().unwrap();
    assert_eq!(settings.frequency, Frequency::Never);
    assert_eq!(settings.next_trigger, None);

    assert!(store.get_redirects().unwrap().is_empty());
    assert!(store.get_latest_error().unwrap().is_none());
    assert!(!temp_dir.path().join("never-written.json").exists());
}

#[test]
fn test_store_survives_reopen() {
    let fixture = TestFixture::new();
    let engine = ScheduleEngine::with_clock(
        &fixture.store,
        &fixture.config,
        FixedClock::new(start_time()),
    );
    engine.set_frequency(Frequency::Month).unwrap();

    let reopened = PersistenceStore::open(fixture.store.path());
    let settings = reopened.get_cleanup_settings().unwrap();
    assert_eq!(settings.frequency, Frequency::Month);
    assert_eq!(settings.next_trigger, Some(start_time() + TimeDelta::days(30)));
}

#[test]
fn test_legacy_frequency_falls_back_to_never() {
    let fixture = TestFixture::new();
    fs::write(
        fixture.store.path(),
        r#"{"cleanup": {"empty_folders": true, "frequency": "fortnightly", "next_trigger": null}}"#,
    )
    .unwrap();

    let settings = fixture.store.get_cleanup_settings().unwrap();
    assert_eq!(settings.frequency, Frequency::Never);
    assert!(settings.empty_folders);

    fs::write(
        fixture.store.path(),
        r#"{"preferences": {"theme": "dark"}, "cleanup": {"frequency": 3, "next_trigger": null}}"#,
    )
    .unwrap();

    let settings = fixture.store.get_cleanup_settings().unwrap();
    assert_eq!(settings.frequency, Frequency::Never);
    assert_eq!(fixture.store.get_preferences().unwrap().theme, "dark");
}

#[test]
fn test_clear_all_redirects_empties_set() {
    let fixture = TestFixture::new();
    let rules = RuleEngine::new(&fixture.store);
    rules.add_rule("a", "Downloads", "/tmp/a").unwrap();
    rules.add_rule("b", "Desktop", "/tmp/b").unwrap();
    rules.add_rule("c", "Downloads", "/tmp/c").unwrap();

    fixture.store.clear_all_redirects().unwrap();

    assert!(fixture.store.get_redirects().unwrap().is_empty());
}

// ============================================================================
// Schedule Engine
// ============================================================================

#[test]
fn test_every_frequency_schedules_exactly_one_interval_ahead() {
    let fixture = TestFixture::new();
    let clock = FixedClock::new(start_time());
    let engine = ScheduleEngine::with_clock(&fixture.store, &fixture.config, &clock);

    for frequency in Frequency::ALL {
        engine.set_frequency(frequency).unwrap();
        clock.advance(TimeDelta::days(400));
        let report = engine.run_pass(false).unwrap();

        match frequency.interval() {
            Some(interval) => {
                assert!(report.executed, "{} pass should be due", frequency);
                let next = report.next_trigger.unwrap();
                assert!(next > clock.now());
                assert_eq!(next - clock.now(), interval);
            }
            None => {
                assert!(!report.executed);
                assert_eq!(report.next_trigger, None);
            }
        }
    }
}

#[test]
fn test_pass_before_trigger_touches_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("Downloads/a.bin", b"same");
    fixture.create_file("Downloads/b.bin", b"same");
    let clock = FixedClock::new(start_time());
    let engine = ScheduleEngine::with_clock(&fixture.store, &fixture.config, &clock);
    engine.set_frequency(Frequency::Week).unwrap();
    engine
        .set_category(CleanupCategory::DuplicateFiles, true)
        .unwrap();

    clock.advance(TimeDelta::days(6));
    let report = engine.run_pass(false).unwrap();

    assert!(!report.executed);
    fixture.assert_file_exists("Downloads/a.bin");
    fixture.assert_file_exists("Downloads/b.bin");
    assert_eq!(fixture.store.error_count().unwrap(), 0);
}

#[test]
fn test_forced_pass_removes_duplicates_and_empty_folders() {
    let fixture = TestFixture::new();
    fixture.create_file("Downloads/A.txt", b"identical content");
    fixture.create_file("Downloads/nested/B.txt", b"identical content");
    fixture.create_file("Downloads/C.txt", b"identical contenT");
    fs::create_dir_all(fixture.downloads().join("empty").join("deeper")).unwrap();

    let engine = ScheduleEngine::with_clock(
        &fixture.store,
        &fixture.config,
        FixedClock::new(start_time()),
    );
    engine
        .set_category(CleanupCategory::DuplicateFiles, true)
        .unwrap();
    engine
        .set_category(CleanupCategory::EmptyFolders, true)
        .unwrap();

    let report = engine.run_pass(true).unwrap();

    assert!(report.executed);
    // duplicates run first, so nested/ becomes empty and is removed too
    fixture.assert_file_exists("Downloads/A.txt");
    fixture.assert_file_not_exists("Downloads/nested");
    fixture.assert_file_exists("Downloads/C.txt");
    fixture.assert_file_not_exists("Downloads/empty");
    assert!(fixture.downloads().is_dir());
    assert_eq!(report.failure_count(), 0);
}

#[test]
fn test_failing_category_does_not_stop_the_pass() {
    let mut fixture = TestFixture::new();
    fixture.config.cleanup.recycle_bin = Some(fixture.path().join("missing-bin"));
    fixture.create_file("Downloads/x.bin", b"dup");
    fixture.create_file("Downloads/y.bin", b"dup");

    let clock = FixedClock::new(start_time());
    let engine = ScheduleEngine::with_clock(&fixture.store, &fixture.config, &clock);
    engine.set_frequency(Frequency::Day).unwrap();
    engine
        .set_category(CleanupCategory::RecyclingBin, true)
        .unwrap();
    engine
        .set_category(CleanupCategory::DuplicateFiles, true)
        .unwrap();
    engine
        .set_category(CleanupCategory::BrowserHistory, true)
        .unwrap();

    clock.advance(TimeDelta::days(1));
    let report = engine.run_pass(false).unwrap();

    assert!(report.executed);
    assert_eq!(report.categories.len(), 3);
    fixture.assert_file_exists("Downloads/x.bin");
    fixture.assert_file_not_exists("Downloads/y.bin");
    // recycling bin missing, no browser configured
    assert_eq!(fixture.store.error_count().unwrap(), 2);
    assert_eq!(
        report.next_trigger,
        Some(start_time() + TimeDelta::days(2))
    );
}

#[test]
fn test_out_of_range_threshold_fails_only_unused_files() {
    let mut fixture = TestFixture::new();
    fixture.config.cleanup.unused_after_days = 1_000_000_000;
    fixture.create_file("Downloads/x.bin", b"dup");
    fixture.create_file("Downloads/y.bin", b"dup");

    let clock = FixedClock::new(start_time());
    let engine = ScheduleEngine::with_clock(&fixture.store, &fixture.config, &clock);
    engine.set_frequency(Frequency::Week).unwrap();
    engine
        .set_category(CleanupCategory::UnusedFiles, true)
        .unwrap();
    engine
        .set_category(CleanupCategory::DuplicateFiles, true)
        .unwrap();

    let report = engine.run_pass(true).unwrap();

    assert!(report.executed);
    assert_eq!(report.categories.len(), 2);
    fixture.assert_file_exists("Downloads/x.bin");
    fixture.assert_file_not_exists("Downloads/y.bin");
    assert_eq!(fixture.store.error_count().unwrap(), 1);
    let latest = fixture.store.get_latest_error().unwrap().unwrap();
    assert!(latest.description.contains("unused_after_days"));
}

#[test]
fn test_remaining_time_label() {
    let fixture = TestFixture::new();
    let clock = FixedClock::new(start_time());
    let engine = ScheduleEngine::with_clock(&fixture.store, &fixture.config, &clock);

    assert_eq!(engine.next_trigger_label().unwrap(), "N/A");

    engine.set_frequency(Frequency::Week).unwrap();
    clock.advance(TimeDelta::hours(26) + TimeDelta::minutes(5));
    assert_eq!(
        engine.next_trigger_label().unwrap(),
        "5 days 21 hours 55 minutes"
    );
}

// ============================================================================
// Redirect Rules
// ============================================================================

#[test]
fn test_rule_apply_first_inserted_rule_wins_and_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_file("Downloads/holiday_photo.jpg", b"jpg");
    let photos = fixture.path().join("Photos");
    let holidays = fixture.path().join("Holidays");

    let rules = RuleEngine::new(&fixture.store);
    rules
        .add_rule("photo", "Downloads", &photos.display().to_string())
        .unwrap();
    rules
        .add_rule("holiday", "Downloads", &holidays.display().to_string())
        .unwrap();

    let first = rules.apply_stored().unwrap();
    assert_eq!(first.moved.len(), 1);
    fixture.assert_file_exists("Photos/holiday_photo.jpg");
    fixture.assert_file_not_exists("Holidays");

    let second = rules.apply_stored().unwrap();
    assert!(second.moved.is_empty());
    assert!(second.failed.is_empty());
    fixture.assert_file_exists("Photos/holiday_photo.jpg");
    assert_eq!(fixture.store.error_count().unwrap(), 0);
}

#[test]
fn test_rule_uses_saved_desktop_directory() {
    let fixture = TestFixture::new();
    fixture.create_file("Desktop/Screenshot 1.png", b"png");
    fixture.create_file("Desktop/todo.txt", b"txt");

    let rules = RuleEngine::new(&fixture.store);
    rules
        .add_rule(
            "SCREENSHOT",
            "desktop",
            &fixture.path().join("Shots").display().to_string(),
        )
        .unwrap();
    rules.apply_stored().unwrap();

    fixture.assert_file_exists("Shots/Screenshot 1.png");
    fixture.assert_file_exists("Desktop/todo.txt");
}

#[test]
fn test_rule_removal_is_targeted() {
    let fixture = TestFixture::new();
    let rules = RuleEngine::new(&fixture.store);
    let keep = rules.add_rule("keep", "Downloads", "/tmp/keep").unwrap().unwrap();
    let drop = rules.add_rule("drop", "Downloads", "/tmp/drop").unwrap().unwrap();

    assert!(rules.remove_rule(drop).unwrap());

    let left = rules.list().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, keep);
}

#[test]
fn test_placeholder_rules_are_not_persisted() {
    let fixture = TestFixture::new();
    let rules = RuleEngine::new(&fixture.store);

    let result = rules.add_rule("Redirect keyword", "Downloads", "/tmp/x");

    assert!(matches!(result, Err(peanut::EngineError::InvalidInput { .. })));
    assert!(rules.list().unwrap().is_empty());
    assert_eq!(fixture.store.error_count().unwrap(), 0);
}

// ============================================================================
// Batch Search and Transforms
// ============================================================================

#[test]
fn test_search_all_and_none() {
    let fixture = TestFixture::new();
    fixture.create_file("tree/one.txt", b"1");
    fixture.create_file("tree/sub/two.txt", b"2");
    fixture.create_file("tree/sub/deeper/three.md", b"3");
    let batch = BatchProcessor::new(&fixture.store);
    let root = fixture.path().join("tree");

    let mut all: Vec<PathBuf> = batch.search(&root, "*").unwrap().collect();
    all.sort();
    assert_eq!(
        all,
        vec![
            root.join("one.txt"),
            root.join("sub").join("deeper").join("three.md"),
            root.join("sub").join("two.txt"),
        ]
    );

    assert_eq!(batch.search(&root, "zzz_no_match").unwrap().count(), 0);
    // a fresh walk each time
    fixture.create_file("tree/four.txt", b"4");
    assert_eq!(batch.search(&root, ".txt").unwrap().count(), 3);
}

#[test]
fn test_copy_collision_keeps_existing_file() {
    let fixture = TestFixture::new();
    let source = fixture.create_file("work/a.txt", b"fresh");
    fixture.create_file("Downloads/NewFolder/a.txt", b"original");

    let report = BatchProcessor::new(&fixture.store)
        .copy(&[source], "NewFolder")
        .unwrap();

    assert_eq!(report.completed.len(), 1);
    assert_eq!(fixture.read("Downloads/NewFolder/a.txt"), "original");
    assert_eq!(fixture.read("Downloads/NewFolder/a (1).txt"), "fresh");
    fixture.assert_file_exists("work/a.txt");
}

#[test]
fn test_copy_creates_destination_and_collects_failures() {
    let fixture = TestFixture::new();
    let real = fixture.create_file("work/real.txt", b"x");

    let report = BatchProcessor::new(&fixture.store)
        .copy(&[fixture.path().join("work/ghost.txt"), real], "Fresh")
        .unwrap();

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    fixture.assert_file_exists("Downloads/Fresh/real.txt");
    assert_eq!(fixture.store.error_count().unwrap(), 1);
}

#[test]
fn test_extension_conversion_skips_non_matching() {
    let fixture = TestFixture::new();
    let report_doc = fixture.create_file("docs/report.doc", b"doc");
    let notes = fixture.create_file("docs/notes.txt", b"txt");

    let mode = RenameMode::parse(RenameKind::Extension, "doc", "pdf").unwrap();
    let report = BatchProcessor::new(&fixture.store)
        .rename(&[report_doc, notes.clone()], &mode)
        .unwrap();

    fixture.assert_file_exists("docs/report.pdf");
    fixture.assert_file_not_exists("docs/report.doc");
    fixture.assert_file_exists("docs/notes.txt");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, notes);
}

#[test]
fn test_search_then_rename_with_suffix() {
    let fixture = TestFixture::new();
    fixture.create_file("proj/draft.md", b"1");
    fixture.create_file("proj/sub/draft-2.md", b"2");
    fixture.create_file("proj/final.md", b"3");
    let batch = BatchProcessor::new(&fixture.store);

    let selected: Vec<PathBuf> = batch
        .search(&fixture.path().join("proj"), "draft")
        .unwrap()
        .collect();
    let mode = RenameMode::parse(RenameKind::Affix, "-", "_old").unwrap();
    let report = batch.rename(&selected, &mode).unwrap();

    assert_eq!(report.completed.len(), 2);
    fixture.assert_file_exists("proj/draft_old.md");
    fixture.assert_file_exists("proj/sub/draft-2_old.md");
    fixture.assert_file_exists("proj/final.md");
}

#[test]
fn test_delete_continues_past_missing_paths() {
    let fixture = TestFixture::new();
    let a = fixture.create_file("trash/a.txt", b"a");
    let folder = fixture.path().join("trash").join("folder");
    fixture.create_file("trash/folder/b.txt", b"b");

    let report = BatchProcessor::new(&fixture.store)
        .delete(&[a, fixture.path().join("trash/nope.txt"), folder])
        .unwrap();

    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    fixture.assert_file_not_exists("trash/a.txt");
    fixture.assert_file_not_exists("trash/folder");
}

// ============================================================================
// Error Log
// ============================================================================

#[test]
fn test_latest_error_is_most_recent() {
    let fixture = TestFixture::new();
    let batch = BatchProcessor::new(&fixture.store);

    batch.delete(&[fixture.path().join("first-missing")]).unwrap();
    batch.delete(&[fixture.path().join("second-missing")]).unwrap();

    assert_eq!(fixture.store.error_count().unwrap(), 2);
    let latest = fixture.store.get_latest_error().unwrap().unwrap();
    assert!(latest.description.contains("second-missing"));
}

#[test]
fn test_invalid_input_is_not_logged() {
    let fixture = TestFixture::new();
    let batch = BatchProcessor::new(&fixture.store);

    assert!(batch.search(fixture.path(), "").is_err());
    assert!(batch.copy(&[], "   ").is_err());
    assert!(RenameMode::parse(RenameKind::Replace, "", "x").is_err());

    assert_eq!(fixture.store.error_count().unwrap(), 0);
}
