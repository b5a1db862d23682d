//! Durable storage for every persisted row.
//!
//! The store is a single JSON document on disk. Each call reads the document,
//! applies its change and writes the whole document back through a synced
//! temporary file that is renamed over the original, so a write is durable
//! before the call returns and a crash mid-write leaves the previous version
//! intact. There is no caching: every read goes to disk.
//!
//! One `PersistenceStore` is created per process and handed to each engine.
//! It assumes a single active writer and provides no cross-process locking.

use crate::models::{
    CUSTOM_FOLDER_SLOTS, CleanupSettings, CustomFolderAlias, ErrorRecord, Preferences,
    RedirectRule, SystemInfo,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Errors that can occur while reading or writing the store.
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The store file exists but does not contain a valid document.
    Corrupt { path: PathBuf, reason: String },
    /// The document could not be serialized.
    Encode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to access store {}: {}", path.display(), source)
            }
            Self::Corrupt { path, reason } => {
                write!(f, "Store {} is corrupt: {}", path.display(), reason)
            }
            Self::Encode(reason) => write!(f, "Failed to encode store: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The on-disk document. Absent sections mean "no row yet".
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    preferences: Option<Preferences>,
    #[serde(default)]
    cleanup: Option<CleanupSettings>,
    #[serde(default)]
    system: Option<SystemInfo>,
    #[serde(default)]
    redirects: Vec<RedirectRule>,
    #[serde(default)]
    next_rule_id: u64,
    #[serde(default)]
    custom_folders: Vec<CustomFolderAlias>,
    #[serde(default)]
    errors: Vec<ErrorRecord>,
}

/// Handle to the persisted state of one installation.
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    path: PathBuf,
}

impl PersistenceStore {
    /// Opens (without creating) the store at `path`.
    ///
    /// The file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(StoreDocument::default());
        }

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, doc: &StoreDocument) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| StoreError::Encode(e.to_string()))?;
        let io_err = |e: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path).map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        debug!("store written to {}", self.path.display());
        Ok(())
    }

    fn update<T>(&self, change: impl FnOnce(&mut StoreDocument) -> T) -> StoreResult<T> {
        let mut doc = self.load()?;
        let out = change(&mut doc);
        self.save(&doc)?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------

    /// Returns the stored preferences, or the defaults on first run.
    pub fn get_preferences(&self) -> StoreResult<Preferences> {
        Ok(self.load()?.preferences.unwrap_or_default())
    }

    pub fn set_preferences(&self, preferences: &Preferences) -> StoreResult<()> {
        self.update(|doc| doc.preferences = Some(preferences.clone()))
    }

    // ------------------------------------------------------------------
    // Cleanup settings
    // ------------------------------------------------------------------

    /// Returns the raw cleanup row, or `None` if it was never written.
    pub fn find_cleanup_settings(&self) -> StoreResult<Option<CleanupSettings>> {
        Ok(self.load()?.cleanup)
    }

    /// Returns the cleanup row, or all-off / `never` on first run.
    pub fn get_cleanup_settings(&self) -> StoreResult<CleanupSettings> {
        Ok(self.find_cleanup_settings()?.unwrap_or_default())
    }

    pub fn set_cleanup_settings(&self, settings: &CleanupSettings) -> StoreResult<()> {
        self.update(|doc| doc.cleanup = Some(settings.clone()))
    }

    // ------------------------------------------------------------------
    // System info
    // ------------------------------------------------------------------

    pub fn get_system_info(&self) -> StoreResult<SystemInfo> {
        Ok(self.load()?.system.unwrap_or_default())
    }

    pub fn set_system_info(&self, info: &SystemInfo) -> StoreResult<()> {
        self.update(|doc| doc.system = Some(info.clone()))
    }

    // ------------------------------------------------------------------
    // Redirect rules
    // ------------------------------------------------------------------

    /// Inserts a rule and returns its id.
    ///
    /// Returns `None` without writing anything when an identical
    /// (keyword, source, destination) triple already exists.
    pub fn add_redirect(&self, rule: &RedirectRule) -> StoreResult<Option<u64>> {
        let mut doc = self.load()?;
        if doc.redirects.iter().any(|r| r.same_triple(rule)) {
            debug!("ignoring duplicate redirect rule '{}'", rule.keyword);
            return Ok(None);
        }

        // Ids are never reused, even after a clear.
        let id = doc
            .next_rule_id
            .max(doc.redirects.iter().map(|r| r.id).max().unwrap_or(0))
            + 1;
        doc.next_rule_id = id;
        doc.redirects.push(RedirectRule {
            id,
            ..rule.clone()
        });
        self.save(&doc)?;
        Ok(Some(id))
    }

    /// All rules in insertion order.
    pub fn get_redirects(&self) -> StoreResult<Vec<RedirectRule>> {
        Ok(self.load()?.redirects)
    }

    /// Removes exactly the rule with `id`. Returns whether it existed.
    pub fn remove_redirect(&self, id: u64) -> StoreResult<bool> {
        let mut doc = self.load()?;
        let before = doc.redirects.len();
        doc.redirects.retain(|r| r.id != id);
        if doc.redirects.len() == before {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    /// Removes every rule unconditionally.
    pub fn clear_all_redirects(&self) -> StoreResult<()> {
        self.update(|doc| doc.redirects.clear())
    }

    // ------------------------------------------------------------------
    // Custom folder aliases
    // ------------------------------------------------------------------

    /// Returns the alias in `slot` (1..=3), if one was saved.
    pub fn get_custom_folder(&self, slot: u8) -> StoreResult<Option<CustomFolderAlias>> {
        Ok(self
            .load()?
            .custom_folders
            .into_iter()
            .find(|f| f.slot == slot))
    }

    /// All saved aliases ordered by slot.
    pub fn get_custom_folders(&self) -> StoreResult<Vec<CustomFolderAlias>> {
        let mut folders = self.load()?.custom_folders;
        folders.sort_by_key(|f| f.slot);
        Ok(folders)
    }

    /// Overwrites the alias in its slot.
    ///
    /// Slots outside `1..=3` are ignored and reported as `false`.
    pub fn set_custom_folder(&self, alias: &CustomFolderAlias) -> StoreResult<bool> {
        if !(1..=CUSTOM_FOLDER_SLOTS).contains(&alias.slot) {
            return Ok(false);
        }
        self.update(|doc| {
            doc.custom_folders.retain(|f| f.slot != alias.slot);
            doc.custom_folders.push(alias.clone());
        })?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Error log
    // ------------------------------------------------------------------

    /// Appends an error with the current time.
    pub fn append_error(&self, description: &str) -> StoreResult<()> {
        let record = ErrorRecord {
            timestamp: chrono::Utc::now(),
            description: description.to_string(),
        };
        self.update(|doc| doc.errors.push(record))
    }

    /// The most recently appended error, if any.
    pub fn get_latest_error(&self) -> StoreResult<Option<ErrorRecord>> {
        Ok(self.load()?.errors.pop())
    }

    /// Total number of logged errors.
    pub fn error_count(&self) -> StoreResult<usize> {
        Ok(self.load()?.errors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, PersistenceStore) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = PersistenceStore::open(temp_dir.path().join("nested").join("store.json"));
        (temp_dir, store)
    }

    fn rule(keyword: &str, source: &str, destination: &str) -> RedirectRule {
        RedirectRule::new(keyword, source, destination).expect("valid rule")
    }

    #[test]
    fn test_reads_return_defaults_on_first_run() {
        let (_dir, store) = temp_store();

        assert_eq!(store.get_preferences().unwrap(), Preferences::default());
        assert_eq!(store.get_cleanup_settings().unwrap(), CleanupSettings::default());
        assert!(store.find_cleanup_settings().unwrap().is_none());
        assert!(store.get_redirects().unwrap().is_empty());
        assert!(store.get_custom_folder(1).unwrap().is_none());
        assert!(store.get_latest_error().unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_preferences_roundtrip() {
        let (_dir, store) = temp_store();
        let prefs = Preferences {
            theme: "dark".to_string(),
            ui_scale_percent: 125,
            status: 1,
        };

        store.set_preferences(&prefs).unwrap();
        assert_eq!(store.get_preferences().unwrap(), prefs);
    }

    #[test]
    fn test_writes_are_visible_to_a_fresh_handle() {
        let (_dir, store) = temp_store();
        let settings = CleanupSettings {
            duplicate_files: true,
            frequency: Frequency::Week,
            ..Default::default()
        };
        store.set_cleanup_settings(&settings).unwrap();

        let reopened = PersistenceStore::open(store.path());
        assert_eq!(reopened.get_cleanup_settings().unwrap(), settings);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_duplicate_redirect_is_ignored() {
        let (_dir, store) = temp_store();

        let first = store.add_redirect(&rule("invoice", "Downloads", "/docs")).unwrap();
        let second = store.add_redirect(&rule("invoice", "Downloads", "/docs")).unwrap();
        let third = store.add_redirect(&rule("invoice", "Desktop", "/docs")).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(third.is_some());
        assert_eq!(store.get_redirects().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_redirect_removes_only_one_row() {
        let (_dir, store) = temp_store();
        let a = store.add_redirect(&rule("a", "Downloads", "/a")).unwrap().unwrap();
        let b = store.add_redirect(&rule("b", "Downloads", "/b")).unwrap().unwrap();

        assert!(store.remove_redirect(a).unwrap());
        assert!(!store.remove_redirect(a).unwrap());

        let remaining = store.get_redirects().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
    }

    #[test]
    fn test_clear_all_redirects() {
        let (_dir, store) = temp_store();
        store.add_redirect(&rule("a", "Downloads", "/a")).unwrap();
        store.add_redirect(&rule("b", "Desktop", "/b")).unwrap();

        store.clear_all_redirects().unwrap();
        assert!(store.get_redirects().unwrap().is_empty());

        // ids keep increasing after a clear
        let next = store.add_redirect(&rule("c", "Desktop", "/c")).unwrap().unwrap();
        assert_eq!(next, 3);
    }

    #[test]
    fn test_custom_folder_overwrites_slot() {
        let (_dir, store) = temp_store();
        let first = CustomFolderAlias {
            slot: 2,
            display_name: "Music".to_string(),
            path: "/home/me/Music".to_string(),
        };
        let second = CustomFolderAlias {
            slot: 2,
            display_name: "Videos".to_string(),
            path: "/home/me/Videos".to_string(),
        };

        assert!(store.set_custom_folder(&first).unwrap());
        assert!(store.set_custom_folder(&second).unwrap());

        assert_eq!(store.get_custom_folder(2).unwrap(), Some(second));
        assert_eq!(store.get_custom_folders().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_folder_rejects_out_of_range_slot() {
        let (_dir, store) = temp_store();
        let alias = CustomFolderAlias {
            slot: 4,
            display_name: "x".to_string(),
            path: "/x".to_string(),
        };
        assert!(!store.set_custom_folder(&alias).unwrap());
        assert!(store.get_custom_folders().unwrap().is_empty());
    }

    #[test]
    fn test_latest_error_is_last_appended() {
        let (_dir, store) = temp_store();
        store.append_error("first").unwrap();
        store.append_error("second").unwrap();

        let latest = store.get_latest_error().unwrap().unwrap();
        assert_eq!(latest.description, "second");
        assert_eq!(store.error_count().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_store_is_reported() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let result = store.get_preferences();
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_legacy_frequency_falls_back_to_never() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"cleanup": {"frequency": "biweekly", "next_trigger": null}}"#,
        )
        .unwrap();

        let settings = store.get_cleanup_settings().unwrap();
        assert_eq!(settings.frequency, Frequency::Never);
    }
}
