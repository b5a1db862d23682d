//! Cleanup categories run by a scheduled pass.
//!
//! Each category is independent: it returns its own [`CategoryReport`] or a
//! [`CleanupError`] when it could not run at all. Individual files that could
//! not be removed are listed in the report and never stop the category.

use crate::config::{AppConfig, CompiledFilters};
use crate::file_ops::{describe_io_error, remove_path};
use crate::models::{CleanupCategory, SystemInfo};
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Why a whole category could not run.
#[derive(Debug)]
pub enum CleanupError {
    /// A setting the category depends on has not been provided.
    NotConfigured(String),
    /// A configured value cannot be used.
    InvalidSetting(String),
    /// The folder the category works on does not exist.
    MissingLocation(PathBuf),
    /// Listing the category's location failed.
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl std::fmt::Display for CleanupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured(what) => write!(f, "{} is not configured", what),
            Self::InvalidSetting(what) => write!(f, "{} is out of range", what),
            Self::MissingLocation(path) => write!(f, "{} does not exist", path.display()),
            Self::Io { path, source } => write!(f, "Failed to read {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for CleanupError {}

/// Outcome of one category.
#[derive(Debug, Default)]
pub struct CategoryReport {
    /// Paths that were removed.
    pub removed: Vec<PathBuf>,
    /// Bytes freed by removed files.
    pub bytes_freed: u64,
    /// Paths that could not be removed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl CategoryReport {
    fn record_removal(&mut self, path: &Path, bytes: u64) {
        debug!("removed {}", path.display());
        self.removed.push(path.to_path_buf());
        self.bytes_freed += bytes;
    }

    fn record_failure(&mut self, path: &Path, e: &io::Error) {
        warn!("could not remove {}: {}", path.display(), e);
        self.failures.push((path.to_path_buf(), describe_io_error(e)));
    }

    fn remove(&mut self, path: &Path) {
        let bytes = fs::symlink_metadata(path).map(|m| m.len()).unwrap_or(0);
        match remove_path(path) {
            Ok(()) => self.record_removal(path, bytes),
            Err(e) => self.record_failure(path, &e),
        }
    }
}

/// Everything a pass needs, resolved at the start of the pass.
pub struct Cleaner {
    roots: Vec<PathBuf>,
    unused_after_days: u64,
    recycle_bin: Option<PathBuf>,
    browser_history: Vec<PathBuf>,
    main_browser: String,
    filters: CompiledFilters,
    now: DateTime<Utc>,
}

impl Cleaner {
    /// Builds a cleaner from the application config and the saved system info.
    ///
    /// `roots` are the folders scanned for empty folders, unused files and
    /// duplicates.
    pub fn new(
        config: &AppConfig,
        filters: CompiledFilters,
        system: &SystemInfo,
        roots: Vec<PathBuf>,
        now: DateTime<Utc>,
    ) -> Self {
        let recycle_bin = config.cleanup.recycle_bin.clone().or_else(|| {
            let saved = system.recycling_bin_directory.trim();
            if saved.is_empty() {
                default_recycle_bin()
            } else {
                Some(PathBuf::from(saved))
            }
        });

        Self {
            roots,
            unused_after_days: config.cleanup.unused_after_days,
            recycle_bin,
            browser_history: config.cleanup.browser_history.clone(),
            main_browser: system.main_browser.clone(),
            filters,
            now,
        }
    }

    /// Runs one category.
    pub fn run(&self, category: CleanupCategory) -> Result<CategoryReport, CleanupError> {
        match category {
            CleanupCategory::EmptyFolders => self.remove_empty_folders(),
            CleanupCategory::UnusedFiles => self.remove_unused_files(),
            CleanupCategory::DuplicateFiles => self.remove_duplicate_files(),
            CleanupCategory::RecyclingBin => self.empty_recycling_bin(),
            CleanupCategory::BrowserHistory => self.clear_browser_history(),
        }
    }

    fn existing_roots(&self) -> Result<Vec<&Path>, CleanupError> {
        if self.roots.is_empty() {
            return Err(CleanupError::NotConfigured("cleanup folder list".to_string()));
        }
        let existing: Vec<&Path> = self
            .roots
            .iter()
            .map(PathBuf::as_path)
            .filter(|root| {
                let ok = root.is_dir();
                if !ok {
                    debug!("skipping missing cleanup root {}", root.display());
                }
                ok
            })
            .collect();
        if existing.is_empty() {
            return Err(CleanupError::MissingLocation(self.roots[0].clone()));
        }
        Ok(existing)
    }

    /// Whether `path` and every folder between it and `root` pass the filters.
    fn allowed_under(&self, root: &Path, path: &Path) -> bool {
        path.ancestors()
            .take_while(|p| *p != root)
            .all(|p| self.filters.allows(p))
    }

    /// Files under the roots that the filters allow, each listed once even
    /// when roots overlap.
    fn candidate_files(&self) -> Result<Vec<PathBuf>, CleanupError> {
        let mut seen = BTreeSet::new();
        for root in self.existing_roots()? {
            let walker = WalkDir::new(root)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || self.filters.allows(e.path()));
            for entry in walker.filter_map(Result::ok) {
                if entry.file_type().is_file() {
                    let path = entry.path();
                    seen.insert(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Removes folders left with no entries, deepest first, so removing a
    /// child can empty its parent. The roots themselves are kept.
    pub fn remove_empty_folders(&self) -> Result<CategoryReport, CleanupError> {
        let mut report = CategoryReport::default();
        for root in self.existing_roots()? {
            let walker = WalkDir::new(root).min_depth(1).contents_first(true);
            for entry in walker.into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_dir() || !self.allowed_under(root, entry.path()) {
                    continue;
                }
                let path = entry.path();
                let is_empty = match fs::read_dir(path) {
                    Ok(mut entries) => entries.next().is_none(),
                    Err(_) => false,
                };
                if is_empty {
                    match fs::remove_dir(path) {
                        Ok(()) => report.record_removal(path, 0),
                        Err(e) => report.record_failure(path, &e),
                    }
                }
            }
        }
        Ok(report)
    }

    /// Removes files whose last access is older than the staleness threshold.
    pub fn remove_unused_files(&self) -> Result<CategoryReport, CleanupError> {
        let cutoff = i64::try_from(self.unused_after_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .and_then(|age| self.now.checked_sub_signed(age))
            .ok_or_else(|| {
                CleanupError::InvalidSetting(format!(
                    "unused_after_days = {}",
                    self.unused_after_days
                ))
            })?;
        let mut report = CategoryReport::default();
        for path in self.candidate_files()? {
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            let Ok(last_used) = metadata.accessed().or_else(|_| metadata.modified()) else {
                continue;
            };
            if DateTime::<Utc>::from(last_used) < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => report.record_removal(&path, metadata.len()),
                    Err(e) => report.record_failure(&path, &e),
                }
            }
        }
        Ok(report)
    }

    /// Removes all but one copy of byte-identical files.
    pub fn remove_duplicate_files(&self) -> Result<CategoryReport, CleanupError> {
        let mut report = CategoryReport::default();
        for group in find_duplicate_groups(&self.candidate_files()?) {
            // group is sorted; the first path is the one kept
            for path in group.iter().skip(1) {
                report.remove(path);
            }
        }
        Ok(report)
    }

    /// Deletes everything in the recycling bin.
    pub fn empty_recycling_bin(&self) -> Result<CategoryReport, CleanupError> {
        let bin = self
            .recycle_bin
            .as_ref()
            .ok_or_else(|| CleanupError::NotConfigured("recycling bin directory".to_string()))?;
        if !bin.is_dir() {
            return Err(CleanupError::MissingLocation(bin.clone()));
        }

        // freedesktop.org trash keeps payloads in files/ and metadata in info/
        let freedesktop = bin.join("files").is_dir() && bin.join("info").is_dir();
        let targets = if freedesktop {
            vec![bin.join("files"), bin.join("info")]
        } else {
            vec![bin.clone()]
        };

        let mut report = CategoryReport::default();
        for dir in targets {
            let entries = fs::read_dir(&dir).map_err(|e| CleanupError::Io {
                path: dir.clone(),
                source: e,
            })?;
            for entry in entries.flatten() {
                report.remove(&entry.path());
            }
        }
        Ok(report)
    }

    /// Deletes the history database of the configured browser.
    pub fn clear_browser_history(&self) -> Result<CategoryReport, CleanupError> {
        let files = if self.browser_history.is_empty() {
            if self.main_browser.trim().is_empty() {
                return Err(CleanupError::NotConfigured("main web browser".to_string()));
            }
            browser_history_files(&self.main_browser)
        } else {
            self.browser_history.clone()
        };

        let mut report = CategoryReport::default();
        for path in files.iter().filter(|p| p.is_file()) {
            report.remove(path);
        }
        Ok(report)
    }
}

/// Groups byte-identical files.
///
/// Files are bucketed by size first; only buckets with more than one file
/// are hashed. Zero-length files are ignored. Each returned group has at
/// least two paths, sorted.
pub fn find_duplicate_groups(files: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    let mut by_size: HashMap<u64, Vec<&PathBuf>> = HashMap::new();
    for path in files {
        match fs::metadata(path) {
            Ok(m) if m.is_file() && m.len() > 0 => by_size.entry(m.len()).or_default().push(path),
            _ => {}
        }
    }

    let mut groups = Vec::new();
    for candidates in by_size.into_values().filter(|c| c.len() > 1) {
        let mut by_hash: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in candidates {
            match hash_file(path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(path.clone()),
                Err(e) => warn!("could not hash {}: {}", path.display(), e),
            }
        }
        for mut group in by_hash.into_values().filter(|g| g.len() > 1) {
            group.sort();
            groups.push(group);
        }
    }
    groups.sort();
    groups
}

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn default_recycle_bin() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir().map(|d| d.join("Trash"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|d| d.join(".Trash"))
    } else {
        None
    }
}

/// Known history database locations for a browser name.
///
/// Only paths that exist on this machine are returned.
pub fn browser_history_files(browser: &str) -> Vec<PathBuf> {
    let browser = browser.trim().to_lowercase();
    let bases: Vec<PathBuf> = [dirs::config_dir(), dirs::data_local_dir(), dirs::data_dir()]
        .into_iter()
        .flatten()
        .collect();

    let relative: &[&str] = if browser.contains("chrome") {
        &[
            "google-chrome/Default/History",
            "Google/Chrome/Default/History",
            "Google/Chrome/User Data/Default/History",
        ]
    } else if browser.contains("edge") {
        &[
            "microsoft-edge/Default/History",
            "Microsoft Edge/Default/History",
            "Microsoft/Edge/User Data/Default/History",
        ]
    } else if browser.contains("firefox") {
        &[
            "Mozilla/Firefox/Profiles/*/places.sqlite",
            "Firefox/Profiles/*/places.sqlite",
        ]
    } else {
        &[]
    };

    let mut patterns: Vec<PathBuf> = bases
        .iter()
        .flat_map(|base| relative.iter().map(move |rel| base.join(rel)))
        .collect();
    if browser.contains("firefox")
        && let Some(home) = dirs::home_dir()
    {
        patterns.push(home.join(".mozilla/firefox/*/places.sqlite"));
    }

    let mut found = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.to_string_lossy().into_owned();
        if let Ok(paths) = glob::glob(&pattern) {
            found.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
        }
    }
    found.into_iter().collect()
}
