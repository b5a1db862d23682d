//! Keyword redirect rules.
//!
//! A rule moves files whose name contains its keyword from a source folder
//! into a destination folder. Rules are applied on demand by scanning the
//! source folders; there is no filesystem watcher.

use crate::error::EngineResult;
use crate::file_ops::{describe_io_error, file_name_of, move_into};
use crate::folders::FolderResolver;
use crate::models::RedirectRule;
use crate::store::PersistenceStore;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of [`RuleEngine::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// (original path, new path) for every moved file.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Rules whose source folder could not be found, with the reason.
    pub skipped_rules: Vec<(u64, String)>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct RuleEngine<'a> {
    store: &'a PersistenceStore,
}

impl<'a> RuleEngine<'a> {
    pub fn new(store: &'a PersistenceStore) -> Self {
        Self { store }
    }

    /// Validates and stores a rule.
    ///
    /// Returns the new rule's id, or `None` when an identical rule already
    /// exists.
    pub fn add_rule(
        &self,
        keyword: &str,
        source: &str,
        destination: &str,
    ) -> EngineResult<Option<u64>> {
        let rule = RedirectRule::new(keyword, source, destination)?;
        let id = self.store.add_redirect(&rule)?;
        match id {
            Some(id) => info!("added rule {} ('{}' from {})", id, rule.keyword, rule.source),
            None => debug!("rule '{}' already exists", rule.keyword),
        }
        Ok(id)
    }

    /// Stored rules in insertion order.
    pub fn list(&self) -> EngineResult<Vec<RedirectRule>> {
        Ok(self.store.get_redirects()?)
    }

    /// Deletes exactly one rule. Returns false when no rule has `id`.
    pub fn remove_rule(&self, id: u64) -> EngineResult<bool> {
        Ok(self.store.remove_redirect(id)?)
    }

    pub fn clear(&self) -> EngineResult<()> {
        Ok(self.store.clear_all_redirects()?)
    }

    /// Applies every stored rule.
    pub fn apply_stored(&self) -> EngineResult<ApplyReport> {
        let rules = self.list()?;
        self.apply(&rules)
    }

    /// Moves matching files for each rule, in order.
    ///
    /// A file matching several rules is moved by the first one only, and no
    /// file is moved twice in one call. Name clashes at the destination are
    /// disambiguated. Files that disappear before they are moved are skipped
    /// silently; other per-file failures are logged to the error log.
    pub fn apply(&self, rules: &[RedirectRule]) -> EngineResult<ApplyReport> {
        let resolver = FolderResolver::new(self.store);
        let mut report = ApplyReport::default();
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for rule in rules {
            let Some(source) = resolver.resolve(&rule.source)? else {
                self.skip_rule(&mut report, rule, format!("unknown folder '{}'", rule.source))?;
                continue;
            };
            if !source.is_dir() {
                self.skip_rule(
                    &mut report,
                    rule,
                    format!("{} does not exist", source.display()),
                )?;
                continue;
            }
            let destination = resolver
                .resolve(&rule.destination)?
                .unwrap_or_else(|| PathBuf::from(&rule.destination));
            if same_dir(&source, &destination) {
                debug!("rule {} moves into its own source, skipping", rule.id);
                continue;
            }

            for file in matching_files(&source, rule) {
                if claimed.contains(&file) {
                    continue;
                }
                match move_into(&file, &destination) {
                    Ok(target) => {
                        debug!("moved {} -> {}", file.display(), target.display());
                        claimed.insert(file.clone());
                        claimed.insert(target.clone());
                        report.moved.push((file, target));
                    }
                    Err(e) if !file.exists() => {
                        debug!("{} vanished before it could be moved: {}", file.display(), e);
                    }
                    Err(e) => {
                        let reason = describe_io_error(&e);
                        warn!("could not move {}: {}", file.display(), reason);
                        self.store.append_error(&format!(
                            "Could not move {} to {}: {}",
                            file.display(),
                            destination.display(),
                            reason
                        ))?;
                        claimed.insert(file.clone());
                        report.failed.push((file, reason));
                    }
                }
            }
        }

        info!("rules applied: {} files moved", report.moved.len());
        Ok(report)
    }

    fn skip_rule(
        &self,
        report: &mut ApplyReport,
        rule: &RedirectRule,
        reason: String,
    ) -> EngineResult<()> {
        warn!("skipping rule '{}': {}", rule.keyword, reason);
        self.store
            .append_error(&format!("Rule '{}' skipped: {}", rule.keyword, reason))?;
        report.skipped_rules.push((rule.id, reason));
        Ok(())
    }
}

/// Direct children of `dir` that are files matching the rule, sorted by name.
fn matching_files(dir: &Path, rule: &RedirectRule) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| file_name_of(path).is_some_and(|name| rule.matches(&name)))
        .collect();
    files.sort();
    files
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folders::alias_for_path;
    use crate::models::SystemInfo;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: PersistenceStore,
        downloads: PathBuf,
        root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path().to_path_buf();
        let downloads = root.join("Downloads");
        fs::create_dir(&downloads).unwrap();
        let store = PersistenceStore::open(root.join("store.json"));
        store
            .set_system_info(&SystemInfo {
                downloads_directory: downloads.to_string_lossy().into_owned(),
                ..Default::default()
            })
            .unwrap();
        Fixture {
            _dir: dir,
            store,
            downloads,
            root,
        }
    }

    #[test]
    fn test_add_rule_rejects_placeholders() {
        let f = fixture();
        let engine = RuleEngine::new(&f.store);

        assert!(engine.add_rule("", "Downloads", "/tmp/x").is_err());
        assert!(engine
            .add_rule("invoice", "-- from --", "/tmp/x")
            .is_err());
        assert!(engine
            .add_rule("invoice", "Downloads", "to this folder")
            .is_err());
        assert!(engine.list().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rule_is_ignored() {
        let f = fixture();
        let engine = RuleEngine::new(&f.store);
        assert!(engine.add_rule("a", "Downloads", "/tmp/a").unwrap().is_some());
        assert!(engine.add_rule("a", "Downloads", "/tmp/a").unwrap().is_none());
        assert_eq!(engine.list().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_moves_case_insensitive_matches() {
        let f = fixture();
        fs::write(f.downloads.join("INVOICE-march.pdf"), "x").unwrap();
        fs::write(f.downloads.join("photo.jpg"), "x").unwrap();
        let bills = f.root.join("bills");

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("invoice", "Downloads", &bills.to_string_lossy())
            .unwrap();
        let report = engine.apply_stored().unwrap();

        assert_eq!(report.moved.len(), 1);
        assert!(bills.join("INVOICE-march.pdf").exists());
        assert!(f.downloads.join("photo.jpg").exists());
    }

    #[test]
    fn test_first_rule_wins() {
        let f = fixture();
        fs::write(f.downloads.join("tax_invoice.pdf"), "x").unwrap();
        let first = f.root.join("first");
        let second = f.root.join("second");

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("invoice", "Downloads", &first.to_string_lossy())
            .unwrap();
        engine
            .add_rule("tax", "Downloads", &second.to_string_lossy())
            .unwrap();
        engine.apply_stored().unwrap();

        assert!(first.join("tax_invoice.pdf").exists());
        assert!(!second.exists());
    }

    #[test]
    fn test_chained_rules_move_each_file_once() {
        let f = fixture();
        fs::write(f.downloads.join("report.txt"), "x").unwrap();
        let stage = f.root.join("stage");
        let final_dir = f.root.join("final");
        fs::create_dir(&stage).unwrap();

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("report", "Downloads", &stage.to_string_lossy())
            .unwrap();
        engine
            .add_rule("report", &stage.to_string_lossy(), &final_dir.to_string_lossy())
            .unwrap();
        let report = engine.apply_stored().unwrap();

        assert_eq!(report.moved.len(), 1);
        assert!(stage.join("report.txt").exists());
    }

    #[test]
    fn test_reapply_is_quiet() {
        let f = fixture();
        fs::write(f.downloads.join("song.mp3"), "x").unwrap();
        let music = f.root.join("Music");

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("song", "Downloads", &music.to_string_lossy())
            .unwrap();
        assert_eq!(engine.apply_stored().unwrap().moved.len(), 1);

        let again = engine.apply_stored().unwrap();
        assert!(again.moved.is_empty());
        assert!(again.failed.is_empty());
        assert_eq!(f.store.error_count().unwrap(), 0);
        assert!(music.join("song.mp3").exists());
    }

    #[test]
    fn test_collision_at_destination_is_disambiguated() {
        let f = fixture();
        let music = f.root.join("Music");
        fs::create_dir(&music).unwrap();
        fs::write(music.join("song.mp3"), "old").unwrap();
        fs::write(f.downloads.join("song.mp3"), "new").unwrap();

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("song", "Downloads", &music.to_string_lossy())
            .unwrap();
        engine.apply_stored().unwrap();

        assert_eq!(fs::read_to_string(music.join("song.mp3")).unwrap(), "old");
        assert_eq!(fs::read_to_string(music.join("song (1).mp3")).unwrap(), "new");
    }

    #[test]
    fn test_custom_folder_source_and_unknown_source() {
        let f = fixture();
        let work = f.root.join("Work");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("draft.doc"), "x").unwrap();
        f.store.set_custom_folder(&alias_for_path(1, &work)).unwrap();
        let docs = f.root.join("docs");

        let engine = RuleEngine::new(&f.store);
        engine
            .add_rule("draft", "custom folder 1", &docs.to_string_lossy())
            .unwrap();
        engine
            .add_rule("draft", "custom folder 3", &docs.to_string_lossy())
            .unwrap();
        let report = engine.apply_stored().unwrap();

        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.skipped_rules.len(), 1);
        assert!(docs.join("draft.doc").exists());
        assert_eq!(f.store.error_count().unwrap(), 1);
    }

    #[test]
    fn test_remove_rule_keeps_others() {
        let f = fixture();
        let engine = RuleEngine::new(&f.store);
        let a = engine.add_rule("a", "Downloads", "/tmp/a").unwrap().unwrap();
        engine.add_rule("b", "Downloads", "/tmp/b").unwrap();

        assert!(engine.remove_rule(a).unwrap());
        assert!(!engine.remove_rule(a).unwrap());
        let left = engine.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].keyword, "b");
    }
}
