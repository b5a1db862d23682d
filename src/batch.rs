//! Batch search and bulk file transforms.
//!
//! A search lazily walks a directory tree; the caller picks a subset of the
//! results and hands it to [`BatchProcessor::delete`], [`BatchProcessor::copy`]
//! or [`BatchProcessor::rename`]. Every transform runs over its whole input:
//! a bad path is recorded in the [`BatchReport`] and the error log, and the
//! batch carries on.

use crate::error::{EngineError, EngineResult};
use crate::file_ops::{
    copy_into, describe_io_error, ensure_dir, file_name_of, is_occupied, remove_path, split_name,
};
use crate::folders::{FolderResolver, WellKnownFolder};
use crate::store::PersistenceStore;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Keywords that match every file.
pub const WILDCARDS: [&str; 2] = ["*", "."];

/// Lazy sequence of files under a root whose names contain a keyword.
///
/// Unreadable directories are skipped.
pub struct Search {
    walker: walkdir::IntoIter,
    needle: Option<String>,
}

impl Search {
    fn new(root: &Path, keyword: &str) -> Self {
        let keyword = keyword.trim();
        let needle = if WILDCARDS.contains(&keyword) {
            None
        } else {
            Some(keyword.to_lowercase())
        };
        Self {
            walker: WalkDir::new(root).into_iter(),
            needle,
        }
    }

    fn accepts(&self, name: &str) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => name.to_lowercase().contains(needle),
        }
    }
}

impl Iterator for Search {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && self.accepts(&entry.file_name().to_string_lossy())
                    {
                        return Some(entry.into_path());
                    }
                }
                Err(e) => debug!("search skipped an entry: {}", e),
            }
        }
    }
}

/// Where prefix/suffix text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// `+`
    Prefix,
    /// `-`; inserted before the extension.
    Suffix,
}

impl Placement {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "+" | "prefix" => Some(Placement::Prefix),
            "-" | "suffix" => Some(Placement::Suffix),
            _ => None,
        }
    }
}

/// Which rename transform to apply, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RenameKind {
    /// Replace a literal substring of the name
    Replace,
    /// Swap one extension for another
    Extension,
    /// Add a prefix (+) or suffix (-)
    Affix,
}

/// A validated rename transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameMode {
    FindReplace { find: String, replace: String },
    ConvertExtension { from: String, to: String },
    Affix { placement: Placement, text: String },
}

impl RenameMode {
    /// Builds a transform from its kind and two free-form arguments.
    ///
    /// Rejects empty required arguments and text containing path
    /// separators, since a rename must stay in its folder.
    pub fn parse(kind: RenameKind, arg1: &str, arg2: &str) -> EngineResult<Self> {
        let mode = match kind {
            RenameKind::Replace => {
                if arg1.is_empty() {
                    return Err(EngineError::invalid("find", "must not be empty"));
                }
                RenameMode::FindReplace {
                    find: arg1.to_string(),
                    replace: arg2.to_string(),
                }
            }
            RenameKind::Extension => {
                let from = arg1.trim().trim_start_matches('.');
                let to = arg2.trim().trim_start_matches('.');
                if from.is_empty() {
                    return Err(EngineError::invalid("from extension", "must not be empty"));
                }
                if to.is_empty() {
                    return Err(EngineError::invalid("to extension", "must not be empty"));
                }
                RenameMode::ConvertExtension {
                    from: from.to_string(),
                    to: to.to_string(),
                }
            }
            RenameKind::Affix => {
                let placement = Placement::parse(arg1).ok_or_else(|| {
                    EngineError::invalid("placement", format!("expected '+' or '-', got '{}'", arg1))
                })?;
                if arg2.is_empty() {
                    return Err(EngineError::invalid("text", "must not be empty"));
                }
                RenameMode::Affix {
                    placement,
                    text: arg2.to_string(),
                }
            }
        };

        let inserted = match &mode {
            RenameMode::FindReplace { replace, .. } => replace,
            RenameMode::ConvertExtension { to, .. } => to,
            RenameMode::Affix { text, .. } => text,
        };
        if inserted.contains(['/', '\\']) {
            return Err(EngineError::invalid("rename text", "must not contain path separators"));
        }
        Ok(mode)
    }

    /// The new base name, or `None` when the transform does not apply.
    pub fn rename(&self, name: &str) -> Option<String> {
        let renamed = match self {
            RenameMode::FindReplace { find, replace } => {
                if !name.contains(find.as_str()) {
                    return None;
                }
                name.replace(find.as_str(), replace)
            }
            RenameMode::ConvertExtension { from, to } => match split_name(name) {
                (stem, Some(ext)) if ext.eq_ignore_ascii_case(from) => format!("{}.{}", stem, to),
                _ => return None,
            },
            RenameMode::Affix {
                placement: Placement::Prefix,
                text,
            } => format!("{}{}", text, name),
            RenameMode::Affix {
                placement: Placement::Suffix,
                text,
            } => match split_name(name) {
                (stem, Some(ext)) => format!("{}{}.{}", stem, text, ext),
                (stem, None) => format!("{}{}", stem, text),
            },
        };
        if renamed.is_empty() || renamed == name {
            None
        } else {
            Some(renamed)
        }
    }
}

/// Outcome of one batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Paths produced by the operation (deleted, copied-to or renamed-to).
    pub completed: Vec<PathBuf>,
    /// Inputs left alone on purpose, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.failed.len()
    }
}

pub struct BatchProcessor<'a> {
    store: &'a PersistenceStore,
    progress: ProgressBar,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(store: &'a PersistenceStore) -> Self {
        Self {
            store,
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports progress on `progress`, one tick per input path.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Starts a search of `root` for files whose name contains `keyword`.
    ///
    /// `"*"` and `"."` match every file. Each call walks the tree afresh.
    pub fn search(&self, root: &Path, keyword: &str) -> EngineResult<Search> {
        if keyword.trim().is_empty() {
            return Err(EngineError::invalid("keyword", "must not be empty"));
        }
        if !root.is_dir() {
            return Err(EngineError::invalid(
                "root",
                format!("{} is not a folder", root.display()),
            ));
        }
        Ok(Search::new(root, keyword))
    }

    /// Deletes every path. Folders are removed with their contents.
    pub fn delete(&self, paths: &[PathBuf]) -> EngineResult<BatchReport> {
        let mut report = BatchReport::default();
        self.start(paths.len());
        for path in paths {
            match remove_path(path) {
                Ok(()) => {
                    debug!("deleted {}", path.display());
                    report.completed.push(path.clone());
                }
                Err(e) => self.fail(&mut report, path, "delete", &describe_io_error(&e))?,
            }
            self.progress.inc(1);
        }
        self.finish("delete", &report);
        Ok(report)
    }

    /// Copies every path into `folder_name` inside the Downloads folder.
    pub fn copy(&self, paths: &[PathBuf], folder_name: &str) -> EngineResult<BatchReport> {
        let folder_name = folder_name.trim();
        if folder_name.is_empty() {
            return Err(EngineError::invalid("folder name", "must not be empty"));
        }
        if folder_name.contains(['/', '\\']) || folder_name == "." || folder_name == ".." {
            return Err(EngineError::invalid(
                "folder name",
                format!("'{}' is not a plain folder name", folder_name),
            ));
        }

        let root = FolderResolver::new(self.store)
            .well_known(WellKnownFolder::Downloads)?
            .ok_or_else(|| EngineError::invalid("destination", "Downloads folder is unknown"))?;
        self.copy_into_dir(paths, &root.join(folder_name))
    }

    /// Copies every path into `dest`, creating it first.
    pub fn copy_into_dir(&self, paths: &[PathBuf], dest: &Path) -> EngineResult<BatchReport> {
        ensure_dir(dest).map_err(|e| EngineError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut report = BatchReport::default();
        self.start(paths.len());
        for path in paths {
            match copy_into(path, dest) {
                Ok(target) => {
                    debug!("copied {} -> {}", path.display(), target.display());
                    report.completed.push(target);
                }
                Err(e) => self.fail(&mut report, path, "copy", &describe_io_error(&e))?,
            }
            self.progress.inc(1);
        }
        self.finish("copy", &report);
        Ok(report)
    }

    /// Renames every path in place.
    ///
    /// Paths the transform does not apply to are skipped. A rename onto an
    /// existing name is skipped and logged, never overwritten.
    pub fn rename(&self, paths: &[PathBuf], mode: &RenameMode) -> EngineResult<BatchReport> {
        let mut report = BatchReport::default();
        self.start(paths.len());
        for path in paths {
            self.rename_one(&mut report, path, mode)?;
            self.progress.inc(1);
        }
        self.finish("rename", &report);
        Ok(report)
    }

    fn rename_one(
        &self,
        report: &mut BatchReport,
        path: &Path,
        mode: &RenameMode,
    ) -> EngineResult<()> {
        let Some(name) = file_name_of(path) else {
            return self.fail(report, path, "rename", "path has no file name");
        };
        if fs::symlink_metadata(path).is_err() {
            return self.fail(report, path, "rename", "not found");
        }
        let Some(new_name) = mode.rename(&name) else {
            report
                .skipped
                .push((path.to_path_buf(), "transform does not apply".to_string()));
            return Ok(());
        };

        let target = path.with_file_name(&new_name);
        if is_occupied(&target) {
            let reason = format!("{} already exists", new_name);
            warn!("not renaming {}: {}", path.display(), reason);
            self.store.append_error(&format!(
                "Could not rename {}: {}",
                path.display(),
                reason
            ))?;
            report.skipped.push((path.to_path_buf(), reason));
            return Ok(());
        }

        match fs::rename(path, &target) {
            Ok(()) => {
                debug!("renamed {} -> {}", path.display(), target.display());
                report.completed.push(target);
                Ok(())
            }
            Err(e) => self.fail(report, path, "rename", &describe_io_error(&e)),
        }
    }

    fn fail(
        &self,
        report: &mut BatchReport,
        path: &Path,
        action: &str,
        reason: &str,
    ) -> EngineResult<()> {
        warn!("could not {} {}: {}", action, path.display(), reason);
        self.store
            .append_error(&format!("Could not {} {}: {}", action, path.display(), reason))?;
        report.failed.push((path.to_path_buf(), reason.to_string()));
        Ok(())
    }

    fn start(&self, len: usize) {
        self.progress.set_position(0);
        self.progress.set_length(len as u64);
    }

    fn finish(&self, action: &str, report: &BatchReport) {
        self.progress.finish_and_clear();
        info!(
            "{}: {} done, {} skipped, {} failed",
            action,
            report.completed.len(),
            report.skipped.len(),
            report.failed.len()
        );
    }
}
