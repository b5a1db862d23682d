//! Folder alias resolution.
//!
//! Rules and batch copies name folders the way the user sees them:
//! "Downloads", "Desktop", a custom folder's display name or its slot label
//! ("custom folder 2"). This module turns those names into concrete paths,
//! reading the store on every call.

use crate::models::{CUSTOM_FOLDER_SLOTS, CustomFolderAlias, SystemInfo};
use crate::store::{PersistenceStore, StoreResult};
use std::path::{Path, PathBuf};

/// The folders every installation has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownFolder {
    Downloads,
    Desktop,
}

impl WellKnownFolder {
    pub fn name(&self) -> &'static str {
        match self {
            WellKnownFolder::Downloads => "Downloads",
            WellKnownFolder::Desktop => "Desktop",
        }
    }

    pub fn from_alias(alias: &str) -> Option<Self> {
        [WellKnownFolder::Downloads, WellKnownFolder::Desktop]
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(alias.trim()))
    }

    /// Location of this folder, preferring the directory saved in
    /// [`SystemInfo`] over the platform default.
    pub fn locate(&self, info: &SystemInfo) -> Option<PathBuf> {
        let saved = match self {
            WellKnownFolder::Downloads => &info.downloads_directory,
            WellKnownFolder::Desktop => &info.desktop_directory,
        };
        if !saved.trim().is_empty() {
            return Some(PathBuf::from(saved.trim()));
        }

        let platform = match self {
            WellKnownFolder::Downloads => dirs::download_dir(),
            WellKnownFolder::Desktop => dirs::desktop_dir(),
        };
        platform.or_else(|| dirs::home_dir().map(|home| home.join(self.name())))
    }
}

/// Resolves folder aliases against the store.
pub struct FolderResolver<'a> {
    store: &'a PersistenceStore,
}

impl<'a> FolderResolver<'a> {
    pub fn new(store: &'a PersistenceStore) -> Self {
        Self { store }
    }

    /// Resolves `alias` to a path.
    ///
    /// Tried in order: well-known folder names, custom folder display names
    /// and slot labels (case-insensitive), then the alias itself when it is
    /// an absolute path. Returns `None` when nothing matches.
    pub fn resolve(&self, alias: &str) -> StoreResult<Option<PathBuf>> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Ok(None);
        }

        if let Some(folder) = WellKnownFolder::from_alias(alias) {
            return Ok(folder.locate(&self.store.get_system_info()?));
        }

        let custom = self.store.get_custom_folders()?;
        if let Some(found) = match_custom(&custom, alias) {
            return Ok(Some(PathBuf::from(&found.path)));
        }

        let as_path = Path::new(alias);
        if as_path.is_absolute() {
            return Ok(Some(as_path.to_path_buf()));
        }

        Ok(None)
    }

    /// Location of a well-known folder.
    pub fn well_known(&self, folder: WellKnownFolder) -> StoreResult<Option<PathBuf>> {
        Ok(folder.locate(&self.store.get_system_info()?))
    }

    /// The names a rule source can use, in the order the rule editor lists them.
    pub fn source_choices(&self) -> StoreResult<Vec<String>> {
        let custom = self.store.get_custom_folders()?;
        let mut choices = vec![
            WellKnownFolder::Downloads.name().to_string(),
            WellKnownFolder::Desktop.name().to_string(),
        ];
        for slot in 1..=CUSTOM_FOLDER_SLOTS {
            match custom.iter().find(|f| f.slot == slot) {
                Some(f) if !f.display_name.is_empty() => choices.push(f.display_name.clone()),
                _ => choices.push(CustomFolderAlias::slot_label(slot)),
            }
        }
        Ok(choices)
    }
}

fn match_custom<'c>(custom: &'c [CustomFolderAlias], alias: &str) -> Option<&'c CustomFolderAlias> {
    custom
        .iter()
        .filter(|f| !f.path.trim().is_empty())
        .find(|f| {
            f.display_name.eq_ignore_ascii_case(alias)
                || CustomFolderAlias::slot_label(f.slot).eq_ignore_ascii_case(alias)
        })
}

/// Builds the alias for a folder picked by path; the display name is the
/// folder's base name.
pub fn alias_for_path(slot: u8, path: &Path) -> CustomFolderAlias {
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    CustomFolderAlias {
        slot,
        display_name,
        path: path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, PersistenceStore) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = PersistenceStore::open(temp_dir.path().join("store.json"));
        (temp_dir, store)
    }

    #[test]
    fn test_well_known_prefers_saved_directory() {
        let (dir, store) = temp_store();
        let downloads = dir.path().join("dl");
        store
            .set_system_info(&SystemInfo {
                downloads_directory: downloads.to_string_lossy().into_owned(),
                ..Default::default()
            })
            .unwrap();

        let resolver = FolderResolver::new(&store);
        assert_eq!(resolver.resolve("downloads").unwrap(), Some(downloads));
    }

    #[test]
    fn test_custom_folder_by_name_and_slot_label() {
        let (dir, store) = temp_store();
        let music = dir.path().join("Music");
        store.set_custom_folder(&alias_for_path(2, &music)).unwrap();

        let resolver = FolderResolver::new(&store);
        assert_eq!(resolver.resolve("Music").unwrap(), Some(music.clone()));
        assert_eq!(resolver.resolve("custom folder 2").unwrap(), Some(music));
        assert_eq!(resolver.resolve("custom folder 1").unwrap(), None);
    }

    #[test]
    fn test_absolute_path_resolves_to_itself() {
        let (dir, store) = temp_store();
        let resolver = FolderResolver::new(&store);
        assert_eq!(
            resolver.resolve(&dir.path().to_string_lossy()).unwrap(),
            Some(dir.path().to_path_buf())
        );
        assert_eq!(resolver.resolve("not a folder").unwrap(), None);
        assert_eq!(resolver.resolve("").unwrap(), None);
    }

    #[test]
    fn test_source_choices_fill_unused_slots() {
        let (dir, store) = temp_store();
        store
            .set_custom_folder(&alias_for_path(1, &dir.path().join("Work")))
            .unwrap();

        let choices = FolderResolver::new(&store).source_choices().unwrap();
        assert_eq!(
            choices,
            vec!["Downloads", "Desktop", "Work", "custom folder 2", "custom folder 3"]
        );
    }
}
