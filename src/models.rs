//! Persisted data model.
//!
//! Every durable entity lives here: user preferences, the cleanup schedule,
//! redirect rules, custom folder aliases, system information and the error log.
//! The store owns these rows; engines read them fresh on every operation.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of custom folder alias slots.
pub const CUSTOM_FOLDER_SLOTS: u8 = 3;

/// Placeholder strings the presentation layer shows in empty rule fields.
///
/// A field holding one of these is treated exactly like an empty field.
pub const RULE_PLACEHOLDERS: &[&str] = &["Redirect keyword", "-- from --", "to this folder"];

/// How often a cleanup pass should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Never,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Frequency {
    /// All frequencies, in menu order.
    pub const ALL: [Frequency; 6] = [
        Frequency::Never,
        Frequency::Day,
        Frequency::Week,
        Frequency::Month,
        Frequency::Quarter,
        Frequency::Year,
    ];

    /// The time between two passes, or `None` for [`Frequency::Never`].
    ///
    /// ```
    /// use peanut::models::Frequency;
    /// use chrono::TimeDelta;
    ///
    /// assert_eq!(Frequency::Week.interval(), Some(TimeDelta::days(7)));
    /// assert_eq!(Frequency::Never.interval(), None);
    /// ```
    pub fn interval(&self) -> Option<TimeDelta> {
        match self {
            Frequency::Never => None,
            Frequency::Day => Some(TimeDelta::days(1)),
            Frequency::Week => Some(TimeDelta::days(7)),
            Frequency::Month => Some(TimeDelta::days(30)),
            Frequency::Quarter => Some(TimeDelta::days(91)),
            Frequency::Year => Some(TimeDelta::days(365)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Never => "never",
            Frequency::Day => "day",
            Frequency::Week => "week",
            Frequency::Month => "month",
            Frequency::Quarter => "quarter",
            Frequency::Year => "year",
        }
    }

    /// Parses a stored value, mapping anything unrecognised to `Never`.
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or(Frequency::Never)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| format!("unknown frequency '{}'", s))
    }
}

// Legacy or hand-edited stores may contain values we no longer know.
impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .map(Frequency::parse_lossy)
            .unwrap_or_default())
    }
}

/// One of the cleanup categories a pass can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum CleanupCategory {
    EmptyFolders,
    UnusedFiles,
    DuplicateFiles,
    RecyclingBin,
    BrowserHistory,
}

impl CleanupCategory {
    /// Categories in the order a pass executes them.
    ///
    /// Files go before folders so that removing them can leave folders empty.
    pub const PASS_ORDER: [CleanupCategory; 5] = [
        CleanupCategory::DuplicateFiles,
        CleanupCategory::UnusedFiles,
        CleanupCategory::EmptyFolders,
        CleanupCategory::RecyclingBin,
        CleanupCategory::BrowserHistory,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CleanupCategory::EmptyFolders => "Empty folders",
            CleanupCategory::UnusedFiles => "Unused files",
            CleanupCategory::DuplicateFiles => "Duplicate files",
            CleanupCategory::RecyclingBin => "Recycling bin",
            CleanupCategory::BrowserHistory => "Browser history",
        }
    }
}

impl fmt::Display for CleanupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Appearance preferences and installation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_ui_scale")]
    pub ui_scale_percent: u32,
    #[serde(default)]
    pub status: i64,
}

fn default_theme() -> String {
    "system".to_string()
}

fn default_ui_scale() -> u32 {
    100
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            ui_scale_percent: default_ui_scale(),
            status: 0,
        }
    }
}

/// Cleanup category flags plus the schedule.
///
/// `next_trigger` is `None` exactly when `frequency` is `Never`; the schedule
/// engine restores that whenever it reads a row that violates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSettings {
    #[serde(default)]
    pub empty_folders: bool,
    #[serde(default)]
    pub unused_files: bool,
    #[serde(default)]
    pub duplicate_files: bool,
    #[serde(default)]
    pub recycling_bin: bool,
    #[serde(default)]
    pub browser_history: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub next_trigger: Option<DateTime<Utc>>,
}

impl CleanupSettings {
    pub fn is_enabled(&self, category: CleanupCategory) -> bool {
        match category {
            CleanupCategory::EmptyFolders => self.empty_folders,
            CleanupCategory::UnusedFiles => self.unused_files,
            CleanupCategory::DuplicateFiles => self.duplicate_files,
            CleanupCategory::RecyclingBin => self.recycling_bin,
            CleanupCategory::BrowserHistory => self.browser_history,
        }
    }

    pub fn set_enabled(&mut self, category: CleanupCategory, enabled: bool) {
        let flag = match category {
            CleanupCategory::EmptyFolders => &mut self.empty_folders,
            CleanupCategory::UnusedFiles => &mut self.unused_files,
            CleanupCategory::DuplicateFiles => &mut self.duplicate_files,
            CleanupCategory::RecyclingBin => &mut self.recycling_bin,
            CleanupCategory::BrowserHistory => &mut self.browser_history,
        };
        *flag = enabled;
    }

    /// Enabled categories in pass order.
    pub fn enabled_categories(&self) -> Vec<CleanupCategory> {
        CleanupCategory::PASS_ORDER
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

/// A keyword-to-destination redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// Stable row id assigned by the store.
    #[serde(default)]
    pub id: u64,
    pub keyword: String,
    /// Folder alias ("Downloads", "Desktop", a custom folder) or a path.
    pub source: String,
    pub destination: String,
}

impl RedirectRule {
    /// Builds an unsaved rule, rejecting empty or placeholder fields.
    ///
    /// Fields are trimmed. The returned rule has id `0` until the store
    /// assigns one.
    pub fn new(keyword: &str, source: &str, destination: &str) -> EngineResult<Self> {
        let keyword = required_field("keyword", keyword)?;
        let source = required_field("source", source)?;
        let destination = required_field("destination", destination)?;

        Ok(Self {
            id: 0,
            keyword,
            source,
            destination,
        })
    }

    /// True when both rules describe the same (keyword, source, destination).
    pub fn same_triple(&self, other: &RedirectRule) -> bool {
        self.keyword == other.keyword
            && self.source == other.source
            && self.destination == other.destination
    }

    /// Case-insensitive substring match against a file name.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name
            .to_lowercase()
            .contains(&self.keyword.to_lowercase())
    }
}

fn required_field(field: &'static str, value: &str) -> EngineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid(field, "must not be empty"));
    }
    if RULE_PLACEHOLDERS.contains(&trimmed) {
        return Err(EngineError::invalid(
            field,
            format!("'{}' is a placeholder, not a value", trimmed),
        ));
    }
    Ok(trimmed.to_string())
}

/// A user-named folder occupying one of the three custom slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFolderAlias {
    pub slot: u8,
    pub display_name: String,
    pub path: String,
}

impl CustomFolderAlias {
    /// The label the rule editor shows for this slot.
    pub fn slot_label(slot: u8) -> String {
        format!("custom folder {}", slot)
    }
}

/// Machine details collected on first run.
///
/// Empty strings mean "not provided"; well-known folders then fall back to
/// the platform defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub main_browser: String,
    #[serde(default)]
    pub downloads_directory: String,
    #[serde(default)]
    pub desktop_directory: String,
    #[serde(default)]
    pub recycling_bin_directory: String,
}

/// One entry in the append-only error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}
