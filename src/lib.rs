//! peanut - scheduled cleanup, keyword redirects and batch file tools
//!
//! The library holds three engines sharing one [`PersistenceStore`]:
//! [`ScheduleEngine`] decides when a cleanup pass is due and runs it,
//! [`RuleEngine`] moves files into folders by keyword, and
//! [`BatchProcessor`] searches a tree and bulk deletes, copies or renames
//! the results.

pub mod batch;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_ops;
pub mod folders;
pub mod models;
pub mod output;
pub mod rules;
pub mod schedule;
pub mod store;

pub use batch::{BatchProcessor, BatchReport, RenameKind, RenameMode, Search};
pub use cleanup::{CategoryReport, CleanupError};
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use error::{EngineError, EngineResult};
pub use folders::{FolderResolver, WellKnownFolder};
pub use models::{
    CleanupCategory, CleanupSettings, CustomFolderAlias, ErrorRecord, Frequency, Preferences,
    RedirectRule, SystemInfo,
};
pub use rules::{ApplyReport, RuleEngine};
pub use schedule::{Clock, FixedClock, PassReport, ScheduleEngine, SystemClock};
pub use store::{PersistenceStore, StoreError};

pub use cli::{Cli, run_cli};
