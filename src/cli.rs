//! Command-line interface.
//!
//! Parses the command tree with clap, opens the store named by the
//! configuration and dispatches to the engines. All printing happens here
//! and in [`crate::output`].

use crate::batch::{BatchProcessor, RenameKind, RenameMode};
use crate::config::AppConfig;
use crate::folders::{FolderResolver, alias_for_path};
use crate::models::{CUSTOM_FOLDER_SLOTS, CleanupCategory, Frequency};
use crate::output::OutputFormatter;
use crate::rules::RuleEngine;
use crate::schedule::ScheduleEngine;
use crate::store::PersistenceStore;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "peanut",
    about = "Scheduled cleanup, keyword redirects and batch file tools",
    version
)]
pub struct Cli {
    /// Configuration file (default: ./.peanut.toml, then ~/.config/peanut/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file, overriding the configuration
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Log what is being done
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the cleanup schedule, rule count and latest error
    Status,
    /// Run a cleanup pass if one is due
    Clean {
        /// Run even if the pass is not due
        #[arg(long)]
        force: bool,
    },
    /// Set how often cleanup runs
    Frequency { frequency: Frequency },
    /// Enable or disable a cleanup category
    Toggle {
        category: CleanupCategory,
        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },
    /// Manage keyword redirect rules
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
    /// Manage the custom folder slots
    Alias {
        #[command(subcommand)]
        action: AliasCommand,
    },
    /// Show or update machine details
    System {
        #[arg(long)]
        os: Option<String>,
        #[arg(long)]
        browser: Option<String>,
        #[arg(long)]
        downloads: Option<String>,
        #[arg(long)]
        desktop: Option<String>,
        #[arg(long)]
        recycle_bin: Option<String>,
    },
    /// Show or update display preferences
    Prefs {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        scale: Option<u32>,
        #[arg(long)]
        status: Option<i64>,
    },
    /// List files under ROOT whose name contains KEYWORD ("*" or "." for all)
    Search { root: PathBuf, keyword: String },
    /// Delete files or folders
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Copy files into a new folder inside Downloads
    Copy {
        folder: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rename files in place
    Rename {
        kind: RenameKind,
        /// Text to find, extension to replace, or + / - for prefix / suffix
        #[arg(allow_hyphen_values = true)]
        arg1: String,
        /// Replacement text, new extension, or text to insert
        #[arg(allow_hyphen_values = true)]
        arg2: String,
        #[arg(required = true, last = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the most recent error
    Error,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    List,
    Add {
        keyword: String,
        /// Downloads, Desktop, a custom folder name or "custom folder N"
        source: String,
        destination: String,
    },
    Remove { id: u64 },
    /// Remove every rule
    Clear,
    /// Move matching files now
    Apply,
}

#[derive(Debug, Subcommand)]
pub enum AliasCommand {
    List,
    Set { slot: u8, path: PathBuf },
}

/// Runs one parsed command.
///
/// # Errors
///
/// Returns configuration, store and invalid-input errors. Per-file failures
/// are printed as part of the command's report and are not errors.
pub fn run_cli(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let store = PersistenceStore::open(cli.store.clone().unwrap_or_else(|| config.store_path()));

    match cli.command {
        Command::Status => show_status(&store, &config),
        Command::Clean { force } => {
            let progress = OutputFormatter::create_progress_bar();
            let report = ScheduleEngine::new(&store, &config)
                .with_progress(progress)
                .run_pass(force)?;
            OutputFormatter::pass_summary(&report);
            Ok(())
        }
        Command::Frequency { frequency } => {
            let engine = ScheduleEngine::new(&store, &config);
            engine.set_frequency(frequency)?;
            OutputFormatter::success(&format!(
                "Cleanup runs {}; next pass in {}",
                frequency,
                engine.next_trigger_label()?
            ));
            Ok(())
        }
        Command::Toggle { category, off } => {
            ScheduleEngine::new(&store, &config).set_category(category, !off)?;
            let state = if off { "disabled" } else { "enabled" };
            OutputFormatter::success(&format!("{} {}", category, state));
            Ok(())
        }
        Command::Rules { action } => run_rules(&store, action),
        Command::Alias { action } => run_alias(&store, action),
        Command::System {
            os,
            browser,
            downloads,
            desktop,
            recycle_bin,
        } => {
            let mut info = store.get_system_info()?;
            let changed = [
                (&mut info.os, os),
                (&mut info.main_browser, browser),
                (&mut info.downloads_directory, downloads),
                (&mut info.desktop_directory, desktop),
                (&mut info.recycling_bin_directory, recycle_bin),
            ]
            .into_iter()
            .fold(false, |changed, (field, value)| match value {
                Some(value) => {
                    *field = value;
                    true
                }
                None => changed,
            });
            if changed {
                store.set_system_info(&info)?;
                OutputFormatter::success("System info saved");
            }
            OutputFormatter::header("SYSTEM");
            println!("  OS:            {}", info.os);
            println!("  Browser:       {}", info.main_browser);
            println!("  Downloads:     {}", info.downloads_directory);
            println!("  Desktop:       {}", info.desktop_directory);
            println!("  Recycling bin: {}", info.recycling_bin_directory);
            Ok(())
        }
        Command::Prefs {
            theme,
            scale,
            status,
        } => {
            let mut prefs = store.get_preferences()?;
            let changed = theme.is_some() || scale.is_some() || status.is_some();
            if let Some(theme) = theme {
                prefs.theme = theme;
            }
            if let Some(scale) = scale {
                prefs.ui_scale_percent = scale;
            }
            if let Some(status) = status {
                prefs.status = status;
            }
            if changed {
                store.set_preferences(&prefs)?;
                OutputFormatter::success("Preferences saved");
            }
            println!(
                "  theme = {}, scale = {}%, status = {}",
                prefs.theme, prefs.ui_scale_percent, prefs.status
            );
            Ok(())
        }
        Command::Search { root, keyword } => {
            let mut count = 0;
            for path in BatchProcessor::new(&store).search(&root, &keyword)? {
                OutputFormatter::plain(&path.display().to_string());
                count += 1;
            }
            OutputFormatter::info(&format!("{} files found", count));
            Ok(())
        }
        Command::Delete { paths } => {
            let report = batch(&store).delete(&paths)?;
            OutputFormatter::batch_summary("deleted", &report);
            Ok(())
        }
        Command::Copy { folder, paths } => {
            let report = batch(&store).copy(&paths, &folder)?;
            OutputFormatter::batch_summary("copied", &report);
            Ok(())
        }
        Command::Rename {
            kind,
            arg1,
            arg2,
            paths,
        } => {
            let mode = RenameMode::parse(kind, &arg1, &arg2)?;
            let report = batch(&store).rename(&paths, &mode)?;
            OutputFormatter::batch_summary("renamed", &report);
            Ok(())
        }
        Command::Error => {
            match store.get_latest_error()? {
                Some(record) => OutputFormatter::warning(&format!(
                    "{}  {}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.description
                )),
                None => OutputFormatter::success("No errors recorded"),
            }
            Ok(())
        }
    }
}

fn batch(store: &PersistenceStore) -> BatchProcessor<'_> {
    BatchProcessor::new(store).with_progress(OutputFormatter::create_progress_bar())
}

fn show_status(store: &PersistenceStore, config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let engine = ScheduleEngine::new(store, config);
    let settings = engine.settings()?;
    OutputFormatter::settings_table(&settings, &engine.next_trigger_label()?);
    if engine.is_due()? {
        OutputFormatter::warning("A cleanup pass is due; run `peanut clean`.");
    }

    let rules = store.get_redirects()?;
    OutputFormatter::plain(&format!("\n{} redirect rules", rules.len()));

    if let Some(record) = store.get_latest_error()? {
        OutputFormatter::warning(&format!("Latest error: {}", record.description));
    }
    Ok(())
}

fn run_rules(store: &PersistenceStore, action: RulesCommand) -> Result<(), Box<dyn Error>> {
    let engine = RuleEngine::new(store);
    match action {
        RulesCommand::List => OutputFormatter::rules_table(&engine.list()?),
        RulesCommand::Add {
            keyword,
            source,
            destination,
        } => match engine.add_rule(&keyword, &source, &destination)? {
            Some(id) => OutputFormatter::success(&format!("Added rule {}", id)),
            None => OutputFormatter::info("An identical rule already exists"),
        },
        RulesCommand::Remove { id } => {
            if engine.remove_rule(id)? {
                OutputFormatter::success(&format!("Removed rule {}", id));
            } else {
                OutputFormatter::warning(&format!("No rule with id {}", id));
            }
        }
        RulesCommand::Clear => {
            engine.clear()?;
            OutputFormatter::success("All rules removed");
        }
        RulesCommand::Apply => OutputFormatter::apply_summary(&engine.apply_stored()?),
    }
    Ok(())
}

fn run_alias(store: &PersistenceStore, action: AliasCommand) -> Result<(), Box<dyn Error>> {
    match action {
        AliasCommand::List => {
            let mut slots = Vec::new();
            for slot in 1..=CUSTOM_FOLDER_SLOTS {
                slots.push((slot, store.get_custom_folder(slot)?));
            }
            OutputFormatter::custom_folders(&slots);
            let choices = FolderResolver::new(store).source_choices()?;
            OutputFormatter::plain(&format!("\n  Rule sources: {}", choices.join(", ")));
        }
        AliasCommand::Set { slot, path } => {
            let path = std::path::absolute(&path)?;
            let alias = alias_for_path(slot, &path);
            if !store.set_custom_folder(&alias)? {
                return Err(format!("slot must be between 1 and {}", CUSTOM_FOLDER_SLOTS).into());
            }
            OutputFormatter::success(&format!(
                "Slot {} is now '{}'",
                slot, alias.display_name
            ));
        }
    }
    Ok(())
}
