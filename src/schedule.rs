//! The cleanup schedule.
//!
//! Due-ness is checked on demand: nothing runs in the background, and a pass
//! that was missed for weeks still runs only once when next checked.

use crate::cleanup::{CategoryReport, Cleaner};
use crate::config::AppConfig;
use crate::error::{EngineError, EngineResult};
use crate::folders::{FolderResolver, WellKnownFolder};
use crate::models::{CleanupCategory, CleanupSettings, Frequency};
use crate::store::PersistenceStore;
use chrono::{DateTime, TimeDelta, Utc};
use indicatif::ProgressBar;
use log::{info, warn};
use std::cell::Cell;
use std::path::PathBuf;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// How one category of a pass ended.
#[derive(Debug)]
pub enum CategoryOutcome {
    Completed(CategoryReport),
    /// The category could not run at all.
    Failed(String),
}

/// Result of [`ScheduleEngine::run_pass`].
#[derive(Debug, Default)]
pub struct PassReport {
    /// False when the pass was skipped because it was not due.
    pub executed: bool,
    pub categories: Vec<(CleanupCategory, CategoryOutcome)>,
    pub next_trigger: Option<DateTime<Utc>>,
}

impl PassReport {
    pub fn files_removed(&self) -> usize {
        self.completed().map(|r| r.removed.len()).sum()
    }

    pub fn bytes_freed(&self) -> u64 {
        self.completed().map(|r| r.bytes_freed).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.categories
            .iter()
            .map(|(_, outcome)| match outcome {
                CategoryOutcome::Completed(report) => report.failures.len(),
                CategoryOutcome::Failed(_) => 1,
            })
            .sum()
    }

    fn completed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter_map(|(_, outcome)| match outcome {
            CategoryOutcome::Completed(report) => Some(report),
            CategoryOutcome::Failed(_) => None,
        })
    }
}

/// Owns the cleanup flags, the frequency and the next trigger time.
pub struct ScheduleEngine<'a, C: Clock = SystemClock> {
    store: &'a PersistenceStore,
    config: &'a AppConfig,
    clock: C,
    progress: ProgressBar,
}

impl<'a> ScheduleEngine<'a, SystemClock> {
    pub fn new(store: &'a PersistenceStore, config: &'a AppConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<'a, C: Clock> ScheduleEngine<'a, C> {
    pub fn with_clock(store: &'a PersistenceStore, config: &'a AppConfig, clock: C) -> Self {
        Self {
            store,
            config,
            clock,
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports pass progress on `progress`, one tick per category.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Current settings.
    ///
    /// A stored row where `next_trigger` disagrees with `frequency` is
    /// repaired and written back before it is returned.
    pub fn settings(&self) -> EngineResult<CleanupSettings> {
        let mut settings = self.store.get_cleanup_settings()?;
        let repaired = match (settings.frequency.interval(), settings.next_trigger) {
            (None, Some(_)) => {
                settings.next_trigger = None;
                true
            }
            (Some(interval), None) => {
                settings.next_trigger = Some(self.clock.now() + interval);
                true
            }
            _ => false,
        };
        if repaired {
            warn!("repairing inconsistent cleanup schedule");
            self.store.set_cleanup_settings(&settings)?;
        }
        Ok(settings)
    }

    /// Changes the frequency and restarts the countdown from now.
    pub fn set_frequency(&self, frequency: Frequency) -> EngineResult<CleanupSettings> {
        let mut settings = self.store.get_cleanup_settings()?;
        settings.frequency = frequency;
        settings.next_trigger = self.trigger_after(frequency, self.clock.now());
        self.store.set_cleanup_settings(&settings)?;
        info!("cleanup frequency set to {}", frequency);
        Ok(settings)
    }

    /// Enables or disables one category. The schedule is not touched.
    pub fn set_category(
        &self,
        category: CleanupCategory,
        enabled: bool,
    ) -> EngineResult<CleanupSettings> {
        let mut settings = self.settings()?;
        settings.set_enabled(category, enabled);
        self.store.set_cleanup_settings(&settings)?;
        Ok(settings)
    }

    /// Whether a scheduled pass should run now.
    pub fn is_due(&self) -> EngineResult<bool> {
        let settings = self.settings()?;
        Ok(matches!(settings.next_trigger, Some(at) if self.clock.now() >= at))
    }

    /// Time left until the next pass; zero when already due, `None` when
    /// the schedule is off.
    pub fn time_until_next(&self) -> EngineResult<Option<TimeDelta>> {
        let settings = self.settings()?;
        Ok(settings
            .next_trigger
            .map(|at| (at - self.clock.now()).max(TimeDelta::zero())))
    }

    /// `"2 days 3 hours 15 minutes"`, or `"N/A"` when the schedule is off.
    pub fn next_trigger_label(&self) -> EngineResult<String> {
        Ok(remaining_label(self.time_until_next()?))
    }

    /// Runs every enabled category if the pass is due, or unconditionally
    /// when `force` is set.
    ///
    /// Categories run independently; each failure is appended to the error
    /// log and the remaining categories still run. The next trigger is
    /// recomputed from the time the pass finishes.
    pub fn run_pass(&self, force: bool) -> EngineResult<PassReport> {
        if !force && !self.is_due()? {
            return Ok(PassReport::default());
        }

        let settings = self.settings()?;
        let categories = settings.enabled_categories();
        let filters = self
            .config
            .compile_filters()
            .map_err(|e| EngineError::invalid("filters", e.to_string()))?;
        let cleaner = Cleaner::new(
            self.config,
            filters,
            &self.store.get_system_info()?,
            self.cleanup_roots()?,
            self.clock.now(),
        );

        self.progress.set_length(categories.len() as u64);
        let mut report = PassReport {
            executed: true,
            ..Default::default()
        };

        for category in categories {
            self.progress.set_message(category.label());
            let outcome = match cleaner.run(category) {
                Ok(category_report) => {
                    for (path, reason) in &category_report.failures {
                        self.store.append_error(&format!(
                            "{}: could not remove {}: {}",
                            category.label(),
                            path.display(),
                            reason
                        ))?;
                    }
                    CategoryOutcome::Completed(category_report)
                }
                Err(e) => {
                    warn!("{} failed: {}", category.label(), e);
                    self.store
                        .append_error(&format!("{}: {}", category.label(), e))?;
                    CategoryOutcome::Failed(e.to_string())
                }
            };
            report.categories.push((category, outcome));
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let mut settings = self.store.get_cleanup_settings()?;
        settings.next_trigger = self.trigger_after(settings.frequency, self.clock.now());
        self.store.set_cleanup_settings(&settings)?;
        report.next_trigger = settings.next_trigger;

        info!(
            "cleanup pass finished: {} removed, {} failures",
            report.files_removed(),
            report.failure_count()
        );
        Ok(report)
    }

    fn trigger_after(&self, frequency: Frequency, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        frequency.interval().map(|interval| now + interval)
    }

    /// Configured roots, or the Downloads and Desktop folders.
    fn cleanup_roots(&self) -> EngineResult<Vec<PathBuf>> {
        if !self.config.cleanup.roots.is_empty() {
            return Ok(self.config.cleanup.roots.clone());
        }
        let resolver = FolderResolver::new(self.store);
        let mut roots = Vec::new();
        for folder in [WellKnownFolder::Downloads, WellKnownFolder::Desktop] {
            if let Some(path) = resolver.well_known(folder)? {
                roots.push(path);
            }
        }
        Ok(roots)
    }
}

/// Formats a remaining duration the way the status screen shows it.
pub fn remaining_label(remaining: Option<TimeDelta>) -> String {
    match remaining {
        None => "N/A".to_string(),
        Some(delta) => format!(
            "{} days {} hours {} minutes",
            delta.num_days(),
            delta.num_hours() % 24,
            delta.num_minutes() % 60
        ),
    }
}
