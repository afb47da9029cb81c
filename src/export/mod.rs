//! One language's export.
//!
//! A single depth-first pass over the content tree resolves every node for
//! the target language, checks preview presence, and hands one batch of rows
//! per category to the [`SnapshotWriter`].

pub mod assets;
pub mod resolver;
pub mod writer;

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::domain::{
    AffirmationRow, CategoryBatch, CategoryNode, CategoryProgress, CategoryRow, CoachEntry, CoachRow,
    ContentTree, Gender, OutputRow, ProgressSink, SubcategoryNode, SubcategoryRow,
};
use crate::error::{ExportError, Result};

pub use assets::{AssetKey, AssetPresenceChecker, PresenceFlags, TimeSlot};
pub use resolver::{daily_suitable, AffirmationResolution, LocaleResolver, Resolution};
pub use writer::{SnapshotCounts, SnapshotSummary, SnapshotWriter};

/// Rows left out of a snapshot, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    /// Categories without a name in the language
    pub categories: usize,
    /// Subcategories without a female or male title in the language
    pub subcategories: usize,
    /// Gender rows without title or script
    pub missing_script: usize,
    /// Gender rows without a subtitle
    pub missing_subtitle: usize,
}

/// Outcome of one successful language export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub language: String,
    pub snapshot: SnapshotSummary,
    pub dropped: DropCounts,
}

/// Export `tree` for `language` into a freshly created snapshot at `target`.
///
/// `cancel` is checked before each category; when set, the job stops with
/// [`ExportError::Cancelled`] and the partial file is left for the next
/// attempt to overwrite.
pub fn export_language(
    tree: &ContentTree,
    language: &str,
    target: &Path,
    assets: &AssetPresenceChecker,
    progress: &mut dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<JobReport> {
    let total = tree.categories.len();
    info!(lang = language, categories = total, file = %target.display(), "Export start");

    let mut writer = SnapshotWriter::create(target)?;
    let mut traversal = Traversal {
        resolver: LocaleResolver::new(language),
        assets,
        written_coaches: HashSet::new(),
        dropped: DropCounts::default(),
    };
    let mut running = CategoryProgress {
        categories_total: total,
        ..Default::default()
    };

    for node in &tree.categories {
        if cancel.load(Ordering::Relaxed) {
            warn!(lang = language, "Shutdown requested, export aborted");
            return Err(ExportError::Cancelled {
                language: language.to_string(),
            });
        }

        let Some(batch) = traversal.category(node) else {
            continue;
        };
        writer.write_batch(&batch)?;

        running.categories_done += 1;
        running.affirmations += batch.affirmation_count();
        progress.category_completed(language, &running);
    }

    let snapshot = writer.finish()?;
    info!(
        lang = language,
        file = %snapshot.path.display(),
        categories = snapshot.counts.categories,
        affirmations = snapshot.counts.affirmations,
        "Export completed"
    );

    Ok(JobReport {
        language: language.to_string(),
        snapshot,
        dropped: traversal.dropped,
    })
}

struct Traversal<'a> {
    resolver: LocaleResolver<'a>,
    assets: &'a AssetPresenceChecker,
    written_coaches: HashSet<i64>,
    dropped: DropCounts,
}

impl Traversal<'_> {
    /// Rows for one category, or `None` when it has no name in the language
    fn category(&mut self, node: &CategoryNode) -> Option<CategoryBatch> {
        let category = &node.category;
        let Some(name) = self.resolver.category_name(category).value() else {
            warn!(
                lang = self.resolver.language(),
                category_id = category.id,
                "Category has no localization, excluded"
            );
            self.dropped.categories += 1;
            return None;
        };

        let mut batch = CategoryBatch::default();
        batch.push(OutputRow::Category(CategoryRow {
            id: category.id,
            position: category.position,
            name: name.to_string(),
        }));

        for sub in &node.subcategories {
            self.subcategory(category.id, sub, &mut batch);
        }
        Some(batch)
    }

    fn subcategory(&mut self, category_id: i64, node: &SubcategoryNode, batch: &mut CategoryBatch) {
        let sub = &node.subcategory;
        let name = match self.resolver.subcategory_name(sub) {
            Resolution::Found(name) => name,
            Resolution::FellBack(name) => {
                debug!(lang = self.resolver.language(), sub_id = sub.id, "Subcategory uses male title");
                name
            }
            Resolution::Absent => {
                warn!(
                    lang = self.resolver.language(),
                    sub_id = sub.id,
                    category_id,
                    "Subcategory has no title, excluded"
                );
                self.dropped.subcategories += 1;
                return;
            }
        };

        batch.push(OutputRow::Subcategory(SubcategoryRow {
            id: sub.id,
            position: sub.position,
            name: name.to_string(),
            shadow_w: sub.shadow_w.clone().unwrap_or_default(),
            shadow_m: sub.shadow_m.clone().unwrap_or_default(),
            views: sub.views.unwrap_or(0),
            is_daily_suitable: daily_suitable(sub),
            category_id,
        }));

        for entry in &node.entries {
            self.coach(entry, batch);
            self.affirmations(category_id, sub.id, entry, batch);
        }
    }

    fn coach(&mut self, entry: &CoachEntry, batch: &mut CategoryBatch) {
        let coach = &entry.coach;
        if !self.written_coaches.insert(coach.id) {
            return;
        }
        let name = self.resolver.coach_name(coach).value().unwrap_or_else(|| {
            warn!(coach_id = coach.id, "Coach has no name");
            ""
        });
        let description = self.resolver.coach_description(coach);
        if description.is_none() {
            warn!(
                lang = self.resolver.language(),
                coach_id = coach.id,
                "Coach description missing, written as NULL"
            );
        }

        batch.push(OutputRow::Coach(CoachRow {
            id: coach.id,
            position: coach.position,
            name: name.to_string(),
            description: description.map(str::to_string),
        }));
    }

    fn affirmations(
        &mut self,
        category_id: i64,
        sub_id: i64,
        entry: &CoachEntry,
        batch: &mut CategoryBatch,
    ) {
        let language = self.resolver.language();
        for source in &entry.affirmations {
            for gender in Gender::ALL {
                let resolved = match self.resolver.affirmation(source, gender) {
                    AffirmationResolution::Resolved(resolved) => resolved,
                    AffirmationResolution::MissingScript => {
                        debug!(
                            lang = language,
                            sub_id,
                            coach_id = entry.coach.id,
                            position = ?source.position,
                            gender = gender.as_str(),
                            "No script for gender, row skipped"
                        );
                        self.dropped.missing_script += 1;
                        continue;
                    }
                    AffirmationResolution::MissingSubtitle => {
                        error!(
                            lang = language,
                            category_id,
                            sub_id,
                            coach = entry.coach.coach.as_deref().unwrap_or_default(),
                            position = ?source.position,
                            gender = gender.as_str(),
                            "Export skip: no popular affirmation"
                        );
                        self.dropped.missing_subtitle += 1;
                        continue;
                    }
                };

                let flags = self.assets.flags(&AssetKey {
                    category_id,
                    subcategory_id: sub_id,
                    coach_id: entry.coach.id,
                    position: source.position,
                    gender,
                    language,
                });

                batch.push(OutputRow::Affirmation(AffirmationRow {
                    sub_id,
                    coach_id: entry.coach.id,
                    position: source.position,
                    gender: gender.code(),
                    title: resolved.title.to_string(),
                    subtitle: resolved.subtitle.to_string(),
                    script: resolved.script.to_string(),
                    morning_aff: resolved.morning.map(str::to_string),
                    afternoon_aff: resolved.afternoon.map(str::to_string),
                    evening_aff: resolved.evening.map(str::to_string),
                    is_morning: flags.morning.into(),
                    is_afternoon: flags.afternoon.into(),
                    is_night: flags.night.into(),
                }));
            }
        }
    }
}
