//! The in-memory content tree.
//!
//! category -> ordered subcategories -> ordered (coach x affirmation) entries.
//! Built once per run from filtered [`SourceRows`] and never mutated after;
//! language jobs share it behind an `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::source::{sort_by_position, AffirmationSource, Category, Coach, SourceRows, Subcategory};

#[derive(Debug, Clone, Default)]
pub struct ContentTree {
    pub categories: Vec<CategoryNode>,
}

#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub category: Category,
    pub subcategories: Vec<SubcategoryNode>,
}

#[derive(Debug, Clone)]
pub struct SubcategoryNode {
    pub subcategory: Subcategory,
    /// One entry per coach that has affirmations here, in coach order
    pub entries: Vec<CoachEntry>,
}

#[derive(Debug, Clone)]
pub struct CoachEntry {
    pub coach: Arc<Coach>,
    /// Affirmations for this (subcategory, coach) pair, in position order
    pub affirmations: Vec<AffirmationSource>,
}

/// Size of a built tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub categories: usize,
    pub subcategories: usize,
    pub coaches: usize,
    pub affirmations: usize,
}

impl ContentTree {
    /// Join filtered source rows into a tree.
    ///
    /// Subcategories whose category is not in `rows.categories` are dropped
    /// silently (they are outside the configured range). Coach entries
    /// without affirmations, subcategories without entries and categories
    /// without subcategories are pruned.
    pub fn build(rows: SourceRows) -> Self {
        let SourceRows {
            mut categories,
            subcategories,
            mut coaches,
            affirmations,
        } = rows;

        sort_by_position(&mut categories);
        sort_by_position(&mut coaches);
        let coaches: Vec<Arc<Coach>> = coaches.into_iter().map(Arc::new).collect();

        let mut subs_by_category: HashMap<i64, Vec<Subcategory>> = HashMap::new();
        for sub in subcategories {
            subs_by_category.entry(sub.category_id).or_default().push(sub);
        }

        let mut affs_by_pair: HashMap<(i64, i64), Vec<AffirmationSource>> = HashMap::new();
        for aff in affirmations {
            affs_by_pair.entry((aff.sub_id, aff.coach_id)).or_default().push(aff);
        }

        let mut nodes = Vec::with_capacity(categories.len());
        for category in categories {
            let mut subs = subs_by_category.remove(&category.id).unwrap_or_default();
            sort_by_position(&mut subs);

            let mut sub_nodes = Vec::with_capacity(subs.len());
            for subcategory in subs {
                let mut entries = Vec::new();
                for coach in &coaches {
                    let Some(mut affirmations) = affs_by_pair.remove(&(subcategory.id, coach.id))
                    else {
                        continue;
                    };
                    sort_by_position(&mut affirmations);
                    entries.push(CoachEntry {
                        coach: Arc::clone(coach),
                        affirmations,
                    });
                }

                if entries.is_empty() {
                    debug!(sub_id = subcategory.id, "Subcategory has no affirmations, pruned");
                    continue;
                }
                sub_nodes.push(SubcategoryNode {
                    subcategory,
                    entries,
                });
            }

            if sub_nodes.is_empty() {
                debug!(category_id = category.id, "Category has no subcategories, pruned");
                continue;
            }
            nodes.push(CategoryNode {
                category,
                subcategories: sub_nodes,
            });
        }

        for (category_id, orphans) in subs_by_category {
            debug!(
                category_id,
                count = orphans.len(),
                "Subcategories outside the category range, skipped"
            );
        }

        Self { categories: nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn stats(&self) -> TreeStats {
        let mut coach_ids = BTreeSet::new();
        let mut stats = TreeStats {
            categories: self.categories.len(),
            ..Default::default()
        };
        for category in &self.categories {
            stats.subcategories += category.subcategories.len();
            for sub in &category.subcategories {
                for entry in &sub.entries {
                    coach_ids.insert(entry.coach.id);
                    stats.affirmations += entry.affirmations.len();
                }
            }
        }
        stats.coaches = coach_ids.len();
        stats
    }
}
