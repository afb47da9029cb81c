//! Flattened, resolved rows written to a snapshot.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub id: i64,
    pub position: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryRow {
    pub id: i64,
    pub position: Option<i64>,
    pub name: String,
    pub shadow_w: String,
    pub shadow_m: String,
    pub views: i64,
    pub is_daily_suitable: i64,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoachRow {
    pub id: i64,
    pub position: Option<i64>,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffirmationRow {
    pub sub_id: i64,
    pub coach_id: i64,
    pub position: Option<i64>,
    /// 0 = female, 1 = male
    pub gender: i64,
    pub title: String,
    pub subtitle: String,
    pub script: String,
    pub morning_aff: Option<String>,
    pub afternoon_aff: Option<String>,
    pub evening_aff: Option<String>,
    pub is_morning: i64,
    pub is_afternoon: i64,
    pub is_night: i64,
}

/// Any row of the four snapshot tables, in write order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum OutputRow {
    Category(CategoryRow),
    Subcategory(SubcategoryRow),
    Coach(CoachRow),
    Affirmation(AffirmationRow),
}

/// Rows produced by one category of the traversal, committed together
#[derive(Debug, Clone, Default)]
pub struct CategoryBatch {
    pub rows: Vec<OutputRow>,
}

impl CategoryBatch {
    pub fn push(&mut self, row: OutputRow) {
        self.rows.push(row);
    }

    pub fn affirmation_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row, OutputRow::Affirmation(_)))
            .count()
    }
}
