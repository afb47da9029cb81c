//! Source rows after JSON decoding.
//!
//! These mirror the four source tables one-to-one. Locale columns are
//! already typed; nothing downstream sees the raw encoded text.

use serde::{Deserialize, Serialize};

use super::locale::{
    BannerPayload, CategoryLocalization, CoachDescription, PopularPayload, ScriptPayload,
    SubcategoryLocalization,
};

/// A row of `categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub position: Option<i64>,
    pub localization: CategoryLocalization,
}

/// A row of `subcategories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: i64,
    pub position: Option<i64>,
    pub category_id: i64,
    pub localization: SubcategoryLocalization,
    pub shadow_w: Option<String>,
    pub shadow_m: Option<String>,
    pub views: Option<i64>,
    /// Tri-state: `None` means the column is NULL
    pub is_daily_suitable: Option<bool>,
}

/// A row of `coaches`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coach {
    pub id: i64,
    pub position: Option<i64>,
    pub coach_name: Option<String>,
    /// Version tag; also the fallback display name
    pub coach: Option<String>,
    pub description: CoachDescription,
}

/// A row of `affirmations_new`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffirmationSource {
    /// Row identity, used only to break position ties
    pub id: i64,
    pub sub_id: i64,
    pub coach_id: i64,
    pub position: Option<i64>,
    pub script: ScriptPayload,
    pub popular: PopularPayload,
    pub banners: BannerPayload,
}

/// Something ordered by `position`, ties broken by `id`
pub trait Positioned {
    fn id(&self) -> i64;
    fn position(&self) -> Option<i64>;
}

macro_rules! positioned {
    ($($ty:ty),*) => {
        $(impl Positioned for $ty {
            fn id(&self) -> i64 {
                self.id
            }
            fn position(&self) -> Option<i64> {
                self.position
            }
        })*
    };
}

positioned!(Category, Subcategory, Coach, AffirmationSource);

/// Sort by position ascending, NULL positions last, ties by id.
pub fn sort_by_position<T: Positioned>(rows: &mut [T]) {
    rows.sort_by_key(|row| (row.position().is_none(), row.position(), row.id()));
}

/// All rows read from the source store for one run
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub categories: Vec<Category>,
    pub subcategories: Vec<Subcategory>,
    pub coaches: Vec<Coach>,
    pub affirmations: Vec<AffirmationSource>,
}
