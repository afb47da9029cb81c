//! Reading the relational source.
//!
//! A [`SourceStore`] hands back raw rows with locale columns still encoded.
//! The [`SourceLoader`] decodes every locale column, applies the coach
//! allow-list and the rank windows, and returns typed [`SourceRows`].

pub mod sqlite;

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::RangeSettings;
use crate::domain::source::{sort_by_position, Positioned};
use crate::domain::{AffirmationSource, Category, Coach, SourceRows, Subcategory};
use crate::error::{ExportError, Result};

pub use sqlite::SqliteSource;

/// Row of `categories` as stored
#[derive(Debug, Clone, PartialEq)]
pub struct RawCategory {
    pub id: i64,
    pub position: Option<i64>,
    pub localization: Option<String>,
}

/// Row of `subcategories` as stored
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubcategory {
    pub id: i64,
    pub position: Option<i64>,
    pub category_id: i64,
    pub localization: Option<String>,
    pub shadow_w: Option<String>,
    pub shadow_m: Option<String>,
    pub views: Option<i64>,
    pub is_daily_suitable: Option<bool>,
}

/// Row of `coaches` as stored
#[derive(Debug, Clone, PartialEq)]
pub struct RawCoach {
    pub id: i64,
    pub position: Option<i64>,
    pub coach_name: Option<String>,
    pub coach: Option<String>,
    pub description: Option<String>,
}

/// Row of `affirmations_new` as stored
#[derive(Debug, Clone, PartialEq)]
pub struct RawAffirmation {
    pub id: i64,
    pub sub_id: i64,
    pub coach_id: i64,
    pub position: Option<i64>,
    pub script: Option<String>,
    pub popular_aff: Option<String>,
    pub aff_for_banners: Option<String>,
}

macro_rules! raw_positioned {
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

raw_positioned!(RawCategory, RawSubcategory, RawAffirmation);

/// Access to the four source tables
pub trait SourceStore {
    fn categories(&self) -> Result<Vec<RawCategory>>;
    fn subcategories(&self) -> Result<Vec<RawSubcategory>>;
    fn coaches(&self) -> Result<Vec<RawCoach>>;
    fn affirmations(&self) -> Result<Vec<RawAffirmation>>;
}

/// Whether a malformed column aborts the run or is treated as empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Required(&'static str),
    Optional(&'static str),
}

/// Loads and filters source rows for one export run
pub struct SourceLoader<'a, S: SourceStore + ?Sized> {
    store: &'a S,
    range: RangeSettings,
    versions: &'a [String],
}

impl<'a, S: SourceStore + ?Sized> SourceLoader<'a, S> {
    pub fn new(store: &'a S, range: RangeSettings, versions: &'a [String]) -> Self {
        Self {
            store,
            range,
            versions,
        }
    }

    /// Read, filter and decode all four tables.
    ///
    /// Categories are ranked globally, subcategories within their category
    /// and affirmations within their (subcategory, coach) pair. Only rows
    /// that survive the windows are decoded.
    pub fn load(&self) -> Result<SourceRows> {
        let mut categories = self.store.categories()?;
        sort_by_position(&mut categories);
        let categories = self
            .range
            .categories
            .apply(categories)
            .into_iter()
            .map(decode_category)
            .collect::<Result<Vec<_>>>()?;

        let cat_ids: HashSet<i64> = categories.iter().map(|c| c.id).collect();
        let subcategories = self
            .store
            .subcategories()?
            .into_iter()
            .filter(|s| cat_ids.contains(&s.category_id))
            .collect::<Vec<_>>();
        let subcategories = rank_within(subcategories, |s| s.category_id, |rows| {
            self.range.subcategories.apply(rows)
        })
        .into_iter()
        .map(decode_subcategory)
        .collect::<Result<Vec<_>>>()?;

        let coaches = self.allowed_coaches()?;

        let sub_ids: HashSet<i64> = subcategories.iter().map(|s| s.id).collect();
        let coach_ids: HashSet<i64> = coaches.iter().map(|c| c.id).collect();
        let affirmations = self
            .store
            .affirmations()?
            .into_iter()
            .filter(|a| sub_ids.contains(&a.sub_id) && coach_ids.contains(&a.coach_id))
            .collect::<Vec<_>>();
        let affirmations = rank_within(affirmations, |a| (a.sub_id, a.coach_id), |rows| {
            self.range.positions.apply(rows)
        })
        .into_iter()
        .map(decode_affirmation)
        .collect::<Result<Vec<_>>>()?;

        info!(
            categories = categories.len(),
            subcategories = subcategories.len(),
            coaches = coaches.len(),
            affirmations = affirmations.len(),
            "Source rows loaded"
        );

        Ok(SourceRows {
            categories,
            subcategories,
            coaches,
            affirmations,
        })
    }

    /// Coaches whose version tag (or id) is on the allow-list
    fn allowed_coaches(&self) -> Result<Vec<Coach>> {
        if self.versions.is_empty() {
            warn!("No coach versions configured, nothing to export");
            return Ok(Vec::new());
        }
        let mut coaches = self
            .store
            .coaches()?
            .into_iter()
            .filter(|c| {
                self.versions.iter().any(|v| {
                    c.coach.as_deref().map(str::trim) == Some(v.as_str()) || c.id.to_string() == *v
                })
            })
            .map(decode_coach)
            .collect::<Result<Vec<_>>>()?;
        sort_by_position(&mut coaches);
        Ok(coaches)
    }
}

/// Group rows by key, order each group by position and apply `window` per group
fn rank_within<T, K>(rows: Vec<T>, key: impl Fn(&T) -> K, window: impl Fn(Vec<T>) -> Vec<T>) -> Vec<T>
where
    T: Positioned,
    K: Ord,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
        .into_values()
        .flat_map(|mut group| {
            sort_by_position(&mut group);
            window(group)
        })
        .collect()
}

fn decode_category(raw: RawCategory) -> Result<Category> {
    Ok(Category {
        localization: decode(
            raw.localization.as_deref(),
            "categories",
            raw.id,
            Column::Required("localization"),
        )?,
        id: raw.id,
        position: raw.position,
    })
}

fn decode_subcategory(raw: RawSubcategory) -> Result<Subcategory> {
    Ok(Subcategory {
        localization: decode(
            raw.localization.as_deref(),
            "subcategories",
            raw.id,
            Column::Required("localization"),
        )?,
        id: raw.id,
        position: raw.position,
        category_id: raw.category_id,
        shadow_w: raw.shadow_w,
        shadow_m: raw.shadow_m,
        views: raw.views,
        is_daily_suitable: raw.is_daily_suitable,
    })
}

fn decode_coach(raw: RawCoach) -> Result<Coach> {
    Ok(Coach {
        description: decode(
            raw.description.as_deref(),
            "coaches",
            raw.id,
            Column::Optional("coach_UI_description"),
        )?,
        id: raw.id,
        position: raw.position,
        coach_name: raw.coach_name,
        coach: raw.coach,
    })
}

fn decode_affirmation(raw: RawAffirmation) -> Result<AffirmationSource> {
    let table = "affirmations_new";
    Ok(AffirmationSource {
        script: decode(raw.script.as_deref(), table, raw.id, Column::Required("script"))?,
        popular: decode(
            raw.popular_aff.as_deref(),
            table,
            raw.id,
            Column::Optional("popular_aff"),
        )?,
        banners: decode(
            raw.aff_for_banners.as_deref(),
            table,
            raw.id,
            Column::Optional("aff_for_banners"),
        )?,
        id: raw.id,
        sub_id: raw.sub_id,
        coach_id: raw.coach_id,
        position: raw.position,
    })
}

/// Decode a JSON locale column.
///
/// NULL, blank and JSON `null` decode to the empty payload. A JSON string is
/// unwrapped and decoded again (double-encoded payloads). Anything that does
/// not parse or does not fit the expected shape is fatal for required
/// columns and treated as empty, with a warning, for optional ones.
fn decode<T>(raw: Option<&str>, table: &'static str, id: i64, column: Column) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(T::default());
    };

    match parse_payload(text) {
        Ok(value) => Ok(value),
        Err(reason) => match column {
            Column::Required(name) => Err(ExportError::MalformedSourceData {
                table,
                id,
                column: name,
                reason,
            }),
            Column::Optional(name) => {
                warn!(table, id, column = name, %reason, "Malformed optional locale column ignored");
                Ok(T::default())
            }
        },
    }
}

fn parse_payload<T>(text: &str) -> std::result::Result<T, String>
where
    T: DeserializeOwned + Default,
{
    let mut value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if let serde_json::Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(|e| e.to_string())?;
    }
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangeWindow;
    use crate::domain::Gender;

    #[derive(Default)]
    struct MemoryStore {
        categories: Vec<RawCategory>,
        subcategories: Vec<RawSubcategory>,
        coaches: Vec<RawCoach>,
        affirmations: Vec<RawAffirmation>,
    }

    impl SourceStore for MemoryStore {
        fn categories(&self) -> Result<Vec<RawCategory>> {
            Ok(self.categories.clone())
        }
        fn subcategories(&self) -> Result<Vec<RawSubcategory>> {
            Ok(self.subcategories.clone())
        }
        fn coaches(&self) -> Result<Vec<RawCoach>> {
            Ok(self.coaches.clone())
        }
        fn affirmations(&self) -> Result<Vec<RawAffirmation>> {
            Ok(self.affirmations.clone())
        }
    }

    fn raw_category(id: i64, position: i64, localization: &str) -> RawCategory {
        RawCategory {
            id,
            position: Some(position),
            localization: Some(localization.to_string()),
        }
    }

    fn raw_sub(id: i64, category_id: i64, position: i64) -> RawSubcategory {
        RawSubcategory {
            id,
            position: Some(position),
            category_id,
            localization: Some(r#"{"female": {"title": {"EN": "t"}}}"#.to_string()),
            shadow_w: None,
            shadow_m: None,
            views: None,
            is_daily_suitable: None,
        }
    }

    fn raw_coach(id: i64, tag: &str) -> RawCoach {
        RawCoach {
            id,
            position: Some(id),
            coach_name: None,
            coach: Some(tag.to_string()),
            description: None,
        }
    }

    fn raw_aff(id: i64, sub_id: i64, coach_id: i64, position: i64) -> RawAffirmation {
        RawAffirmation {
            id,
            sub_id,
            coach_id,
            position: Some(position),
            script: Some(r#"{"female": {"EN": {"title": "a", "script": "b"}}}"#.to_string()),
            popular_aff: None,
            aff_for_banners: None,
        }
    }

    #[test]
    fn test_ranges_apply_per_level() {
        let store = MemoryStore {
            categories: vec![
                raw_category(1, 1, "{}"),
                raw_category(2, 2, "{}"),
                raw_category(3, 3, "{}"),
            ],
            subcategories: vec![raw_sub(10, 1, 1), raw_sub(11, 1, 2), raw_sub(20, 2, 1), raw_sub(21, 2, 2)],
            coaches: vec![raw_coach(5, "v1")],
            affirmations: vec![
                raw_aff(1, 10, 5, 1),
                raw_aff(2, 10, 5, 2),
                raw_aff(3, 10, 5, 3),
                raw_aff(4, 20, 5, 1),
            ],
        };
        let range = RangeSettings {
            categories: RangeWindow::new(1, 2),
            subcategories: RangeWindow::new(1, 1),
            positions: RangeWindow::new(2, -1),
        };
        let versions = vec!["v1".to_string()];
        let rows = SourceLoader::new(&store, range, &versions).load().unwrap();

        let cat_ids: Vec<i64> = rows.categories.iter().map(|c| c.id).collect();
        assert_eq!(cat_ids, vec![1, 2]);
        // first subcategory of each category
        let sub_ids: Vec<i64> = rows.subcategories.iter().map(|s| s.id).collect();
        assert_eq!(sub_ids, vec![10, 20]);
        // positions from rank 2 within (10, 5); (20, 5) has only rank 1
        let aff_ids: Vec<i64> = rows.affirmations.iter().map(|a| a.id).collect();
        assert_eq!(aff_ids, vec![2, 3]);
    }

    #[test]
    fn test_version_allow_list() {
        let store = MemoryStore {
            coaches: vec![raw_coach(5, "v1"), raw_coach(6, "v2"), raw_coach(7, "legacy")],
            ..Default::default()
        };
        let versions = vec!["v2".to_string(), "7".to_string()];
        let rows = SourceLoader::new(&store, RangeSettings::default(), &versions)
            .load()
            .unwrap();
        let ids: Vec<i64> = rows.coaches.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 7]);

        let rows = SourceLoader::new(&store, RangeSettings::default(), &[]).load().unwrap();
        assert!(rows.coaches.is_empty());
    }

    #[test]
    fn test_malformed_required_column_is_fatal() {
        let store = MemoryStore {
            categories: vec![raw_category(3, 1, "{\"EN\": ")],
            ..Default::default()
        };
        let err = SourceLoader::new(&store, RangeSettings::default(), &[])
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::MalformedSourceData {
                table: "categories",
                id: 3,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rows_outside_windows_are_not_decoded() {
        let mut late = raw_aff(3, 10, 5, 2);
        late.script = Some("{broken".to_string());
        let mut sub = raw_sub(20, 2, 1);
        sub.localization = Some("{broken".to_string());
        let store = MemoryStore {
            categories: vec![raw_category(1, 1, "{}"), raw_category(2, 2, "{broken")],
            subcategories: vec![raw_sub(10, 1, 1), sub],
            coaches: vec![raw_coach(5, "v1")],
            affirmations: vec![raw_aff(1, 10, 5, 1), late],
        };
        let range = RangeSettings {
            categories: RangeWindow::new(1, 1),
            subcategories: RangeWindow::new(1, -1),
            positions: RangeWindow::new(1, 1),
        };
        let versions = vec!["v1".to_string()];
        let rows = SourceLoader::new(&store, range, &versions).load().unwrap();

        assert_eq!(rows.categories.len(), 1);
        let sub_ids: Vec<i64> = rows.subcategories.iter().map(|s| s.id).collect();
        assert_eq!(sub_ids, vec![10]);
        let aff_ids: Vec<i64> = rows.affirmations.iter().map(|a| a.id).collect();
        assert_eq!(aff_ids, vec![1]);
    }

    #[test]
    fn test_malformed_optional_column_is_empty() {
        let mut aff = raw_aff(1, 10, 5, 1);
        aff.popular_aff = Some("not json".to_string());
        let store = MemoryStore {
            categories: vec![raw_category(1, 1, "{}")],
            subcategories: vec![raw_sub(10, 1, 1)],
            coaches: vec![raw_coach(5, "v1")],
            affirmations: vec![aff],
        };
        let versions = vec!["v1".to_string()];
        let rows = SourceLoader::new(&store, RangeSettings::default(), &versions)
            .load()
            .unwrap();
        assert!(rows.affirmations[0].popular.get(Gender::Female).is_none());
    }

    #[test]
    fn test_double_encoded_payload() {
        let encoded = serde_json::to_string(r#"{"EN": "Sleep"}"#).unwrap();
        let store = MemoryStore {
            categories: vec![raw_category(1, 1, &encoded)],
            ..Default::default()
        };
        let rows = SourceLoader::new(&store, RangeSettings::default(), &[])
            .load()
            .unwrap();
        assert_eq!(rows.categories[0].localization.text("EN"), Some("Sleep"));
    }

    #[test]
    fn test_null_payloads_are_empty() {
        let mut category = raw_category(1, 1, "null");
        let store = MemoryStore {
            categories: vec![category.clone()],
            ..Default::default()
        };
        let rows = SourceLoader::new(&store, RangeSettings::default(), &[])
            .load()
            .unwrap();
        assert!(rows.categories[0].localization.is_empty());

        category.localization = None;
        let store = MemoryStore {
            categories: vec![category],
            ..Default::default()
        };
        let rows = SourceLoader::new(&store, RangeSettings::default(), &[])
            .load()
            .unwrap();
        assert!(rows.categories[0].localization.is_empty());
    }
}
