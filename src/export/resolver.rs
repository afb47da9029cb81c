//! Locale and gender fallback rules.
//!
//! Pure functions over decoded source rows for one target language. Each
//! rule says whether the value was found directly, found through a
//! fallback, or is absent; the traversal decides what absence means
//! (exclude the node, drop the row, or write NULL).

use crate::domain::locale::non_blank;
use crate::domain::{AffirmationSource, Category, Coach, Gender, Subcategory};

/// Outcome of a fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The preferred source had a value
    Found(T),
    /// The preferred source was empty; a fallback had a value
    FellBack(T),
    /// Nothing in the chain had a value
    Absent,
}

impl<T> Resolution<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Self::Found(v) | Self::FellBack(v) => Some(v),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    fn chain(preferred: Option<T>, fallback: impl FnOnce() -> Option<T>) -> Self {
        match preferred {
            Some(v) => Self::Found(v),
            None => fallback().map_or(Self::Absent, Self::FellBack),
        }
    }
}

/// Texts for one gender row of an affirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAffirmation<'a> {
    pub title: &'a str,
    pub script: &'a str,
    pub subtitle: &'a str,
    pub morning: Option<&'a str>,
    pub afternoon: Option<&'a str>,
    pub evening: Option<&'a str>,
}

/// Why a gender row of an affirmation is or isn't emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffirmationResolution<'a> {
    Resolved(ResolvedAffirmation<'a>),
    /// `script[gender][lang]` lacks a title or a script
    MissingScript,
    /// Title and script present, `popular_aff[gender][lang]` missing
    MissingSubtitle,
}

/// Resolution rules for one target language
#[derive(Debug, Clone, Copy)]
pub struct LocaleResolver<'a> {
    language: &'a str,
}

impl<'a> LocaleResolver<'a> {
    pub fn new(language: &'a str) -> Self {
        Self { language }
    }

    pub fn language(&self) -> &'a str {
        self.language
    }

    /// `localization[L]`; no fallback
    pub fn category_name<'c>(&self, category: &'c Category) -> Resolution<&'c str> {
        Resolution::chain(category.localization.text(self.language), || None)
    }

    /// Female title for L, else male title for L
    pub fn subcategory_name<'s>(&self, sub: &'s Subcategory) -> Resolution<&'s str> {
        let title = |gender| {
            sub.localization
                .get(gender)
                .and_then(|block| block.title(self.language))
        };
        Resolution::chain(title(Gender::Female), || title(Gender::Male))
    }

    /// `coach_name`, else `coach`. Same in every language.
    pub fn coach_name<'c>(&self, coach: &'c Coach) -> Resolution<&'c str> {
        Resolution::chain(coach.coach_name.as_deref().and_then(non_blank), || {
            coach.coach.as_deref().and_then(non_blank)
        })
    }

    /// `coach_UI_description[L]`, NULL when absent
    pub fn coach_description<'c>(&self, coach: &'c Coach) -> Option<&'c str> {
        coach.description.text(self.language)
    }

    /// Title, script, subtitle and banner lines for one gender
    pub fn affirmation<'s>(
        &self,
        source: &'s AffirmationSource,
        gender: Gender,
    ) -> AffirmationResolution<'s> {
        let entry = source
            .script
            .get(gender)
            .and_then(|langs| langs.get(self.language));
        let title = entry.and_then(|e| e.title.as_deref()).and_then(non_blank);
        let script = entry.and_then(|e| e.script.as_deref()).and_then(non_blank);
        let (Some(title), Some(script)) = (title, script) else {
            return AffirmationResolution::MissingScript;
        };

        let Some(subtitle) = source
            .popular
            .get(gender)
            .and_then(|langs| langs.text(self.language))
        else {
            return AffirmationResolution::MissingSubtitle;
        };

        let banner = source
            .banners
            .get(gender)
            .and_then(|langs| langs.get(self.language));
        let slot = |pick: fn(&crate::domain::locale::BannerEntry) -> &Option<String>| {
            banner.and_then(|b| pick(b).as_deref()).and_then(non_blank)
        };

        AffirmationResolution::Resolved(ResolvedAffirmation {
            title,
            script,
            subtitle,
            morning: slot(|b| &b.morning),
            afternoon: slot(|b| &b.afternoon),
            evening: slot(|b| &b.late_evening),
        })
    }
}

/// 1 when the source is `true` or NULL, 0 only when explicitly `false`
pub fn daily_suitable(sub: &Subcategory) -> i64 {
    match sub.is_daily_suitable {
        Some(false) => 0,
        Some(true) | None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(localization: &str, daily: Option<bool>) -> Subcategory {
        Subcategory {
            id: 7,
            position: Some(1),
            category_id: 3,
            localization: serde_json::from_str(localization).unwrap(),
            shadow_w: None,
            shadow_m: None,
            views: None,
            is_daily_suitable: daily,
        }
    }

    fn affirmation(script: &str, popular: &str, banners: &str) -> AffirmationSource {
        AffirmationSource {
            id: 1,
            sub_id: 7,
            coach_id: 2,
            position: Some(1),
            script: serde_json::from_str(script).unwrap(),
            popular: serde_json::from_str(popular).unwrap(),
            banners: serde_json::from_str(banners).unwrap(),
        }
    }

    #[test]
    fn test_category_name() {
        let category = Category {
            id: 3,
            position: Some(1),
            localization: serde_json::from_str(r#"{"EN": "Sleep", "RU": ""}"#).unwrap(),
        };
        assert_eq!(LocaleResolver::new("EN").category_name(&category), Resolution::Found("Sleep"));
        assert!(LocaleResolver::new("RU").category_name(&category).is_absent());
    }

    #[test]
    fn test_subcategory_prefers_female_then_male() {
        let s = sub(
            r#"{"female": {"title": {"EN": "Her"}}, "male": {"title": {"EN": "His", "RU": "Его"}}}"#,
            None,
        );
        assert_eq!(LocaleResolver::new("EN").subcategory_name(&s), Resolution::Found("Her"));
        assert_eq!(LocaleResolver::new("RU").subcategory_name(&s), Resolution::FellBack("Его"));
        assert!(LocaleResolver::new("DE").subcategory_name(&s).is_absent());
    }

    #[test]
    fn test_coach_name_and_description() {
        let mut coach = Coach {
            id: 2,
            position: Some(1),
            coach_name: Some("  ".to_string()),
            coach: Some("Anna".to_string()),
            description: serde_json::from_str(r#"{"EN": "Gentle"}"#).unwrap(),
        };
        let en = LocaleResolver::new("EN");
        assert_eq!(en.coach_name(&coach), Resolution::FellBack("Anna"));
        assert_eq!(en.coach_description(&coach), Some("Gentle"));
        assert_eq!(LocaleResolver::new("RU").coach_description(&coach), None);

        coach.coach_name = Some("Anna K.".to_string());
        assert_eq!(en.coach_name(&coach), Resolution::Found("Anna K."));
    }

    #[test]
    fn test_daily_suitable_tri_state() {
        assert_eq!(daily_suitable(&sub("{}", Some(true))), 1);
        assert_eq!(daily_suitable(&sub("{}", None)), 1);
        assert_eq!(daily_suitable(&sub("{}", Some(false))), 0);
    }

    #[test]
    fn test_affirmation_resolved_with_partial_banners() {
        let aff = affirmation(
            r#"{"female": {"EN": {"title": "T", "script": "S"}}}"#,
            r#"{"female": {"EN": "Sub"}}"#,
            r#"{"female": {"EN": {"afternoon": "Noon", "late evening": "Night"}}}"#,
        );
        let AffirmationResolution::Resolved(row) = LocaleResolver::new("EN").affirmation(&aff, Gender::Female)
        else {
            panic!("expected resolved row");
        };
        assert_eq!(row.title, "T");
        assert_eq!(row.script, "S");
        assert_eq!(row.subtitle, "Sub");
        assert_eq!(row.morning, None);
        assert_eq!(row.afternoon, Some("Noon"));
        assert_eq!(row.evening, Some("Night"));
    }

    #[test]
    fn test_missing_subtitle_drops_row_even_with_script() {
        let aff = affirmation(
            r#"{"male": {"EN": {"title": "T", "script": "S"}}}"#,
            r#"{"female": {"EN": "Sub"}}"#,
            "{}",
        );
        assert_eq!(
            LocaleResolver::new("EN").affirmation(&aff, Gender::Male),
            AffirmationResolution::MissingSubtitle
        );
    }

    #[test]
    fn test_missing_title_or_script() {
        let aff = affirmation(
            r#"{"female": {"EN": {"title": "T"}}, "male": {"EN": {"script": "S"}}}"#,
            r#"{"female": {"EN": "Sub"}, "male": {"EN": "Sub"}}"#,
            "{}",
        );
        let en = LocaleResolver::new("EN");
        assert_eq!(en.affirmation(&aff, Gender::Female), AffirmationResolution::MissingScript);
        assert_eq!(en.affirmation(&aff, Gender::Male), AffirmationResolution::MissingScript);
    }
}
