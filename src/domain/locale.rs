//! Typed shapes of the JSON locale columns.
//!
//! Every locale-bearing column is decoded once, at load time, into one of
//! these records. Consumers only ever ask "value for gender G in language L"
//! through the accessors here.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// The two parallel content tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Emission order for the two rows of one affirmation
    pub const ALL: [Gender; 2] = [Gender::Female, Gender::Male];

    /// Value of the `gender` output column
    pub fn code(self) -> i64 {
        match self {
            Self::Female => 0,
            Self::Male => 1,
        }
    }

    /// Letter used in preview asset file names
    pub fn asset_code(self) -> &'static str {
        match self {
            Self::Female => "w",
            Self::Male => "m",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}

/// Language code -> value. Blank and `null` values count as absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Localized<T>(BTreeMap<String, T>);

impl<T> Default for Localized<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Localized<T> {
    pub fn get(&self, language: &str) -> Option<&T> {
        self.0.get(language)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<T> FromIterator<(String, T)> for Localized<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Localized<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<BTreeMap<String, Option<T>>> = Option::deserialize(deserializer)?;
        Ok(Self(
            raw.unwrap_or_default()
                .into_iter()
                .filter_map(|(lang, value)| value.map(|v| (lang, v)))
                .collect(),
        ))
    }
}

impl Localized<String> {
    /// Trimmed, non-empty text for a language
    pub fn text(&self, language: &str) -> Option<&str> {
        self.get(language).and_then(|s| non_blank(s))
    }
}

/// A pair of optional per-gender blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerGender<T> {
    #[serde(default)]
    pub female: Option<T>,
    #[serde(default)]
    pub male: Option<T>,
}

impl<T> Default for PerGender<T> {
    fn default() -> Self {
        Self {
            female: None,
            male: None,
        }
    }
}

impl<T> PerGender<T> {
    pub fn get(&self, gender: Gender) -> Option<&T> {
        match gender {
            Gender::Female => self.female.as_ref(),
            Gender::Male => self.male.as_ref(),
        }
    }
}

/// `categories.localization`
pub type CategoryLocalization = Localized<String>;

/// `coaches.coach_UI_description`
pub type CoachDescription = Localized<String>;

/// `subcategories.localization`
pub type SubcategoryLocalization = PerGender<SubcategoryTitles>;

/// One gender block of `subcategories.localization`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcategoryTitles {
    #[serde(default)]
    pub title: Option<TitleField>,
}

/// Titles are usually per-language, but some rows carry a single plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TitleField {
    PerLanguage(Localized<String>),
    Plain(String),
}

impl SubcategoryTitles {
    pub fn title(&self, language: &str) -> Option<&str> {
        match self.title.as_ref()? {
            TitleField::PerLanguage(map) => map.text(language),
            TitleField::Plain(text) => non_blank(text),
        }
    }
}

/// `affirmations_new.script`
pub type ScriptPayload = PerGender<Localized<ScriptEntry>>;

/// `affirmations_new.popular_aff`
pub type PopularPayload = PerGender<Localized<String>>;

/// `affirmations_new.aff_for_banners`
pub type BannerPayload = PerGender<Localized<BannerEntry>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

/// Banner lines for the three times of day; each slot may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerEntry {
    #[serde(default)]
    pub morning: Option<String>,
    #[serde(default)]
    pub afternoon: Option<String>,
    #[serde(default, rename = "late evening")]
    pub late_evening: Option<String>,
}

/// Trim and drop empty strings
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
