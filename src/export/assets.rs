//! Preview asset presence flags.
//!
//! Previews live flat in one directory, named
//! `<category_id>_<subcategory_id>_<coach_id>_<position>_<m|w>_<lang>_<slot>.webp`.
//! The directory is listed once per job; lookups are set membership.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::domain::Gender;

/// Time-of-day slots with a preview image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Night => "night",
        }
    }
}

/// Composite key of one gender row of an affirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetKey<'a> {
    pub category_id: i64,
    pub subcategory_id: i64,
    pub coach_id: i64,
    /// NULL positions are written as 0
    pub position: Option<i64>,
    pub gender: Gender,
    pub language: &'a str,
}

impl AssetKey<'_> {
    /// Expected preview file name for a slot
    pub fn file_name(&self, slot: TimeSlot) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}.webp",
            self.category_id,
            self.subcategory_id,
            self.coach_id,
            self.position.unwrap_or(0),
            self.gender.asset_code(),
            self.language.to_lowercase(),
            slot.as_str()
        )
    }
}

/// Three independent presence flags, as written to the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceFlags {
    pub morning: bool,
    pub afternoon: bool,
    pub night: bool,
}

/// Cached listing of the preview directory
#[derive(Debug, Clone, Default)]
pub struct AssetPresenceChecker {
    root: PathBuf,
    files: HashSet<String>,
}

impl AssetPresenceChecker {
    /// List `*.webp` under `root`. A missing or unreadable directory means
    /// no previews; it never fails the job.
    pub fn scan(root: &Path) -> Self {
        let mut files = HashSet::new();

        match root.to_str() {
            Some(dir) => {
                let pattern = format!("{}/*.webp", Pattern::escape(dir));
                let options = MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                };
                match glob_with(&pattern, options) {
                    Ok(paths) => {
                        for path in paths.flatten() {
                            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                                files.insert(name.to_string());
                            }
                        }
                    }
                    Err(e) => warn!(dir = %root.display(), error = %e, "Invalid preview directory pattern"),
                }
            }
            None => warn!(dir = %root.display(), "Preview directory path is not UTF-8, previews ignored"),
        }

        debug!(dir = %root.display(), previews = files.len(), "Preview directory scanned");
        Self {
            root: root.to_path_buf(),
            files,
        }
    }

    /// A checker that reports every preview as missing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn has(&self, key: &AssetKey<'_>, slot: TimeSlot) -> bool {
        self.files.contains(&key.file_name(slot))
    }

    pub fn flags(&self, key: &AssetKey<'_>) -> PresenceFlags {
        PresenceFlags {
            morning: self.has(key, TimeSlot::Morning),
            afternoon: self.has(key, TimeSlot::Afternoon),
            night: self.has(key, TimeSlot::Night),
        }
    }
}
