//! SQLite-backed source store.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row};

use super::{RawAffirmation, RawCategory, RawCoach, RawSubcategory, SourceStore};
use crate::error::{ExportError, Result};

/// Read-only connection to the relational source
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open an existing source database read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(ExportError::Source)?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn query<T>(&self, sql: &str, map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql).map_err(ExportError::Source)?;
        let rows = stmt
            .query_map([], map)
            .map_err(ExportError::Source)?
            .collect::<rusqlite::Result<Vec<T>>>()
            .map_err(ExportError::Source)?;
        Ok(rows)
    }
}

impl SourceStore for SqliteSource {
    fn categories(&self) -> Result<Vec<RawCategory>> {
        self.query(
            "SELECT id, position, localization FROM categories",
            |row| {
                Ok(RawCategory {
                    id: row.get("id")?,
                    position: row.get("position")?,
                    localization: row.get("localization")?,
                })
            },
        )
    }

    fn subcategories(&self) -> Result<Vec<RawSubcategory>> {
        self.query(
            "SELECT id, position, category_id, localization, shadow_w, shadow_m, views, \
             is_daily_suitable FROM subcategories",
            |row| {
                Ok(RawSubcategory {
                    id: row.get("id")?,
                    position: row.get("position")?,
                    category_id: row.get("category_id")?,
                    localization: row.get("localization")?,
                    shadow_w: row.get("shadow_w")?,
                    shadow_m: row.get("shadow_m")?,
                    views: row.get("views")?,
                    is_daily_suitable: row.get("is_daily_suitable")?,
                })
            },
        )
    }

    fn coaches(&self) -> Result<Vec<RawCoach>> {
        self.query(
            "SELECT id, position, coach_name, coach, coach_UI_description FROM coaches",
            |row| {
                Ok(RawCoach {
                    id: row.get("id")?,
                    position: row.get("position")?,
                    coach_name: row.get("coach_name")?,
                    coach: row.get("coach")?,
                    description: row.get("coach_UI_description")?,
                })
            },
        )
    }

    fn affirmations(&self) -> Result<Vec<RawAffirmation>> {
        self.query(
            "SELECT rowid, sub_id, coach_id, position, script, popular_aff, aff_for_banners \
             FROM affirmations_new",
            |row| {
                Ok(RawAffirmation {
                    id: row.get(0)?,
                    sub_id: row.get("sub_id")?,
                    coach_id: row.get("coach_id")?,
                    position: row.get("position")?,
                    script: row.get("script")?,
                    popular_aff: row.get("popular_aff")?,
                    aff_for_banners: row.get("aff_for_banners")?,
                })
            },
        )
    }
}
