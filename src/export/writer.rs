//! Per-language snapshot files.
//!
//! A snapshot is recreated from nothing on every attempt: any existing file
//! (and SQLite sidecars) is removed before the schema is created, so a
//! retried job never sees rows from a failed attempt. Each category batch
//! is committed in its own transaction.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{CategoryBatch, OutputRow};
use crate::error::{ExportError, Result};

const SCHEMA: &str = r#"
CREATE TABLE categories (
    id INTEGER PRIMARY KEY,
    position INTEGER,
    name TEXT NOT NULL
);
CREATE TABLE subcategories (
    id INTEGER PRIMARY KEY,
    position INTEGER,
    name TEXT NOT NULL,
    shadow_w TEXT NOT NULL,
    shadow_m TEXT NOT NULL,
    views INTEGER NOT NULL,
    is_daily_suitable INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    FOREIGN KEY(category_id) REFERENCES categories(id)
);
CREATE TABLE coaches (
    id INTEGER PRIMARY KEY,
    position INTEGER,
    name TEXT NOT NULL,
    description TEXT
);
CREATE TABLE affirmations (
    sub_id INTEGER NOT NULL,
    coach_id INTEGER NOT NULL,
    position INTEGER,
    gender INTEGER NOT NULL,
    title TEXT NOT NULL,
    subtitle TEXT NOT NULL,
    script TEXT NOT NULL,
    morning_aff TEXT,
    afternoon_aff TEXT,
    evening_aff TEXT,
    is_morning INTEGER NOT NULL,
    is_afternoon INTEGER NOT NULL,
    is_night INTEGER NOT NULL,
    FOREIGN KEY(sub_id) REFERENCES subcategories(id),
    FOREIGN KEY(coach_id) REFERENCES coaches(id)
);
"#;

/// Rows written per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub categories: usize,
    pub subcategories: usize,
    pub coaches: usize,
    pub affirmations: usize,
}

/// Result of a finished snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub path: PathBuf,
    pub counts: SnapshotCounts,
    /// SHA-256 (hex) of the ordered row stream
    pub digest: String,
}

/// Single writer for one `content_<lang>.db`
pub struct SnapshotWriter {
    path: PathBuf,
    lock_path: PathBuf,
    conn: Connection,
    lock: File,
    hasher: Sha256,
    counts: SnapshotCounts,
}

impl SnapshotWriter {
    /// Take the snapshot lock, delete any previous file and create the schema
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = lock_path(path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| ExportError::LockHeld {
                path: lock_path.clone(),
            })?;

        for stale in [path.to_path_buf(), sidecar(path, "-journal"), sidecar(path, "-wal")] {
            match fs::remove_file(&stale) {
                Ok(()) => debug!(file = %stale.display(), "Removed previous snapshot file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let conn = Connection::open(path).map_err(|e| ExportError::storage(path, e))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|e| ExportError::storage(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            lock_path,
            conn,
            lock,
            hasher: Sha256::new(),
            counts: SnapshotCounts::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn counts(&self) -> SnapshotCounts {
        self.counts
    }

    /// Insert one category's rows in a single transaction
    pub fn write_batch(&mut self, batch: &CategoryBatch) -> Result<()> {
        let path = self.path.clone();
        let storage = |e| ExportError::storage(&path, e);

        let tx = self.conn.transaction().map_err(storage)?;
        for row in &batch.rows {
            insert_row(&tx, row).map_err(storage)?;
            serde_json::to_writer(&mut self.hasher, row).map_err(std::io::Error::from)?;
            self.hasher.update(b"\n");
            match row {
                OutputRow::Category(_) => self.counts.categories += 1,
                OutputRow::Subcategory(_) => self.counts.subcategories += 1,
                OutputRow::Coach(_) => self.counts.coaches += 1,
                OutputRow::Affirmation(_) => self.counts.affirmations += 1,
            }
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    /// Close the database and release the lock
    pub fn finish(self) -> Result<SnapshotSummary> {
        let Self {
            path,
            lock_path,
            conn,
            lock,
            hasher,
            counts,
        } = self;

        conn.close()
            .map_err(|(_, e)| ExportError::storage(&path, e))?;
        release(lock, &lock_path);

        Ok(SnapshotSummary {
            path,
            counts,
            digest: hex::encode(hasher.finalize()),
        })
    }
}

fn insert_row(conn: &Connection, row: &OutputRow) -> rusqlite::Result<usize> {
    match row {
        OutputRow::Category(c) => conn
            .prepare_cached("INSERT INTO categories (id, position, name) VALUES (?1, ?2, ?3)")?
            .execute(params![c.id, c.position, c.name]),
        OutputRow::Subcategory(s) => conn
            .prepare_cached(
                "INSERT INTO subcategories (id, position, name, shadow_w, shadow_m, views, \
                 is_daily_suitable, category_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                s.id,
                s.position,
                s.name,
                s.shadow_w,
                s.shadow_m,
                s.views,
                s.is_daily_suitable,
                s.category_id
            ]),
        OutputRow::Coach(c) => conn
            .prepare_cached("INSERT INTO coaches (id, position, name, description) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![c.id, c.position, c.name, c.description]),
        OutputRow::Affirmation(a) => conn
            .prepare_cached(
                "INSERT INTO affirmations (sub_id, coach_id, position, gender, title, subtitle, \
                 script, morning_aff, afternoon_aff, evening_aff, is_morning, is_afternoon, \
                 is_night) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?
            .execute(params![
                a.sub_id,
                a.coach_id,
                a.position,
                a.gender,
                a.title,
                a.subtitle,
                a.script,
                a.morning_aff,
                a.afternoon_aff,
                a.evening_aff,
                a.is_morning,
                a.is_afternoon,
                a.is_night
            ]),
    }
}

/// `content_en.db` -> `content_en.db.lock`
pub fn lock_path(path: &Path) -> PathBuf {
    sidecar(path, ".lock")
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Unlock only. The lock file stays so every writer contends on one inode.
fn release(lock: File, lock_path: &Path) {
    if let Err(e) = lock.unlock() {
        debug!(file = %lock_path.display(), error = %e, "Failed to unlock snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategoryRow, CoachRow};
    use tempfile::TempDir;

    fn batch() -> CategoryBatch {
        CategoryBatch {
            rows: vec![
                OutputRow::Category(CategoryRow {
                    id: 3,
                    position: Some(1),
                    name: "Sleep".to_string(),
                }),
                OutputRow::Coach(CoachRow {
                    id: 2,
                    position: None,
                    name: "Anna".to_string(),
                    description: None,
                }),
            ],
        }
    }

    #[test]
    fn test_create_overwrites_previous_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("content_en.db");
        std::fs::write(&path, b"garbage from a failed attempt").unwrap();

        let mut writer = SnapshotWriter::create(&path).unwrap();
        writer.write_batch(&batch()).unwrap();
        let summary = writer.finish().unwrap();

        assert_eq!(summary.counts.categories, 1);
        assert_eq!(summary.counts.coaches, 1);
        assert_eq!(summary.digest.len(), 64);

        let conn = Connection::open(&path).unwrap();
        let name: String = conn
            .query_row("SELECT name FROM categories WHERE id = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Sleep");
    }

    #[test]
    fn test_second_writer_sees_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("content_ru.db");

        let first = SnapshotWriter::create(&path).unwrap();
        let err = SnapshotWriter::create(&path).err().unwrap();
        assert!(matches!(err, ExportError::LockHeld { .. }));
        assert!(err.is_retryable());
        first.finish().unwrap();

        // The lock file outlives the writer and is reused
        assert!(lock_path(&path).exists());
        assert!(SnapshotWriter::create(&path).is_ok());
    }

    #[test]
    fn test_same_rows_same_digest() {
        let temp = TempDir::new().unwrap();
        let digest = |name: &str| {
            let mut writer = SnapshotWriter::create(&temp.path().join(name)).unwrap();
            writer.write_batch(&batch()).unwrap();
            writer.finish().unwrap().digest
        };
        assert_eq!(digest("a.db"), digest("b.db"));
    }

    #[test]
    fn test_unwritable_target_is_retryable() {
        let temp = TempDir::new().unwrap();
        // A directory where the database file should be
        let path = temp.path().join("content_de.db");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let err = SnapshotWriter::create(&path).err().unwrap();
        assert!(err.is_retryable());
    }
}
