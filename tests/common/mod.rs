//! Shared fixtures: a throwaway SQLite source store plus config.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use rusqlite::{params, Connection};
use serde_json::{json, Value};
use tempfile::TempDir;

use lima_export::config::{Config, ConfigFile};
use lima_export::domain::{CategoryProgress, ContentTree, LogProgress, ProgressSink};
use lima_export::export::{export_language, AssetPresenceChecker, JobReport};
use lima_export::source::{SourceLoader, SqliteSource};

const SOURCE_SCHEMA: &str = r#"
CREATE TABLE categories (id INTEGER PRIMARY KEY, position INTEGER, localization TEXT);
CREATE TABLE subcategories (
    id INTEGER PRIMARY KEY, position INTEGER, category_id INTEGER, localization TEXT,
    shadow_w TEXT, shadow_m TEXT, views INTEGER, is_daily_suitable INTEGER
);
CREATE TABLE coaches (
    id INTEGER PRIMARY KEY, position INTEGER, coach_name TEXT, coach TEXT,
    coach_UI_description TEXT
);
CREATE TABLE affirmations_new (
    sub_id INTEGER, coach_id INTEGER, position INTEGER,
    script TEXT, popular_aff TEXT, aff_for_banners TEXT
);
"#;

/// Source database and output directories under one temp dir
pub struct SourceFixture {
    pub dir: TempDir,
    conn: Connection,
}

impl SourceFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("source.db")).unwrap();
        conn.execute_batch(SOURCE_SCHEMA).unwrap();
        std::fs::create_dir_all(dir.path().join("previews")).unwrap();
        Self { dir, conn }
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join("source.db")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.dir.path().join("export")
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.dir.path().join("previews")
    }

    pub fn category(&self, id: i64, position: i64, localization: Value) -> &Self {
        self.conn
            .execute(
                "INSERT INTO categories VALUES (?1, ?2, ?3)",
                params![id, position, localization.to_string()],
            )
            .unwrap();
        self
    }

    pub fn raw_category(&self, id: i64, position: i64, localization: &str) -> &Self {
        self.conn
            .execute(
                "INSERT INTO categories VALUES (?1, ?2, ?3)",
                params![id, position, localization],
            )
            .unwrap();
        self
    }

    pub fn subcategory(
        &self,
        id: i64,
        position: i64,
        category_id: i64,
        localization: Value,
        daily: Option<bool>,
    ) -> &Self {
        self.conn
            .execute(
                "INSERT INTO subcategories VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    position,
                    category_id,
                    localization.to_string(),
                    format!("shadow_w_{}", id),
                    format!("shadow_m_{}", id),
                    id * 10,
                    daily
                ],
            )
            .unwrap();
        self
    }

    /// Subcategory whose localization is stored verbatim
    pub fn raw_subcategory(&self, id: i64, position: i64, category_id: i64, localization: &str) -> &Self {
        self.conn
            .execute(
                "INSERT INTO subcategories (id, position, category_id, localization) VALUES (?1, ?2, ?3, ?4)",
                params![id, position, category_id, localization],
            )
            .unwrap();
        self
    }

    pub fn coach(&self, id: i64, position: i64, name: &str, tag: &str, description: Value) -> &Self {
        self.conn
            .execute(
                "INSERT INTO coaches VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, position, name, tag, description.to_string()],
            )
            .unwrap();
        self
    }

    pub fn affirmation(
        &self,
        sub_id: i64,
        coach_id: i64,
        position: i64,
        script: Value,
        popular: Value,
        banners: Value,
    ) -> &Self {
        self.conn
            .execute(
                "INSERT INTO affirmations_new VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sub_id,
                    coach_id,
                    position,
                    script.to_string(),
                    popular.to_string(),
                    banners.to_string()
                ],
            )
            .unwrap();
        self
    }

    /// An affirmation with title, script and subtitle for every listed gender and language
    pub fn full_affirmation(&self, sub_id: i64, coach_id: i64, position: i64, languages: &[&str]) -> &Self {
        let mut script = json!({"female": {}, "male": {}});
        let mut popular = json!({"female": {}, "male": {}});
        for gender in ["female", "male"] {
            for lang in languages {
                script[gender][*lang] = json!({
                    "title": format!("{} {} title {}", gender, lang, sub_id),
                    "script": format!("{} {} script {}", gender, lang, sub_id),
                });
                popular[gender][*lang] = json!(format!("{} {} subtitle {}", gender, lang, sub_id));
            }
        }
        self.affirmation(sub_id, coach_id, position, script, popular, json!({}))
    }

    /// Empty preview file in the preview directory
    pub fn preview(&self, name: &str) {
        std::fs::write(self.preview_dir().join(name), b"").unwrap();
    }

    /// Config with two workers and immediate retries
    pub fn config(&self, languages: &[&str]) -> Config {
        let yaml = format!(
            r#"
languages: [{}]
versions: [main]
threads: 2
retry:
  attempts: 2
  delays_sec: []
export:
  dir: export
  preview_dir: previews
  source_db: source.db
"#,
            languages.join(", ")
        );
        let raw: ConfigFile = serde_yaml::from_str(&yaml).unwrap();
        Config::resolve(raw, self.dir.path(), |_| None).unwrap()
    }

    pub fn tree(&self, config: &Config) -> ContentTree {
        let store = SqliteSource::open(&self.source_path()).unwrap();
        let rows = SourceLoader::new(&store, config.range, &config.versions)
            .load()
            .unwrap();
        ContentTree::build(rows)
    }

    /// Export one language synchronously into the configured export dir
    pub fn export(&self, config: &Config, language: &str) -> JobReport {
        let tree = self.tree(config);
        let assets = AssetPresenceChecker::scan(&config.preview_dir);
        export_language(
            &tree,
            language,
            &config.snapshot_path(language),
            &assets,
            &mut LogProgress,
            &AtomicBool::new(false),
        )
        .unwrap()
    }

    /// Category 3 (EN, RU) with subcategories 7 and 8, category 4 (EN only)
    /// with subcategory 9, coach 2 on the `main` version and coach 5 off it.
    ///
    /// Subcategory 7 has a RU title only for "male"; its affirmation with
    /// coach 2 lacks the female RU subtitle.
    pub fn scenario() -> Self {
        let fx = Self::new();
        fx.category(3, 1, json!({"EN": "Sleep", "RU": "Сон"}))
            .category(4, 2, json!({"EN": "Focus"}))
            .subcategory(
                7,
                1,
                3,
                json!({
                    "female": {"title": {"EN": "Rest well"}},
                    "male": {"title": {"EN": "Rest", "RU": "Отдых"}}
                }),
                None,
            )
            .subcategory(
                8,
                2,
                3,
                json!({"female": {"title": {"EN": "Dreams", "RU": "Сны"}}}),
                Some(false),
            )
            .subcategory(9, 1, 4, json!({"female": {"title": "Deep work"}}), Some(true))
            .coach(2, 1, "Anna", "main", json!({"EN": "Gentle voice"}))
            .coach(5, 2, "Boris", "beta", json!({"EN": "Calm"}))
            .affirmation(
                7,
                2,
                1,
                json!({
                    "female": {
                        "EN": {"title": "I rest", "script": "Breathe in"},
                        "RU": {"title": "Я отдыхаю", "script": "Вдох"}
                    },
                    "male": {
                        "EN": {"title": "I rest", "script": "Breathe out"},
                        "RU": {"title": "Я отдыхаю", "script": "Выдох"}
                    }
                }),
                json!({
                    "female": {"EN": "Rest now"},
                    "male": {"EN": "Rest now", "RU": "Отдохни"}
                }),
                json!({
                    "female": {"EN": {"morning": "Good morning", "late evening": "Good night"}}
                }),
            )
            .full_affirmation(8, 2, 1, &["EN", "RU"])
            .full_affirmation(9, 2, 1, &["EN"])
            .full_affirmation(7, 5, 1, &["EN", "RU"]);
        fx
    }
}

pub fn open_snapshot(path: &Path) -> Connection {
    Connection::open(path).unwrap()
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

/// Every row of every table, in insertion order, rendered as text
pub fn dump(path: &Path) -> Vec<String> {
    let conn = open_snapshot(path);
    let mut out = Vec::new();
    for table in ["categories", "subcategories", "coaches", "affirmations"] {
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table))
            .unwrap();
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut fields = Vec::with_capacity(columns);
                for i in 0..columns {
                    let value: rusqlite::types::Value = row.get(i)?;
                    fields.push(format!("{:?}", value));
                }
                Ok(format!("{}|{}", table, fields.join("|")))
            })
            .unwrap();
        out.extend(rows.map(Result::unwrap));
    }
    out
}

/// Records progress events
#[derive(Default)]
pub struct Recorder(pub Vec<(String, CategoryProgress)>);

impl ProgressSink for Recorder {
    fn category_completed(&mut self, language: &str, progress: &CategoryProgress) {
        self.0.push((language.to_string(), *progress));
    }
}
