//! `SQLite` backend: schema, pragmas, and migrations.

use crate::model::types::{ArchiveAddress, CoverageStatus, EntryKind, FindingAidEntry, Record};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, Transaction, params};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Public schema version constant for external checks.
pub const CURRENT_SCHEMA_VERSION: i64 = SCHEMA_VERSION;

const SCHEMA_VERSION: i64 = 2;

const MIGRATION_V1: &str = r"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    date TEXT,
    date_sort TEXT,
    series TEXT,
    item_type TEXT,
    url TEXT,
    thumbnail_url TEXT,
    box_number INTEGER,
    folder_number INTEGER,
    bundle_number INTEGER,
    document_number INTEGER,
    text_content TEXT,
    coverage_status TEXT,          -- 'digitized', 'not_digitized', NULL = unknown
    ocr_status TEXT,               -- 'pending', 'completed', 'failed', 'no_pdf'
    summary TEXT,
    tags TEXT,                     -- JSON array of tag strings
    language TEXT,
    analysis_model TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_date_sort ON records(date_sort);
CREATE INDEX IF NOT EXISTS idx_records_series ON records(series);
CREATE INDEX IF NOT EXISTS idx_records_item_type ON records(item_type);
CREATE INDEX IF NOT EXISTS idx_records_box ON records(box_number);
CREATE INDEX IF NOT EXISTS idx_records_folder ON records(folder_number);
CREATE INDEX IF NOT EXISTS idx_records_box_folder ON records(box_number, folder_number);
CREATE INDEX IF NOT EXISTS idx_records_coverage ON records(coverage_status);

CREATE TABLE IF NOT EXISTS finding_aid (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_type TEXT NOT NULL,      -- 'box' or 'folder'
    box_number INTEGER NOT NULL,
    folder_number INTEGER,         -- NULL for box entries
    title TEXT,
    series TEXT,
    series_number TEXT,
    is_oversize INTEGER NOT NULL DEFAULT 0,
    in_digital_collection INTEGER NOT NULL DEFAULT 0,
    UNIQUE(entry_type, box_number, folder_number)
);

CREATE INDEX IF NOT EXISTS idx_finding_aid_box ON finding_aid(box_number);
CREATE INDEX IF NOT EXISTS idx_finding_aid_type ON finding_aid(entry_type);
";

const MIGRATION_V2: &str = r"
-- External-content FTS5 index over title and body, kept in sync by triggers.
CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
    title,
    text_content,
    content='records',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS records_ai AFTER INSERT ON records BEGIN
    INSERT INTO records_fts(rowid, title, text_content)
    VALUES (new.id, new.title, new.text_content);
END;

CREATE TRIGGER IF NOT EXISTS records_ad AFTER DELETE ON records BEGIN
    INSERT INTO records_fts(records_fts, rowid, title, text_content)
    VALUES ('delete', old.id, old.title, old.text_content);
END;

CREATE TRIGGER IF NOT EXISTS records_au AFTER UPDATE OF title, text_content ON records BEGIN
    INSERT INTO records_fts(records_fts, rowid, title, text_content)
    VALUES ('delete', old.id, old.title, old.text_content);
    INSERT INTO records_fts(rowid, title, text_content)
    VALUES (new.id, new.title, new.text_content);
END;

INSERT INTO records_fts(records_fts) VALUES ('rebuild');
";

/// Column list shared by every query that materializes a [`Record`].
pub(crate) const RECORD_COLUMNS: &str = "id, external_id, title, date, date_sort, series, \
     item_type, url, thumbnail_url, box_number, folder_number, bundle_number, document_number, \
     text_content, coverage_status, ocr_status, summary, tags, language, analysis_model";

const FINDING_AID_COLUMNS: &str = "entry_type, box_number, folder_number, title, series, \
     series_number, is_oversize, in_digital_collection";

pub struct SqliteStorage {
    conn: Connection,
}

/// Counts from a batch insert where conflicting rows are skipped, not fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

/// Counts from replacing the finding-aid table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FindingAidLoad {
    pub boxes: usize,
    pub folders: usize,
    /// Entries whose `(entry_type, box, folder)` key repeated an earlier entry.
    pub replaced: usize,
    pub boxes_in_collection: usize,
    pub folders_in_collection: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoxContents {
    /// `(folder_number, record_count)` in folder order.
    pub folders: Vec<(Option<i64>, i64)>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageStats {
    pub total_boxes: i64,
    pub total_folders: i64,
    pub digitized_boxes: i64,
    pub digitized_folders: i64,
    pub missing_boxes: i64,
    pub missing_folders: i64,
}

/// Finding-aid holdings that have no digitized counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub missing_boxes: Vec<FindingAidEntry>,
    pub missing_folders_by_box: BTreeMap<i64, Vec<FindingAidEntry>>,
    pub stats: CoverageStats,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating db directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("opening sqlite db at {}", path.display()))?;

        apply_pragmas(&mut conn)?;
        init_meta(&mut conn)?;
        migrate(&mut conn)?;

        Ok(Self { conn })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("opening in-memory sqlite db")?;
        apply_common_pragmas(&conn)?;
        init_meta(&mut conn)?;
        migrate(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn open_readonly(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening sqlite db readonly at {}", path.display()))?;

        apply_common_pragmas(&conn)?;

        Ok(Self { conn })
    }

    pub fn raw(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.get_meta("schema_version")?
            .map(|v| v.parse().unwrap_or(0))
            .ok_or_else(|| anyhow!("schema_version missing"))
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    /// Insert one record and return its store id. Fails on a duplicate `external_id`.
    pub fn insert_record(&self, record: &Record) -> Result<i64> {
        insert_record_row(&self.conn, record)
            .with_context(|| format!("inserting record external_id={}", record.external_id))
    }

    /// Insert records in a single transaction. Rows whose `external_id` already
    /// exists are skipped and counted rather than aborting the batch.
    pub fn insert_records_batched(&mut self, records: &[Record]) -> Result<BatchOutcome> {
        let tx = self.conn.transaction()?;
        let outcome = insert_skipping_conflicts(&tx, records)?;
        tx.commit()?;
        debug!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "record batch stored"
        );
        Ok(outcome)
    }

    pub fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![id], record_from_row)
            .optional()?)
    }

    pub fn get_record_by_external_id(&self, external_id: i64) -> Result<Option<Record>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE external_id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![external_id], record_from_row)
            .optional()?)
    }

    pub fn count_records(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
    }

    /// Store OCR output for a record. The FTS index follows via trigger.
    pub fn update_text_content(&self, id: i64, text: &str, ocr_status: &str) -> Result<bool> {
        let n = self.conn.execute(
            "UPDATE records SET text_content = ?, ocr_status = ? WHERE id = ?",
            params![text, ocr_status, id],
        )?;
        Ok(n > 0)
    }

    pub fn update_analysis(
        &self,
        id: i64,
        summary: &str,
        tags: &[String],
        language: Option<&str>,
        model: Option<&str>,
    ) -> Result<bool> {
        let tags_json = serde_json::to_string(tags)?;
        let n = self.conn.execute(
            "UPDATE records SET summary = ?, tags = ?, language = ?, analysis_model = ? WHERE id = ?",
            params![summary, tags_json, language, model, id],
        )?;
        Ok(n > 0)
    }

    pub fn update_coverage(&self, id: i64, coverage: Option<CoverageStatus>) -> Result<bool> {
        let n = self.conn.execute(
            "UPDATE records SET coverage_status = ? WHERE id = ?",
            params![coverage.map(CoverageStatus::as_str), id],
        )?;
        Ok(n > 0)
    }

    /// Folders of one box with their record counts.
    pub fn folders_for_box(&self, box_number: i64) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT folder_number, COUNT(*) FROM records
             WHERE box_number = ? AND folder_number IS NOT NULL
             GROUP BY folder_number ORDER BY folder_number",
        )?;
        let rows = stmt.query_map(params![box_number], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Box → folder → count layout of everything in the store.
    pub fn archive_structure(&self) -> Result<BTreeMap<i64, BoxContents>> {
        let mut stmt = self.conn.prepare(
            "SELECT box_number, folder_number, COUNT(*) FROM records
             WHERE box_number IS NOT NULL
             GROUP BY box_number, folder_number
             ORDER BY box_number, folder_number",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut structure: BTreeMap<i64, BoxContents> = BTreeMap::new();
        for r in rows {
            let (box_number, folder, count) = r?;
            let entry = structure.entry(box_number).or_default();
            entry.folders.push((folder, count));
            entry.total += count;
        }
        Ok(structure)
    }

    // ---------------------------------------------------------------------
    // Finding aid
    // ---------------------------------------------------------------------

    /// Replace the whole finding-aid table with `entries` and recompute the
    /// `in_digital_collection` flags against digitized (or unknown) records.
    pub fn replace_finding_aid(&mut self, entries: &[FindingAidEntry]) -> Result<FindingAidLoad> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM finding_aid", [])?;

        let mut load = FindingAidLoad::default();
        // Last entry per key wins. Box keys carry a NULL folder, which SQLite's
        // UNIQUE never treats as a conflict, so duplicates are resolved here.
        let mut latest: HashMap<(EntryKind, i64, Option<i64>), usize> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if latest
                .insert((entry.kind, entry.box_number, entry.folder_number), idx)
                .is_some()
            {
                load.replaced += 1;
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO finding_aid
                    (entry_type, box_number, folder_number, title, series, series_number, is_oversize)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (idx, entry) in entries.iter().enumerate() {
                if latest.get(&(entry.kind, entry.box_number, entry.folder_number)) != Some(&idx) {
                    continue;
                }
                stmt.execute(params![
                    entry.kind.as_str(),
                    entry.box_number,
                    entry.folder_number,
                    entry.title,
                    entry.series,
                    entry.series_number,
                    entry.is_oversize,
                ])?;
            }
        }

        // Placeholders must not count as coverage, or a second import would
        // hide every gap the first synthesis filled.
        load.boxes_in_collection = tx.execute(
            "UPDATE finding_aid SET in_digital_collection = 1
             WHERE entry_type = 'box' AND box_number IN (
                 SELECT DISTINCT box_number FROM records
                 WHERE box_number IS NOT NULL
                   AND (coverage_status IS NULL OR coverage_status != 'not_digitized')
             )",
            [],
        )?;
        load.folders_in_collection = tx.execute(
            "UPDATE finding_aid SET in_digital_collection = 1
             WHERE entry_type = 'folder' AND folder_number IN (
                 SELECT DISTINCT folder_number FROM records
                 WHERE folder_number IS NOT NULL
                   AND (coverage_status IS NULL OR coverage_status != 'not_digitized')
             )",
            [],
        )?;

        let (boxes, folders): (i64, i64) = tx.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN entry_type = 'box' THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN entry_type = 'folder' THEN 1 ELSE 0 END), 0)
             FROM finding_aid",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        load.boxes = boxes as usize;
        load.folders = folders as usize;

        tx.commit()?;
        Ok(load)
    }

    pub fn finding_aid_boxes(&self) -> Result<Vec<FindingAidEntry>> {
        self.query_finding_aid(
            "WHERE entry_type = 'box' ORDER BY box_number",
            params![],
        )
    }

    pub fn finding_aid_folders(&self, box_number: i64) -> Result<Vec<FindingAidEntry>> {
        self.query_finding_aid(
            "WHERE entry_type = 'folder' AND box_number = ? ORDER BY folder_number",
            params![box_number],
        )
    }

    /// Folder entries with no digitized counterpart, in archive order.
    pub fn missing_folder_entries(&self) -> Result<Vec<FindingAidEntry>> {
        self.query_finding_aid(
            "WHERE entry_type = 'folder' AND in_digital_collection = 0
             ORDER BY box_number, folder_number",
            params![],
        )
    }

    pub fn missing_from_collection(&self) -> Result<CoverageReport> {
        let missing_boxes = self.query_finding_aid(
            "WHERE entry_type = 'box' AND in_digital_collection = 0 ORDER BY box_number",
            params![],
        )?;

        let mut missing_folders_by_box: BTreeMap<i64, Vec<FindingAidEntry>> = BTreeMap::new();
        for folder in self.missing_folder_entries()? {
            missing_folders_by_box
                .entry(folder.box_number)
                .or_default()
                .push(folder);
        }

        let stats = self.conn.query_row(
            "SELECT
                 COALESCE(SUM(entry_type = 'box'), 0),
                 COALESCE(SUM(entry_type = 'folder'), 0),
                 COALESCE(SUM(entry_type = 'box' AND in_digital_collection = 1), 0),
                 COALESCE(SUM(entry_type = 'folder' AND in_digital_collection = 1), 0)
             FROM finding_aid",
            [],
            |row| {
                let total_boxes: i64 = row.get(0)?;
                let total_folders: i64 = row.get(1)?;
                let digitized_boxes: i64 = row.get(2)?;
                let digitized_folders: i64 = row.get(3)?;
                Ok(CoverageStats {
                    total_boxes,
                    total_folders,
                    digitized_boxes,
                    digitized_folders,
                    missing_boxes: total_boxes - digitized_boxes,
                    missing_folders: total_folders - digitized_folders,
                })
            },
        )?;

        Ok(CoverageReport {
            missing_boxes,
            missing_folders_by_box,
            stats,
        })
    }

    /// Delete every `not_digitized` record and insert `placeholders` in one
    /// transaction. Colliding rows are skipped.
    pub fn replace_placeholders(&mut self, placeholders: &[Record]) -> Result<(usize, BatchOutcome)> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM records WHERE coverage_status = 'not_digitized'",
            [],
        )?;
        let outcome = insert_skipping_conflicts(&tx, placeholders)?;
        tx.commit()?;
        Ok((removed, outcome))
    }

    fn query_finding_aid(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<FindingAidEntry>> {
        let sql = format!("SELECT {FINDING_AID_COLUMNS} FROM finding_aid {clause}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, entry_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn insert_skipping_conflicts(tx: &Transaction<'_>, records: &[Record]) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for record in records {
        match insert_record_row(tx, record) {
            Ok(_) => outcome.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                tracing::warn!(
                    external_id = record.external_id,
                    title = %record.title,
                    "skipping record: external_id already stored"
                );
                outcome.skipped += 1;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("inserting record external_id={}", record.external_id)));
            }
        }
    }
    Ok(outcome)
}

fn insert_record_row(conn: &Connection, record: &Record) -> rusqlite::Result<i64> {
    let tags = if record.tags.is_empty() {
        None
    } else {
        serde_json::to_string(&record.tags).ok()
    };
    conn.execute(
        "INSERT INTO records (external_id, title, date, date_sort, series, item_type, url,
             thumbnail_url, box_number, folder_number, bundle_number, document_number,
             text_content, coverage_status, ocr_status, summary, tags, language, analysis_model,
             created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.external_id,
            record.title,
            record.date,
            record.date_sort,
            record.series,
            record.item_type,
            record.url,
            record.thumbnail_url,
            record.address.box_number,
            record.address.folder_number,
            record.address.bundle_number,
            record.address.document_number,
            record.text_content,
            record.coverage.map(CoverageStatus::as_str),
            record.ocr_status,
            record.summary,
            tags,
            record.language,
            record.analysis_model,
            SqliteStorage::now_millis(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Materialize a [`Record`] from a row selected with [`RECORD_COLUMNS`].
pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let coverage: Option<String> = row.get(14)?;
    let tags: Option<String> = row.get(17)?;
    Ok(Record {
        id: Some(row.get(0)?),
        external_id: row.get(1)?,
        title: row.get(2)?,
        date: row.get(3)?,
        date_sort: row.get(4)?,
        series: row.get(5)?,
        item_type: row.get(6)?,
        url: row.get(7)?,
        thumbnail_url: row.get(8)?,
        address: ArchiveAddress {
            box_number: row.get(9)?,
            folder_number: row.get(10)?,
            bundle_number: row.get(11)?,
            document_number: row.get(12)?,
        },
        text_content: row.get(13)?,
        coverage: CoverageStatus::from_db(coverage.as_deref()),
        ocr_status: row.get(15)?,
        summary: row.get(16)?,
        // A malformed tag column reads as "no tags" rather than failing the row.
        tags: tags
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default(),
        language: row.get(18)?,
        analysis_model: row.get(19)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<FindingAidEntry> {
    let kind: String = row.get(0)?;
    Ok(FindingAidEntry {
        kind: if kind == "box" {
            EntryKind::Box
        } else {
            EntryKind::Folder
        },
        box_number: row.get(1)?,
        folder_number: row.get(2)?,
        title: row.get(3)?,
        series: row.get(4)?,
        series_number: row.get(5)?,
        is_oversize: row.get(6)?,
        in_digital_collection: row.get(7)?,
    })
}

fn apply_pragmas(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        ",
    )?;
    apply_common_pragmas(conn)
}

fn apply_common_pragmas(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        r"
        PRAGMA temp_store = MEMORY;
        PRAGMA cache_size = -65536; -- 64MB
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

fn init_meta(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .optional()?;

    if existing.is_none() {
        // Start at version 0 so migrate() applies full schema on first open.
        conn.execute(
            "INSERT INTO meta(key, value) VALUES('schema_version', '0')",
            [],
        )?;
    }

    Ok(())
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .optional()?
        .unwrap_or(0);

    if current == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;

    match current {
        0 => {
            tx.execute_batch(MIGRATION_V1)?;
            tx.execute_batch(MIGRATION_V2)?;
        }
        1 => {
            tx.execute_batch(MIGRATION_V2)?;
        }
        v => return Err(anyhow!("unsupported schema version {v}")),
    }

    tx.execute(
        "UPDATE meta SET value = ? WHERE key = 'schema_version'",
        params![SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()?;
    info!(from = current, to = SCHEMA_VERSION, "migrated catalog schema");

    Ok(())
}
