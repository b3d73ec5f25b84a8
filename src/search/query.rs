//! Filtered, sorted, paginated record search.
//!
//! Three matching modes share one filter/sort/pagination pipeline:
//!
//! - **boolean** (default): the query goes through [`compile`] and is matched
//!   against the FTS5 index over title and body. Terms behind a leading `NOT`
//!   become an anti-match on the same index.
//! - **fuzzy**: every word of two or more characters becomes a case-insensitive
//!   substring test on title or body; any single word qualifies a record.
//!   Words are matched literally through the same pattern path as regex mode,
//!   since SQLite `LIKE` only folds ASCII case.
//! - **regex**: the raw query is compiled once (case-insensitive) and tested
//!   against title or body of every candidate row in Rust. A pattern that does
//!   not compile matches nothing.
//!
//! `total` always counts the full matching set, independent of limit/offset.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::types::Record;
use crate::search::compiler::compile;
use crate::storage::sqlite::{RECORD_COLUMNS, SqliteStorage, record_from_row};

pub const DEFAULT_LIMIT: usize = 50;

/// Compiled-size ceiling for user-supplied patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Shortest fuzzy word, in characters.
const FUZZY_MIN_WORD_CHARS: usize = 2;

/// A regex-mode pattern that cannot be used. Absorbed by the executor.
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Everything except records flagged not-yet-digitized.
    #[default]
    Digitized,
    /// Only not-yet-digitized records.
    Missing,
    All,
}

impl FromStr for Coverage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "digitized" => Ok(Coverage::Digitized),
            "missing" => Ok(Coverage::Missing),
            "all" => Ok(Coverage::All),
            other => Err(format!("unknown coverage mode {other:?} (digitized|missing|all)")),
        }
    }
}

/// Sortable columns. Anything else falls back to [`SortField::DateSort`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DateSort,
    Title,
    Series,
    ItemType,
    Id,
    BoxNumber,
    FolderNumber,
    /// `(box, folder, bundle, document)`.
    ArchiveOrder,
}

impl SortField {
    /// Resolve a user-supplied name, falling back to the default for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "date_sort" | "date" => SortField::DateSort,
            "title" => SortField::Title,
            "series" => SortField::Series,
            "item_type" => SortField::ItemType,
            "id" => SortField::Id,
            "box_number" | "box" => SortField::BoxNumber,
            "folder_number" | "folder" => SortField::FolderNumber,
            "archive_order" | "archiveorder" => SortField::ArchiveOrder,
            other => {
                tracing::debug!(sort = other, "unknown sort field, using date_sort");
                SortField::DateSort
            }
        }
    }

    fn columns(self) -> &'static [&'static str] {
        match self {
            SortField::DateSort => &["date_sort"],
            SortField::Title => &["title"],
            SortField::Series => &["series"],
            SortField::ItemType => &["item_type"],
            SortField::Id => &["id"],
            SortField::BoxNumber => &["box_number"],
            SortField::FolderNumber => &["folder_number"],
            SortField::ArchiveOrder => {
                &["box_number", "folder_number", "bundle_number", "document_number"]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub query: Option<String>,
    pub fuzzy: bool,
    /// Takes precedence over `fuzzy` when both are set.
    pub use_regex: bool,
    pub series: Option<String>,
    pub item_type: Option<String>,
    pub analysis_model: Option<String>,
    pub language: Option<String>,
    /// Inclusive bounds on `date_sort`.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub box_number: Option<i64>,
    pub folder_number: Option<i64>,
    /// Every listed tag must be present (case-insensitive, whole tag).
    pub tags: Vec<String>,
    pub coverage: Coverage,
    pub sort_by: SortField,
    pub sort_order: SortDirection,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: None,
            fuzzy: false,
            use_regex: false,
            series: None,
            item_type: None,
            analysis_model: None,
            language: None,
            date_from: None,
            date_to: None,
            box_number: None,
            folder_number: None,
            tags: Vec::new(),
            coverage: Coverage::default(),
            sort_by: SortField::default(),
            sort_order: SortDirection::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl SearchConfig {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> MatchMode {
        if self.use_regex {
            MatchMode::Regex
        } else if self.fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::Boolean
        }
    }

    fn query_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Boolean,
    Fuzzy,
    Regex,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub records: Vec<Record>,
    pub total: usize,
}

/// WHERE-clause fragments with their positional parameters.
#[derive(Default)]
struct Predicate {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

fn param<T: ToSql + 'static>(value: T) -> Box<dyn ToSql> {
    Box::new(value)
}

impl Predicate {
    fn push(&mut self, clause: impl Into<String>, params: Vec<Box<dyn ToSql>>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            "1=1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|b| &**b).collect()
    }
}

pub struct SearchExecutor<'a> {
    storage: &'a SqliteStorage,
}

impl<'a> SearchExecutor<'a> {
    pub fn new(storage: &'a SqliteStorage) -> Self {
        Self { storage }
    }

    pub fn search(&self, config: &SearchConfig) -> Result<SearchResults> {
        let mode = config.mode();
        tracing::info!(
            mode = ?mode,
            query = config.query.as_deref().unwrap_or(""),
            limit = config.limit,
            offset = config.offset,
            "search_start"
        );

        let mut predicate = Predicate::default();
        let mut pattern: Option<Regex> = None;

        if let Some(query) = config.query_text() {
            match mode {
                MatchMode::Boolean => push_boolean(&mut predicate, query),
                MatchMode::Fuzzy => {
                    if let Some(words) = fuzzy_pattern(query) {
                        match compile_pattern(&words) {
                            Ok(re) => pattern = Some(re),
                            Err(err) => {
                                tracing::warn!(error = %err, "fuzzy search matches nothing");
                                return Ok(SearchResults::default());
                            }
                        }
                    }
                }
                MatchMode::Regex => match compile_pattern(query) {
                    Ok(re) => pattern = Some(re),
                    Err(err) => {
                        tracing::warn!(error = %err, "regex search matches nothing");
                        return Ok(SearchResults::default());
                    }
                },
            }
        }
        push_filters(&mut predicate, config);

        let results = match pattern {
            Some(re) => self.run_with_pattern(&predicate, config, &re)?,
            None => self.run_in_store(&predicate, config)?,
        };

        tracing::info!(
            mode = ?mode,
            total = results.total,
            returned = results.records.len(),
            "search_done"
        );
        Ok(results)
    }

    fn run_in_store(&self, predicate: &Predicate, config: &SearchConfig) -> Result<SearchResults> {
        let conn = self.storage.raw();
        let where_sql = predicate.where_sql();
        let params = predicate.param_refs();

        let count_sql = format!("SELECT COUNT(*) FROM records WHERE {where_sql}");
        let total: i64 = conn
            .query_row(&count_sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get(0)
            })
            .context("counting search matches")?;

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE {where_sql} ORDER BY {} LIMIT ? OFFSET ?",
            order_by(config.sort_by, config.sort_order)
        );
        let limit = config.limit as i64;
        let offset = config.offset as i64;
        let mut all_params = params;
        all_params.push(&limit);
        all_params.push(&offset);

        let mut stmt = conn.prepare(&sql).context("preparing search query")?;
        let rows = stmt.query_map(rusqlite::params_from_iter(all_params.iter()), record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(SearchResults {
            records,
            total: total as usize,
        })
    }

    /// Regex and fuzzy modes: filters and ordering run in SQLite, the pattern runs here,
    /// then pagination is applied to the surviving rows.
    fn run_with_pattern(
        &self,
        predicate: &Predicate,
        config: &SearchConfig,
        pattern: &Regex,
    ) -> Result<SearchResults> {
        let conn = self.storage.raw();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE {} ORDER BY {}",
            predicate.where_sql(),
            order_by(config.sort_by, config.sort_order)
        );
        let params = predicate.param_refs();
        let mut stmt = conn.prepare(&sql).context("preparing regex candidate query")?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), record_from_row)?;

        let mut total = 0usize;
        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            if !record_matches(pattern, &record) {
                continue;
            }
            if total >= config.offset && records.len() < config.limit {
                records.push(record);
            }
            total += 1;
        }

        Ok(SearchResults { records, total })
    }
}

/// Case-insensitive, size-limited compile of a user pattern.
pub fn compile_pattern(raw: &str) -> Result<Regex, PredicateError> {
    RegexBuilder::new(raw)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|source| PredicateError::InvalidPattern {
            pattern: raw.to_string(),
            source,
        })
}

/// The regex-mode row predicate: title or body contains a match.
pub fn record_matches(pattern: &Regex, record: &Record) -> bool {
    pattern.is_match(&record.title)
        || record
            .text_content
            .as_deref()
            .is_some_and(|body| pattern.is_match(body))
}

fn push_boolean(predicate: &mut Predicate, query: &str) {
    let compiled = compile(query);
    if compiled.is_empty() {
        return;
    }
    tracing::debug!(fts = %compiled, "compiled boolean query");
    if let Some(excluded) = compiled.excluded() {
        predicate.push(
            "records.id NOT IN (SELECT rowid FROM records_fts WHERE records_fts MATCH ?)",
            vec![param(excluded.to_string())],
        );
    }
    if !compiled.as_str().is_empty() {
        predicate.push(
            "records.id IN (SELECT rowid FROM records_fts WHERE records_fts MATCH ?)",
            vec![param(compiled.into_string())],
        );
    }
}

/// Fuzzy words as one literal alternation, or `None` when no word is long enough.
fn fuzzy_pattern(query: &str) -> Option<String> {
    let words: Vec<String> = query
        .split_whitespace()
        .filter(|w| w.chars().count() >= FUZZY_MIN_WORD_CHARS)
        .map(regex::escape)
        .collect();
    (!words.is_empty()).then(|| words.join("|"))
}

fn push_filters(predicate: &mut Predicate, config: &SearchConfig) {
    let equality = [
        ("series", &config.series),
        ("item_type", &config.item_type),
        ("analysis_model", &config.analysis_model),
        ("language", &config.language),
    ];
    for (column, value) in equality {
        if let Some(v) = value {
            predicate.push(format!("records.{column} = ?"), vec![param(v.clone())]);
        }
    }

    if let Some(from) = &config.date_from {
        predicate.push("records.date_sort >= ?", vec![param(from.clone())]);
    }
    if let Some(to) = &config.date_to {
        predicate.push("records.date_sort <= ?", vec![param(to.clone())]);
    }
    if let Some(b) = config.box_number {
        predicate.push("records.box_number = ?", vec![param(b)]);
    }
    if let Some(f) = config.folder_number {
        predicate.push("records.folder_number = ?", vec![param(f)]);
    }

    match config.coverage {
        Coverage::Digitized => predicate.push(
            "(records.coverage_status IS NULL OR records.coverage_status != 'not_digitized')",
            Vec::new(),
        ),
        Coverage::Missing => {
            predicate.push("records.coverage_status = 'not_digitized'", Vec::new());
        }
        Coverage::All => {}
    }

    for tag in config.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        predicate.push(
            "EXISTS (SELECT 1 FROM json_each(CASE WHEN json_valid(records.tags) \
             THEN records.tags ELSE '[]' END) WHERE lower(json_each.value) = lower(?))",
            vec![param(tag.to_string())],
        );
    }
}

fn order_by(field: SortField, direction: SortDirection) -> String {
    let dir = direction.sql();
    let mut parts: Vec<String> = field
        .columns()
        .iter()
        .map(|col| format!("records.{col} {dir}"))
        .collect();
    if field != SortField::Id {
        parts.push(format!("records.id {dir}"));
    }
    parts.join(", ")
}
