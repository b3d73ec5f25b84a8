//! Finding-aid reconciliation.
//!
//! Importing a finding aid replaces the stored box/folder layout and marks
//! which entries already have digitized counterparts. Synthesis then creates
//! one placeholder [`Record`] per folder that has none, so gaps in the
//! digitized collection show up in search with coverage `not_digitized`.
//!
//! Placeholder fields are derived from the folder description under a
//! [`ReconcilePolicy`]: series names are remapped through an explicit table,
//! and the item type comes from an ordered keyword list (first match wins).

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::model::types::{ArchiveAddress, CoverageStatus, EntryKind, FindingAidEntry, Record};
use crate::storage::sqlite::SqliteStorage;

/// Bundled policy, used when no policy file is configured.
pub const DEFAULT_POLICY: &str = include_str!("../../config/reconcile.toml");

/// Separator between the parts of a folder description.
pub const SEGMENT_DELIMITER: &str = " -- ";

/// Leading description segments (creator, series) never scanned for a type keyword.
pub const DEFAULT_SKIP_SEGMENTS: usize = 2;

pub const LAST_RECONCILED_KEY: &str = "last_reconciled_at";

static TRAILING_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--\s*(\d{4}(?:\s*[-,;]\s*\d{4})?)\s*$").expect("trailing date regex")
});

/// A finding-aid entry or guide line that cannot be imported. Skipped and reported.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InputError {
    #[error("box {box_number}: expected a {expected} entry, found a {found}")]
    WrongKind {
        expected: EntryKind,
        found: EntryKind,
        box_number: i64,
    },

    #[error("folder entry in box {box_number} has no folder number")]
    MissingFolderNumber { box_number: i64 },

    #[error("folder {folder_number} in box {box_number}: folder number must be positive")]
    NonPositiveFolder { box_number: i64, folder_number: i64 },

    #[error("box number must be positive, got {box_number}")]
    NonPositiveBox { box_number: i64 },

    #[error("line {line}: folder FF{folder_number} appears before any box")]
    FolderBeforeBox { line: usize, folder_number: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeRule {
    pub keyword: String,
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilePolicy {
    #[serde(default = "default_skip_segments")]
    pub skip_segments: usize,
    #[serde(default)]
    pub series_map: BTreeMap<String, String>,
    #[serde(default)]
    pub item_type_rules: Vec<ItemTypeRule>,
}

fn default_skip_segments() -> usize {
    DEFAULT_SKIP_SEGMENTS
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReconcilePolicy {
    /// The bundled policy. An unparseable bundle degrades to no remapping and no rules.
    pub fn builtin() -> Self {
        Self::from_toml_str(DEFAULT_POLICY).unwrap_or_else(|err| {
            warn!(error = %err, "bundled reconcile policy is invalid; using an empty policy");
            Self::empty()
        })
    }

    pub fn empty() -> Self {
        Self {
            skip_segments: DEFAULT_SKIP_SEGMENTS,
            series_map: BTreeMap::new(),
            item_type_rules: Vec::new(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            rules = policy.item_type_rules.len(),
            series = policy.series_map.len(),
            "loaded reconcile policy"
        );
        Ok(policy)
    }

    pub fn map_series(&self, series: &str) -> String {
        self.series_map
            .get(series)
            .cloned()
            .unwrap_or_else(|| series.to_string())
    }

    /// First rule whose keyword starts a scanned segment, scanning segments in order.
    pub fn infer_item_type(&self, description: &str) -> Option<&str> {
        description
            .split(SEGMENT_DELIMITER)
            .skip(self.skip_segments)
            .map(str::trim)
            .find_map(|segment| {
                self.item_type_rules
                    .iter()
                    .find(|rule| segment.starts_with(rule.keyword.as_str()))
                    .map(|rule| rule.item_type.as_str())
            })
    }
}

/// `-- 1975` or `-- 1982-1990` at the end of a description.
/// Returns `(date, date_sort)` where `date_sort` is the first year.
pub fn extract_trailing_date(description: &str) -> Option<(String, String)> {
    let caps = TRAILING_DATE_RE.captures(description)?;
    let date = caps.get(1)?.as_str().trim().to_string();
    let date_sort = date.chars().take(4).collect();
    Some((date, date_sort))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub boxes: usize,
    pub folders: usize,
    /// Entries that replaced an earlier entry with the same key.
    pub replaced: usize,
    pub boxes_in_collection: usize,
    pub folders_in_collection: usize,
    pub skipped: Vec<InputError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    /// Placeholders left over from the previous run.
    pub removed: usize,
    pub inserted: usize,
    /// Placeholders that collided with a stored record.
    pub skipped: usize,
}

pub struct ReconciliationEngine {
    policy: ReconcilePolicy,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(ReconcilePolicy::builtin())
    }
}

impl ReconciliationEngine {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Replace the stored finding aid with `boxes` and `folders`.
    ///
    /// Invalid entries are skipped and listed in the report. Coverage flags are
    /// recomputed against the records currently in the store.
    pub fn reconcile(
        &self,
        storage: &mut SqliteStorage,
        boxes: &[FindingAidEntry],
        folders: &[FindingAidEntry],
    ) -> Result<ImportReport> {
        let mut skipped = Vec::new();
        let mut accepted = Vec::with_capacity(boxes.len() + folders.len());

        for (entries, expected) in [(boxes, EntryKind::Box), (folders, EntryKind::Folder)] {
            for entry in entries {
                match validate_entry(entry, expected) {
                    Ok(()) => accepted.push(entry.clone()),
                    Err(err) => {
                        warn!(error = %err, "skipping finding-aid entry");
                        skipped.push(err);
                    }
                }
            }
        }

        let load = storage.replace_finding_aid(&accepted)?;
        storage.set_meta(LAST_RECONCILED_KEY, &chrono::Utc::now().to_rfc3339())?;

        info!(
            boxes = load.boxes,
            folders = load.folders,
            replaced = load.replaced,
            boxes_in_collection = load.boxes_in_collection,
            folders_in_collection = load.folders_in_collection,
            skipped = skipped.len(),
            "finding aid imported"
        );

        Ok(ImportReport {
            boxes: load.boxes,
            folders: load.folders,
            replaced: load.replaced,
            boxes_in_collection: load.boxes_in_collection,
            folders_in_collection: load.folders_in_collection,
            skipped,
        })
    }

    /// Rebuild the placeholder set from the finding-aid folders that have no
    /// digitized counterpart. Idempotent for unchanged input.
    pub fn synthesize_missing_placeholders(
        &self,
        storage: &mut SqliteStorage,
    ) -> Result<SynthesisReport> {
        let missing = storage.missing_folder_entries()?;
        let placeholders: Vec<Record> = missing
            .iter()
            .filter_map(|entry| self.build_placeholder(entry))
            .collect();

        let (removed, outcome) = storage.replace_placeholders(&placeholders)?;
        let report = SynthesisReport {
            removed,
            inserted: outcome.inserted,
            skipped: outcome.skipped,
        };
        info!(
            removed = report.removed,
            inserted = report.inserted,
            skipped = report.skipped,
            "placeholders synthesized"
        );
        Ok(report)
    }

    /// Placeholder record for one missing folder. `None` for entries without a folder number.
    pub fn build_placeholder(&self, entry: &FindingAidEntry) -> Option<Record> {
        let folder_number = entry.folder_number?;
        let title = entry
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("FF{folder_number} (not digitized)"));

        let (date, date_sort) = extract_trailing_date(&title).unzip();
        let item_type = self.policy.infer_item_type(&title).map(str::to_string);

        Some(Record {
            series: entry.series.as_deref().map(|s| self.policy.map_series(s)),
            date,
            date_sort,
            item_type,
            address: ArchiveAddress {
                box_number: Some(entry.box_number),
                folder_number: Some(folder_number),
                bundle_number: None,
                document_number: None,
            },
            coverage: Some(CoverageStatus::NotDigitized),
            ..Record::new(-folder_number, title)
        })
    }
}

fn validate_entry(entry: &FindingAidEntry, expected: EntryKind) -> Result<(), InputError> {
    if entry.kind != expected {
        return Err(InputError::WrongKind {
            expected,
            found: entry.kind,
            box_number: entry.box_number,
        });
    }
    if entry.box_number <= 0 {
        return Err(InputError::NonPositiveBox {
            box_number: entry.box_number,
        });
    }
    if expected == EntryKind::Folder {
        match entry.folder_number {
            None => {
                return Err(InputError::MissingFolderNumber {
                    box_number: entry.box_number,
                });
            }
            Some(n) if n <= 0 => {
                return Err(InputError::NonPositiveFolder {
                    box_number: entry.box_number,
                    folder_number: n,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
