//! Normalized entity structs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a record corresponds to digitized content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    Digitized,
    /// Known from the finding aid but never scanned. Placeholders carry this.
    NotDigitized,
}

impl CoverageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverageStatus::Digitized => "digitized",
            CoverageStatus::NotDigitized => "not_digitized",
        }
    }

    /// Parse a stored column value. Anything unrecognized is "unknown" (`None`).
    pub fn from_db(value: Option<&str>) -> Option<Self> {
        match value {
            Some("digitized") => Some(CoverageStatus::Digitized),
            Some("not_digitized") => Some(CoverageStatus::NotDigitized),
            _ => None,
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical location of an item: box, folder, bundle, document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArchiveAddress {
    pub box_number: Option<i64>,
    pub folder_number: Option<i64>,
    pub bundle_number: Option<i64>,
    pub document_number: Option<i64>,
}

impl ArchiveAddress {
    pub fn new(box_number: i64, folder_number: i64, bundle_number: i64, document_number: i64) -> Self {
        Self {
            box_number: Some(box_number),
            folder_number: Some(folder_number),
            bundle_number: Some(bundle_number),
            document_number: Some(document_number),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: Option<i64>,
    /// Catalog node id. Negative values are reserved for synthesized placeholders.
    pub external_id: i64,
    pub title: String,
    pub date: Option<String>,
    pub date_sort: Option<String>,
    pub series: Option<String>,
    pub item_type: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub address: ArchiveAddress,
    pub text_content: Option<String>,
    pub coverage: Option<CoverageStatus>,
    pub ocr_status: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub analysis_model: Option<String>,
}

impl Record {
    pub fn new(external_id: i64, title: impl Into<String>) -> Self {
        Self {
            external_id,
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Box,
    Folder,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Box => "box",
            EntryKind::Folder => "folder",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the physical finding aid: a box header or a folder description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FindingAidEntry {
    pub kind: EntryKind,
    pub box_number: i64,
    pub folder_number: Option<i64>,
    pub title: Option<String>,
    pub series: Option<String>,
    pub series_number: Option<String>,
    #[serde(default)]
    pub is_oversize: bool,
    #[serde(default)]
    pub in_digital_collection: bool,
}

impl FindingAidEntry {
    pub fn box_entry(box_number: i64, title: Option<String>) -> Self {
        Self {
            kind: EntryKind::Box,
            box_number,
            folder_number: None,
            title,
            series: None,
            series_number: None,
            is_oversize: false,
            in_digital_collection: false,
        }
    }

    pub fn folder_entry(box_number: i64, folder_number: i64, description: Option<String>) -> Self {
        Self {
            kind: EntryKind::Folder,
            box_number,
            folder_number: Some(folder_number),
            title: description,
            series: None,
            series_number: None,
            is_oversize: false,
            in_digital_collection: false,
        }
    }

    pub fn with_series(mut self, series: impl Into<String>, number: Option<String>) -> Self {
        self.series = Some(series.into());
        self.series_number = number;
        self
    }

    pub fn oversize(mut self, is_oversize: bool) -> Self {
        self.is_oversize = is_oversize;
        self
    }
}
