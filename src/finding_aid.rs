//! Plain-text finding-aid guide parser.
//!
//! The guide is front matter followed by a container list:
//!
//! ```text
//! Series I.  Personal Papers -- (1909) 1929-1979
//! Box 1
//! Biographical Material
//! FF1	Simon, Herbert A. -- Personal Papers -- Biography -- 1929
//! Over-Size Box 2
//! Box 1 - Continued
//! ```
//!
//! Everything before the first series header carrying ` -- ` is front matter.
//! A box title is the first non-blank line after the box header, unless that
//! line is itself a box or folder line.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::model::types::FindingAidEntry;
use crate::reconcile::InputError;

static SERIES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Series\s+([IVX]+)[.:]\s+(.+?)(?:\s+--\s*.+|\s+\d{4}.+)?$").expect("series regex")
});
static BOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Over-Size\s+)?Box\s+(\d+)$").expect("box regex"));
static BOX_CONTINUED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Over-Size\s+)?Box\s+\d+\s*-\s*Continued").expect("box continued regex")
});
static FOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FF(\d+)\t(.+)$").expect("folder regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedGuide {
    pub boxes: Vec<FindingAidEntry>,
    pub folders: Vec<FindingAidEntry>,
    pub skipped: Vec<InputError>,
}

pub fn parse_guide_file(path: &Path) -> Result<ParsedGuide> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading finding-aid guide {}", path.display()))?;
    Ok(parse_guide(&text))
}

pub fn parse_guide(text: &str) -> ParsedGuide {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut parsed = ParsedGuide::default();
    let mut seen_boxes: HashSet<i64> = HashSet::new();

    let mut series: Option<(String, String)> = None;
    let mut current_box: Option<i64> = None;
    let mut in_container_list = false;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = SERIES_RE.captures(line) {
            if !in_container_list && !line.contains(" -- ") {
                continue;
            }
            in_container_list = true;
            series = Some((caps[2].trim().to_string(), caps[1].to_string()));
            continue;
        }
        if !in_container_list || BOX_CONTINUED_RE.is_match(line) {
            continue;
        }

        if let Some(caps) = BOX_RE.captures(line) {
            let Ok(box_number) = caps[1].parse::<i64>() else {
                warn!(line = idx + 1, "box number out of range");
                continue;
            };
            current_box = Some(box_number);
            if !seen_boxes.insert(box_number) {
                continue;
            }
            let mut entry = FindingAidEntry::box_entry(box_number, box_title(&lines[idx + 1..]))
                .oversize(line.starts_with("Over-Size"));
            if let Some((name, number)) = &series {
                entry = entry.with_series(name.clone(), Some(number.clone()));
            }
            parsed.boxes.push(entry);
            continue;
        }

        if let Some(caps) = FOLDER_RE.captures(line) {
            let Ok(folder_number) = caps[1].parse::<i64>() else {
                warn!(line = idx + 1, "folder number out of range");
                continue;
            };
            let Some(box_number) = current_box else {
                let err = InputError::FolderBeforeBox {
                    line: idx + 1,
                    folder_number,
                };
                warn!(error = %err, "skipping guide line");
                parsed.skipped.push(err);
                continue;
            };
            let mut entry = FindingAidEntry::folder_entry(
                box_number,
                folder_number,
                Some(caps[2].trim().to_string()),
            );
            if let Some((name, number)) = &series {
                entry = entry.with_series(name.clone(), Some(number.clone()));
            }
            parsed.folders.push(entry);
        }
    }

    tracing::debug!(
        boxes = parsed.boxes.len(),
        folders = parsed.folders.len(),
        skipped = parsed.skipped.len(),
        "parsed finding-aid guide"
    );
    parsed
}

fn box_title(following: &[&str]) -> Option<String> {
    let next = following.iter().map(|l| l.trim()).find(|l| !l.is_empty())?;
    if FOLDER_RE.is_match(next) || BOX_RE.is_match(next) {
        None
    } else {
        Some(next.to_string())
    }
}
