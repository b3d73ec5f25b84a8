use archive_catalog::model::types::{ArchiveAddress, CoverageStatus, Record};
use archive_catalog::storage::sqlite::SqliteStorage;
use std::path::PathBuf;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A digitized record at `(box, folder, 1, 1)`.
#[allow(dead_code)]
pub fn digitized(external_id: i64, title: &str, box_number: i64, folder: i64) -> Record {
    Record {
        address: ArchiveAddress::new(box_number, folder, 1, 1),
        coverage: Some(CoverageStatus::Digitized),
        ..Record::new(external_id, title)
    }
}

/// On-disk catalog inside a temp dir; the dir lives as long as the returned guard.
#[allow(dead_code)]
pub fn temp_catalog() -> (TempDir, PathBuf, SqliteStorage) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("catalog.db");
    let storage = SqliteStorage::open(&db_path).unwrap();
    (dir, db_path, storage)
}

/// A small collection spanning two series, three boxes, tags and a placeholder.
#[allow(dead_code)]
pub fn seed_collection(storage: &mut SqliteStorage) {
    let mut records = vec![
        Record {
            series: Some("Personal Papers".into()),
            item_type: Some("article".into()),
            date: Some("1956".into()),
            date_sort: Some("1956-01-01".into()),
            text_content: Some("Notes on bounded rationality and choice.".into()),
            tags: vec!["Economics".into(), "Decision Making".into()],
            language: Some("en".into()),
            analysis_model: Some("model-a".into()),
            ..digitized(101, "Rational Choice and Environment", 1, 1)
        },
        Record {
            series: Some("Personal Papers".into()),
            item_type: Some("letter".into()),
            date: Some("1958".into()),
            date_sort: Some("1958-06-12".into()),
            text_content: Some("Dear Allen, the chess program ran overnight.".into()),
            tags: vec!["AI".into(), "Chess".into()],
            language: Some("en".into()),
            ..digitized(102, "Letter to Newell", 1, 2)
        },
        Record {
            series: Some("Writings".into()),
            item_type: Some("article".into()),
            date: Some("1969".into()),
            date_sort: Some("1969-03-01".into()),
            text_content: Some("The sciences of the artificial: design as search.".into()),
            tags: vec!["ai".into(), "Design".into()],
            language: Some("en".into()),
            analysis_model: Some("model-b".into()),
            ..digitized(103, "The Sciences of the Artificial", 2, 7)
        },
        Record {
            series: Some("Writings".into()),
            item_type: Some("chapter".into()),
            date: Some("1972".into()),
            date_sort: Some("1972".into()),
            text_content: Some("Problem spaces, 100% coverage of the_search tree.".into()),
            language: Some("fr".into()),
            ..digitized(104, "Human Problem Solving", 2, 8)
        },
    ];
    records.push(Record {
        series: Some("Writings".into()),
        date_sort: Some("1975".into()),
        coverage: Some(CoverageStatus::NotDigitized),
        ..Record {
            address: ArchiveAddress {
                box_number: Some(3),
                folder_number: Some(9),
                ..ArchiveAddress::default()
            },
            ..Record::new(-9, "Simon -- Writings -- Article -- 1975")
        }
    });
    storage.insert_records_batched(&records).unwrap();
}
