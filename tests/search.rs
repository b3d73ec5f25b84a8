use archive_catalog::model::types::{ArchiveAddress, CoverageStatus, Record};
use archive_catalog::search::query::{
    Coverage, SearchConfig, SearchExecutor, SearchResults, SortDirection, SortField,
};
use archive_catalog::storage::sqlite::SqliteStorage;

mod util;
use util::{TestTracing, digitized, seed_collection};

fn seeded() -> SqliteStorage {
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    seed_collection(&mut storage);
    storage
}

fn ids(results: &SearchResults) -> Vec<i64> {
    results.records.iter().map(|r| r.external_id).collect()
}

fn search(storage: &SqliteStorage, config: SearchConfig) -> SearchResults {
    SearchExecutor::new(storage).search(&config).unwrap()
}

#[test]
fn empty_query_lists_digitized_records_newest_first() {
    let storage = seeded();
    let results = search(&storage, SearchConfig::default());
    assert_eq!(results.total, 4);
    assert_eq!(ids(&results), vec![104, 103, 102, 101]);
}

#[test]
fn boolean_operators_and_phrases() {
    let storage = seeded();

    let and = search(&storage, SearchConfig::with_query("chess program"));
    assert_eq!(ids(&and), vec![102]);

    let or = search(&storage, SearchConfig::with_query("chess OR artificial"));
    assert_eq!(or.total, 2);

    let not = search(&storage, SearchConfig::with_query("search NOT problem"));
    assert_eq!(ids(&not), vec![103]);

    let phrase = search(&storage, SearchConfig::with_query("\"bounded rationality\""));
    assert_eq!(ids(&phrase), vec![101]);

    let grouped = search(
        &storage,
        SearchConfig::with_query("(chess OR rationality) AND newell"),
    );
    assert_eq!(ids(&grouped), vec![102]);
}

#[test]
fn malformed_queries_degrade_instead_of_failing() {
    let storage = seeded();
    for raw in [
        "simon \"unterminated",
        "AND OR NOT",
        "(((",
        ")))",
        "chess AND",
        "\"\"",
        "* ^ : {",
    ] {
        let result = SearchExecutor::new(&storage).search(&SearchConfig::with_query(raw));
        assert!(result.is_ok(), "query {raw:?} failed: {result:?}");
    }

    // Operator-only input adds no full-text predicate at all.
    let everything = search(&storage, SearchConfig::with_query("AND OR"));
    assert_eq!(everything.total, 4);
}

#[test]
fn leading_not_never_returns_the_excluded_term() {
    let storage = seeded();
    for raw in [
        "NOT chess",
        "not chess",
        "NOT chess OR rationality",
        "NOT (chess OR rationality) search",
        "NOT \"chess program\"",
    ] {
        let results = search(&storage, SearchConfig::with_query(raw));
        for record in &results.records {
            let body = record.text_content.as_deref().unwrap_or("").to_lowercase();
            assert!(
                !record.title.to_lowercase().contains("chess") && !body.contains("chess"),
                "{raw:?} returned {}",
                record.external_id
            );
        }
    }
    assert_eq!(
        ids(&search(&storage, SearchConfig::with_query("NOT chess"))),
        vec![104, 103, 101]
    );
}

#[test]
fn punctuation_only_words_are_ignored() {
    let storage = seeded();
    let results = search(&storage, SearchConfig::with_query("chess - newell _"));
    assert_eq!(ids(&results), vec![102]);
}

#[test]
fn fuzzy_matches_substrings_case_insensitively() {
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .insert_records_batched(&[
            digitized(1, "Simons Hall Memo", 1, 1),
            digitized(2, "Unrelated", 1, 2),
            digitized(3, "Économie politique", 1, 3),
        ])
        .unwrap();

    let config = SearchConfig {
        fuzzy: true,
        ..SearchConfig::with_query("simon")
    };
    assert_eq!(ids(&search(&storage, config)), vec![1]);

    let accented = SearchConfig {
        fuzzy: true,
        ..SearchConfig::with_query("économie")
    };
    assert_eq!(ids(&search(&storage, accented)), vec![3]);
}

#[test]
fn fuzzy_treats_wildcards_literally() {
    let storage = seeded();
    let percent = SearchConfig {
        fuzzy: true,
        ..SearchConfig::with_query("100%")
    };
    assert_eq!(ids(&search(&storage, percent)), vec![104]);

    let underscore = SearchConfig {
        fuzzy: true,
        ..SearchConfig::with_query("e_s")
    };
    assert_eq!(ids(&search(&storage, underscore)), vec![104]);
}

#[test]
fn regex_matches_title_or_body() {
    let storage = seeded();
    let config = SearchConfig {
        use_regex: true,
        ..SearchConfig::with_query(r"artificial|\bchess\b")
    };
    assert_eq!(ids(&search(&storage, config)), vec![103, 102]);
}

#[test]
fn invalid_regex_returns_empty_and_warns() {
    let storage = seeded();
    let tracing = TestTracing::new();
    let _guard = tracing.install();

    let config = SearchConfig {
        use_regex: true,
        ..SearchConfig::with_query("[unclosed")
    };
    let results = search(&storage, config);
    assert_eq!(results, SearchResults::default());
    tracing.assert_contains("regex search matches nothing");
}

#[test]
fn search_logs_mode() {
    let storage = seeded();
    let tracing = TestTracing::new();
    let _guard = tracing.install();
    search(&storage, SearchConfig::with_query("chess"));
    tracing.assert_contains("search_start");
    tracing.assert_contains("Boolean");
}

#[test]
fn coverage_partitions_the_collection() {
    let storage = seeded();
    let with = |coverage| SearchConfig {
        coverage,
        limit: 100,
        ..SearchConfig::default()
    };

    let digitized = search(&storage, with(Coverage::Digitized));
    let missing = search(&storage, with(Coverage::Missing));
    let all = search(&storage, with(Coverage::All));

    assert!(
        digitized
            .records
            .iter()
            .all(|r| r.coverage != Some(CoverageStatus::NotDigitized))
    );
    assert_eq!(ids(&missing), vec![-9]);
    assert_eq!(all.total, digitized.total + missing.total);
}

#[test]
fn unknown_coverage_counts_as_digitized() {
    let storage = seeded();
    let id = storage
        .insert_record(&Record::new(500, "Uncatalogued scan"))
        .unwrap();
    assert!(storage.get_record(id).unwrap().unwrap().coverage.is_none());

    let results = search(&storage, SearchConfig::with_query("uncatalogued"));
    assert_eq!(ids(&results), vec![500]);
}

#[test]
fn archive_order_sorts_all_components() {
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    let at = |external_id, doc| Record {
        address: ArchiveAddress::new(1, 1, 1, doc),
        ..Record::new(external_id, format!("doc {doc}"))
    };
    storage
        .insert_records_batched(&[at(1, 2), at(2, 1)])
        .unwrap();

    let asc = SearchConfig {
        sort_by: SortField::ArchiveOrder,
        sort_order: SortDirection::Asc,
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, asc.clone())), vec![2, 1]);

    let desc = SearchConfig {
        sort_order: SortDirection::Desc,
        ..asc
    };
    assert_eq!(ids(&search(&storage, desc)), vec![1, 2]);
}

#[test]
fn tags_are_required_case_insensitively() {
    let mut storage = SqliteStorage::open_in_memory().unwrap();
    storage
        .insert_records_batched(&[
            Record {
                tags: vec!["ai".into(), "economics".into(), "cmu".into()],
                ..digitized(1, "both", 1, 1)
            },
            Record {
                tags: vec!["ai".into()],
                ..digitized(2, "one", 1, 2)
            },
            digitized(3, "none", 1, 3),
        ])
        .unwrap();

    let config = SearchConfig {
        tags: vec!["AI".into(), "Economics".into()],
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, config)), vec![1]);

    // Whole tags only.
    let partial = SearchConfig {
        tags: vec!["econ".into()],
        ..SearchConfig::default()
    };
    assert_eq!(search(&storage, partial).total, 0);
}

#[test]
fn equality_and_range_filters_combine() {
    let storage = seeded();

    let by_series = SearchConfig {
        series: Some("Writings".into()),
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, by_series)), vec![104, 103]);

    let by_range = SearchConfig {
        date_from: Some("1957".into()),
        date_to: Some("1970".into()),
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, by_range)), vec![103, 102]);

    let by_location = SearchConfig {
        box_number: Some(2),
        folder_number: Some(8),
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, by_location)), vec![104]);

    let by_analysis = SearchConfig {
        analysis_model: Some("model-b".into()),
        language: Some("en".into()),
        item_type: Some("article".into()),
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, by_analysis)), vec![103]);
}

#[test]
fn total_ignores_pagination() {
    let storage = seeded();
    let config = SearchConfig {
        sort_by: SortField::Id,
        sort_order: SortDirection::Asc,
        limit: 2,
        offset: 1,
        ..SearchConfig::default()
    };
    let page = search(&storage, config);
    assert_eq!(page.total, 4);
    assert_eq!(ids(&page), vec![102, 103]);

    let past_end = SearchConfig {
        offset: 10,
        ..SearchConfig::default()
    };
    let empty = search(&storage, past_end);
    assert_eq!(empty.total, 4);
    assert!(empty.records.is_empty());
}

#[test]
fn unknown_sort_name_falls_back() {
    let storage = seeded();
    let config = SearchConfig {
        sort_by: SortField::from_name("created_at; DROP TABLE records"),
        ..SearchConfig::default()
    };
    assert_eq!(ids(&search(&storage, config)), vec![104, 103, 102, 101]);
    assert_eq!(storage.count_records().unwrap(), 5);
}
