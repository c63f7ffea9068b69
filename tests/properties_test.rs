//! Property tests for partitioning, the document validity gate and stats

use proptest::prelude::*;
use std::collections::HashSet;

use elsa_crawl::crawl_engine::partition;
use elsa_crawl::extractors::document_key;
use elsa_crawl::models::{CrawlerStats, is_valid_document_text};
use elsa_crawl::utils::DOCUMENT_MARKERS;

proptest! {
    #[test]
    fn partitions_are_disjoint_and_cover_every_root(count in 0usize..60, workers in 1usize..=10) {
        let roots: Vec<usize> = (0..count).collect();
        let parts = partition(&roots, workers);
        prop_assert_eq!(parts.len(), workers);

        let mut seen = HashSet::new();
        for part in &parts {
            for root in part {
                prop_assert!(seen.insert(*root), "root {} assigned twice", root);
            }
        }
        prop_assert_eq!(seen.len(), count);

        let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn text_under_the_minimum_is_never_valid(text in "\\PC{0,99}") {
        prop_assert!(!is_valid_document_text(&text));
    }

    #[test]
    fn long_text_without_markers_is_invalid(text in "[a-z ]{100,300}") {
        prop_assert!(!is_valid_document_text(&text));
    }

    #[test]
    fn long_text_with_a_marker_is_valid(
        marker in prop::sample::select(DOCUMENT_MARKERS.to_vec()),
        filler in "[a-z ]{100,300}",
    ) {
        let text = format!("{marker} {filler}");
        prop_assert!(is_valid_document_text(&text));
    }

    #[test]
    fn document_key_is_the_first_case_number(a in 1u32..99_999, b in 1u32..99, c in 1u32..99_999, d in 1u32..99) {
        let row = format!("12.03.2024 {a}/{b} Kundenbeanstandung {c}/{d}");
        let expected = format!("{a}/{b}");
        prop_assert_eq!(document_key(&row), Some(expected));
    }

    #[test]
    fn aggregate_is_the_sum_of_workers(events in prop::collection::vec((0u8..3, 0usize..4), 0..200)) {
        let mut workers = vec![CrawlerStats::new(); 4];
        let (mut categories, mut documents, mut errors) = (0u64, 0u64, 0u64);
        for (kind, worker) in events {
            let before = workers[worker].clone();
            match kind {
                0 => { workers[worker].record_category(); categories += 1; }
                1 => { workers[worker].record_document(); documents += 1; }
                _ => { workers[worker].record_error(); errors += 1; }
            }
            prop_assert!(workers[worker].categories_crawled() >= before.categories_crawled());
            prop_assert!(workers[worker].documents_extracted() >= before.documents_extracted());
            prop_assert!(workers[worker].errors() >= before.errors());
        }

        let total = CrawlerStats::aggregate(&workers);
        prop_assert_eq!(total.categories_crawled(), categories);
        prop_assert_eq!(total.documents_extracted(), documents);
        prop_assert_eq!(total.errors(), errors);
    }
}
