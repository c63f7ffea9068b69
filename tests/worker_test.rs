//! Worker crawl loop against the scripted portal

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use elsa_crawl::crawl_engine::{NoOpProgress, StatsBoard, Worker, WorkerState};
use elsa_crawl::extractors::top_level;
use elsa_crawl::models::ExtractionMethod;
use elsa_crawl::{CrawlConfig, DocumentSink, MemorySink};

mod common;
use common::{FailingSink, MockBrowser, MockPage, Portal, fast_builder, fast_config, href};

async fn ready_worker(
    browser: &MockBrowser,
    config: CrawlConfig,
    sink: Arc<dyn DocumentSink>,
    board: StatsBoard,
) -> Worker<MockPage> {
    let mut worker = Worker::new(
        0,
        browser.session(),
        Arc::new(config),
        sink,
        Arc::new(NoOpProgress),
        board,
    );
    worker.initialize().await.expect("worker initializes");
    assert_eq!(worker.state(), WorkerState::FramesDetected);
    worker
}

#[tokio::test]
async fn second_visit_of_a_category_is_a_no_op() {
    let browser = MockBrowser::new(Portal::new().root("Motor", "01").with_listing("01", &["123/45"]));
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(roots.len(), 1);

    assert_eq!(worker.crawl_category(roots[0].clone()).await, 1);
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 0);

    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().documents_extracted(), 1);
    assert_eq!(sink.len(), 1);
    assert_eq!(worker.state(), WorkerState::Crawling);
}

#[tokio::test]
async fn placeholder_parent_yields_its_children_as_roots() {
    let placeholder = json!({ "name": "imageA", "href": "javascript:emptyPage()" });
    let portal = Portal::new()
        .node(json!({ "name": "imageA", "href": "javascript:emptyPage()", "depth": 1, "hasChildren": true, "parent": null }))
        .node(json!({ "name": "A1", "href": href("01.01"), "depth": 2, "hasChildren": false, "parent": placeholder }))
        .node(json!({ "name": "A2", "href": href("01.02"), "depth": 2, "hasChildren": false, "parent": placeholder }))
        .root("B", "02")
        .with_listing("01.01", &["11/1"])
        .with_listing("01.02", &["12/1"])
        .with_listing("02", &["20/1"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let categories = worker.discover_categories().await.expect("categories");
    let roots = top_level(&categories);
    let names: Vec<&str> = roots.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["A1", "A2", "B"]);

    let stats = worker.crawl_partition(roots).await;
    assert_eq!(stats.categories_crawled(), 3);
    assert_eq!(stats.documents_extracted(), 3);
    assert_eq!(stats.errors(), 0);
    assert_eq!(sink.len(), 3);
    assert_eq!(worker.state(), WorkerState::Done);
    assert!(stats.end_time().is_some());
}

#[tokio::test]
async fn unclickable_root_counts_one_error_and_returns_nothing() {
    let portal = Portal::new()
        .root("Motor", "01")
        .root("Getriebe", "02")
        .with_broken_link("01")
        .with_listing("01", &["1/1"])
        .with_listing("02", &["2/1"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 0);
    assert_eq!(worker.stats().errors(), 1);
    assert_eq!(worker.stats().categories_crawled(), 0);

    assert_eq!(worker.crawl_category(roots[1].clone()).await, 1);
    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().errors(), 1);
    assert_eq!(sink.records()[0].document.category_id, "02");
}

#[tokio::test]
async fn failed_activation_skips_the_branch_but_not_its_siblings() {
    let portal = Portal::new()
        .with_children("Motor", &[("Zylinderkopf", "01.01"), ("Kurbeltrieb", "01.02")])
        .root("Motor", "01")
        .with_broken_link("01.01")
        .with_listing("01.02", &["4711/2"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    let documents = worker.crawl_category(roots[0].clone()).await;

    assert_eq!(documents, 1);
    assert_eq!(worker.stats().categories_crawled(), 2);
    assert_eq!(worker.stats().errors(), 1);
    let records = sink.records();
    assert_eq!(records[0].document.category_name, "Kurbeltrieb");
    assert_eq!(records[0].document.metadata["category_depth"], json!(2));
}

#[tokio::test]
async fn repeated_case_number_is_extracted_once() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["123/45", "123/45", "678/9"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 2);

    let keys: Vec<String> = sink.records().into_iter().map(|r| r.document.document_key).collect();
    assert_eq!(keys, ["123/45", "678/9"]);
    assert_eq!(browser.journal.document_clicks.load(Ordering::SeqCst), 2);
    assert_eq!(worker.stats().errors(), 0);
}

#[tokio::test]
async fn listing_is_capped_per_category() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["1/1", "2/2", "3/3", "4/4"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let config = fast_builder(1)
        .max_documents_per_category(2)
        .build()
        .expect("config");
    let mut worker = ready_worker(&browser, config, sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 2);
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn invalid_document_is_skipped_without_error() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["9/9"])
        .with_document("9/9", "Keine Daten");
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 0);
    assert!(sink.is_empty());
    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().errors(), 0);
}

#[tokio::test]
async fn short_document_is_found_by_the_frame_scan() {
    let short = format!("Kundenaussage: Geräusch beim Anfahren {}", "x".repeat(80));
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["5/5", "6/6"])
        .with_document("6/6", short.clone());
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 2);

    let records = sink.records();
    assert_eq!(records[0].document.extraction_method, ExtractionMethod::Primary);
    assert_eq!(records[1].document.extraction_method, ExtractionMethod::Fallback);
    assert_eq!(records[1].document.content, short);
}

#[tokio::test]
async fn late_rendering_listing_is_waited_for() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["1/1", "2/2"])
        .with_listing_delay(2);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let config = fast_builder(1).frame_retry(4, 0).build().expect("config");
    let mut worker = ready_worker(&browser, config, sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 2);

    assert_eq!(sink.len(), 2);
    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().errors(), 0);
}

#[tokio::test]
async fn category_link_missing_at_first_is_clicked_again() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["1/1"])
        .with_flaky_link("01", 2);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let config = fast_builder(1).frame_retry(3, 0).build().expect("config");
    let mut worker = ready_worker(&browser, config, sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 1);

    assert_eq!(browser.journal.category_clicks.load(Ordering::SeqCst), 3);
    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().errors(), 0);
}

#[tokio::test]
async fn unclickable_document_row_counts_an_error_and_the_rest_follow() {
    let portal = Portal::new()
        .root("Motor", "01")
        .with_listing("01", &["1/1", "2/2", "3/3"])
        .with_dead_row("2/2");
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(MemorySink::new());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    assert_eq!(worker.crawl_category(roots[0].clone()).await, 2);

    let keys: Vec<String> = sink.records().into_iter().map(|r| r.document.document_key).collect();
    assert_eq!(keys, ["1/1", "3/3"]);
    assert_eq!(worker.stats().errors(), 1);
    assert_eq!(worker.stats().categories_crawled(), 1);
}

#[tokio::test]
async fn failing_sink_does_not_change_the_counts() {
    let portal = Portal::new()
        .root("Motor", "01")
        .root("Getriebe", "02")
        .with_listing("01", &["1/1", "1/2"])
        .with_listing("02", &["2/1"]);
    let browser = MockBrowser::new(portal);
    let sink = Arc::new(FailingSink::default());
    let mut worker = ready_worker(&browser, fast_config(1), sink.clone(), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    let stats = worker.crawl_partition(roots).await;

    assert_eq!(stats.categories_crawled(), 2);
    assert_eq!(stats.documents_extracted(), 3);
    assert_eq!(stats.errors(), 0);
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(worker.state(), WorkerState::Done);
}

#[tokio::test]
async fn unrendered_parent_is_treated_as_a_leaf() {
    let portal = Portal::new()
        .with_children("Motor", &[("Zylinderkopf", "01.01")])
        .root("Motor", "01")
        .with_hidden("Motor");
    let browser = MockBrowser::new(portal);
    let mut worker =
        ready_worker(&browser, fast_config(1), Arc::new(MemorySink::new()), StatsBoard::new()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    worker.crawl_category(roots[0].clone()).await;
    assert_eq!(worker.stats().categories_crawled(), 1);
    assert_eq!(worker.stats().errors(), 0);
}

#[tokio::test]
async fn published_stats_only_grow() {
    let portal = Portal::new()
        .root("Motor", "01")
        .root("Getriebe", "02")
        .root("Fahrwerk", "03")
        .with_broken_link("02")
        .with_listing("01", &["1/1"])
        .with_listing("03", &["3/1", "3/2"]);
    let browser = MockBrowser::new(portal);
    let board = StatsBoard::new();
    let mut worker =
        ready_worker(&browser, fast_config(1), Arc::new(MemorySink::new()), board.clone()).await;

    let roots = top_level(&worker.discover_categories().await.expect("categories"));
    let mut previous = board.aggregate();
    for root in roots {
        worker.crawl_category(root).await;
        let current = board.aggregate();
        assert!(current.categories_crawled() >= previous.categories_crawled());
        assert!(current.documents_extracted() >= previous.documents_extracted());
        assert!(current.errors() >= previous.errors());
        previous = current;
    }

    assert_eq!(previous.categories_crawled(), 2);
    assert_eq!(previous.documents_extracted(), 3);
    assert_eq!(previous.errors(), 1);
    assert_eq!(board.snapshot()[0], *worker.stats());
}

#[tokio::test]
async fn initialization_fails_on_a_dead_session() {
    let browser = MockBrowser::new(Portal::new().root("Motor", "01")).with_broken_sessions(1);
    let session = elsa_crawl::BrowserBackend::new_session(&browser, Some(&Default::default()))
        .await
        .expect("session");
    let mut worker = Worker::new(
        3,
        session,
        Arc::new(fast_config(1)),
        Arc::new(MemorySink::new()),
        Arc::new(NoOpProgress),
        StatsBoard::new(),
    );

    let err = worker.initialize().await.expect_err("navigation fails");
    assert!(err.to_string().contains("navigate"), "{err}");
    assert_eq!(worker.state(), WorkerState::SearchingVehicle);
}
