//! Integration tests for the fixture fetch pipeline, driven with in-memory
//! collaborators.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use actc_error::{HarnessError, Result};
use actc_harness::fetch::{
    FetchConfig, FetchPipeline, HttpClient, MarkupParser, Scraper, ScraperFactory,
};
use actc_harness::fixture_store;
use actc_harness::registry::{RuleBatch, SOURCES, TestCaseDescriptor, group_by_rule};
use actc_types::{Fixture, FixtureId, FixtureKind, PageSnapshot, Verdict};
use serde_json::{Value, json};
use tempfile::tempdir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeHttp {
    bodies: BTreeMap<String, String>,
    requests: RefCell<Vec<(String, String)>>,
}

impl FakeHttp {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_owned(), body.to_owned());
        self
    }
}

impl HttpClient for FakeHttp {
    fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        self.requests
            .borrow_mut()
            .push((url.to_owned(), accept.to_owned()));
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| HarnessError::http(url, "404 Not Found"))
    }
}

struct FakeParser;

impl MarkupParser for FakeParser {
    fn parse_document(&mut self, markup: &str, _url: &str) -> Result<Value> {
        Ok(json!({ "type": "document", "children": [], "source": markup }))
    }
}

/// Shared log of what every scraper instance did.
#[derive(Default)]
struct ScrapeLog {
    opened: usize,
    closed: usize,
    /// `(instance, url)` per scrape call.
    calls: Vec<(usize, String)>,
}

/// Scraper instances fail a URL until it has been attempted `failures[url]`
/// times in total.
struct FakeScrapers {
    log: Rc<RefCell<ScrapeLog>>,
    failures: BTreeMap<String, usize>,
}

struct FakeScraper {
    instance: usize,
    log: Rc<RefCell<ScrapeLog>>,
    failures: BTreeMap<String, usize>,
}

impl ScraperFactory for FakeScrapers {
    fn open(&mut self) -> Result<Box<dyn Scraper>> {
        let instance = {
            let mut log = self.log.borrow_mut();
            log.opened += 1;
            log.opened
        };
        Ok(Box::new(FakeScraper {
            instance,
            log: Rc::clone(&self.log),
            failures: self.failures.clone(),
        }))
    }
}

impl Scraper for FakeScraper {
    fn scrape(&mut self, url: &str) -> Result<PageSnapshot> {
        let mut log = self.log.borrow_mut();
        log.calls.push((self.instance, url.to_owned()));
        let attempts = log.calls.iter().filter(|(_, called)| called == url).count();
        if self.failures.get(url).is_some_and(|failing| attempts <= *failing) {
            return Err(HarnessError::scrape(url, "browser crashed"));
        }
        Ok(PageSnapshot::new(json!({
            "request": { "method": "GET", "url": url, "headers": [{ "name": "user-agent", "value": "x" }] },
            "response": {
                "url": url,
                "status": 200,
                "headers": [
                    { "name": "content-type", "value": "text/html" },
                    { "name": "set-cookie", "value": "id=1" }
                ]
            },
            "document": { "type": "document", "children": [] }
        })))
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closed += 1;
        Ok(())
    }
}

fn scrapers(failures: &[(&str, usize)]) -> (FakeScrapers, Rc<RefCell<ScrapeLog>>) {
    let log = Rc::new(RefCell::new(ScrapeLog::default()));
    let factory = FakeScrapers {
        log: Rc::clone(&log),
        failures: failures
            .iter()
            .map(|(url, count)| ((*url).to_owned(), *count))
            .collect(),
    };
    (factory, log)
}

fn batch(root: &Path, rule: &str, urls: &[&str]) -> Vec<RuleBatch> {
    let descriptors = urls
        .iter()
        .map(|url| TestCaseDescriptor::new(rule, url, Verdict::Passed).expect("valid descriptor"))
        .collect();
    group_by_rule(root, descriptors)
}

fn fixture_path(root: &Path, rule: &str, url: &str) -> std::path::PathBuf {
    root.join(rule).join(FixtureId::from_url(url).file_name())
}

const PAGE_A: &str = "https://act-rules.github.io/testcases/23a2a8/a.html";
const PAGE_B: &str = "https://act-rules.github.io/testcases/23a2a8/b.html";
const FEED: &str = "https://act-rules.github.io/testcases/23a2a8/feed.xml";

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[test]
fn xml_case_never_reaches_the_scraper() {
    let temp = tempdir().expect("tempdir should be created");
    let body = "<?xml version=\"1.0\"?>\n<rss><channel/></rss>";
    let http = FakeHttp::default().with(FEED, body);
    let (mut factory, log) = scrapers(&[]);
    let mut parser = FakeParser;
    let mut pipeline = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default());

    let report = pipeline
        .fetch_batches(&batch(temp.path(), "23a2a8", &[FEED]))
        .expect("fetch runs");

    assert!(report.is_clean());
    assert!(log.borrow().calls.is_empty(), "case=xml_not_scraped");
    assert_eq!(
        http.requests.borrow().as_slice(),
        [(FEED.to_owned(), "application/xml".to_owned())]
    );
    let fixture = fixture_store::read(&fixture_path(temp.path(), "23a2a8", FEED)).expect("fixture");
    assert_eq!(fixture.kind(), FixtureKind::Xml);
    let Fixture::Xml(ignored) = fixture else {
        panic!("xml fixture expected");
    };
    assert_eq!(ignored.data, body, "case=verbatim_body");
    assert_eq!(ignored.url, FEED);
}

#[test]
fn instant_redirect_uses_standalone_parser() {
    let temp = tempdir().expect("tempdir should be created");
    let url = "https://act-rules.github.io/testcases/bc659a/redirect.html";
    let mut descriptor = TestCaseDescriptor::new("bc659a", url, Verdict::Failed).expect("descriptor");
    descriptor.fixture_id = FixtureId::new("0ccdca");
    let batches = group_by_rule(temp.path(), vec![descriptor]);

    let http = FakeHttp::default().with(url, "<meta http-equiv=refresh content=0>");
    let (mut factory, log) = scrapers(&[]);
    let mut parser = FakeParser;
    let report = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_batches(&batches)
        .expect("fetch runs");

    assert!(report.is_clean());
    assert!(log.borrow().calls.is_empty(), "case=redirect_not_scraped");
    let fixture = fixture_store::read(&temp.path().join("bc659a").join("0ccdca.json")).expect("fixture");
    let Fixture::Redirect(test) = fixture else {
        panic!("redirect fixture expected");
    };
    assert_eq!(test.outcome, Verdict::Failed);
    let page = test.page.as_value();
    assert_eq!(page.pointer("/request/headers"), Some(&json!([])));
    assert_eq!(
        page.pointer("/response/headers"),
        Some(&json!([{ "name": "content-type", "value": "text/html" }]))
    );
    assert_eq!(
        page.pointer("/document/source"),
        Some(&json!("<meta http-equiv=refresh content=0>"))
    );
    assert_eq!(page.pointer("/device/viewport/orientation"), Some(&json!("landscape")));
}

#[test]
fn scraped_headers_are_filtered() {
    let temp = tempdir().expect("tempdir should be created");
    let http = FakeHttp::default();
    let (mut factory, _log) = scrapers(&[]);
    let mut parser = FakeParser;
    FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_batches(&batch(temp.path(), "23a2a8", &[PAGE_A]))
        .expect("fetch runs");

    let Fixture::Test(test) =
        fixture_store::read(&fixture_path(temp.path(), "23a2a8", PAGE_A)).expect("fixture")
    else {
        panic!("test fixture expected");
    };
    let page = test.page.as_value();
    assert_eq!(page.pointer("/request/headers"), Some(&json!([])));
    assert_eq!(
        page.pointer("/response/headers"),
        Some(&json!([{ "name": "content-type", "value": "text/html" }]))
    );
}

// ---------------------------------------------------------------------------
// Batch retry
// ---------------------------------------------------------------------------

#[test]
fn transient_failure_recovers_on_fresh_scraper() {
    let temp = tempdir().expect("tempdir should be created");
    let http = FakeHttp::default();
    let (mut factory, log) = scrapers(&[(PAGE_B, 1)]);
    let mut parser = FakeParser;
    let report = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_batches(&batch(temp.path(), "23a2a8", &[PAGE_A, PAGE_B]))
        .expect("fetch runs");

    assert_eq!(report.first_pass_failures, 1);
    assert!(report.unresolved.is_empty(), "case=recovered");
    assert_eq!(report.written.len(), 2);
    assert!(fixture_path(temp.path(), "23a2a8", PAGE_B).is_file());

    let log = log.borrow();
    assert_eq!(log.opened, 2, "case=fresh_scraper_for_retry");
    assert_eq!(log.closed, 2);
    assert_eq!(
        log.calls,
        [
            (1, PAGE_A.to_owned()),
            (1, PAGE_B.to_owned()),
            (2, PAGE_B.to_owned())
        ],
        "case=retry_after_full_first_pass"
    );
}

#[test]
fn persistent_failure_is_not_persisted() {
    let temp = tempdir().expect("tempdir should be created");
    let http = FakeHttp::default();
    let (mut factory, log) = scrapers(&[(PAGE_B, 2)]);
    let mut parser = FakeParser;
    let report = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_batches(&batch(temp.path(), "23a2a8", &[PAGE_A, PAGE_B]))
        .expect("fetch runs");

    assert!(!report.is_clean());
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].item.descriptor.url, PAGE_B);
    assert!(report.unresolved[0].error.is_fetch_failure());
    assert!(!fixture_path(temp.path(), "23a2a8", PAGE_B).exists(), "case=no_tombstone");
    assert!(fixture_path(temp.path(), "23a2a8", PAGE_A).is_file());
    assert_eq!(log.borrow().calls.len(), 3, "case=exactly_one_retry");
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[test]
fn fetch_source_cleans_then_fetches() {
    let temp = tempdir().expect("tempdir should be created");
    let source = SOURCES[0];
    let stale = temp.path().join(source.out_dir).join("deleted").join("ffffff.json");
    std::fs::create_dir_all(stale.parent().expect("parent")).expect("stale dir");
    std::fs::write(&stale, "{}").expect("stale fixture");

    let manifest = json!({
        "testcases": [
            { "ruleId": "23A2A8", "url": PAGE_A, "expected": "passed" },
            { "ruleId": "0va7u6", "url": "https://act-rules.github.io/testcases/0va7u6/x.html", "expected": "failed" }
        ]
    })
    .to_string();
    let http = FakeHttp::default().with(source.manifest_url, &manifest);
    let (mut factory, log) = scrapers(&[]);
    let mut parser = FakeParser;
    let report = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_source(&source, temp.path())
        .expect("source fetched");

    assert!(!stale.exists(), "case=output_cleaned");
    assert_eq!(report.attempted, 1, "case=ignored_rule_skipped");
    assert_eq!(log.borrow().calls.len(), 1);
    let written = temp.path().join(source.out_dir).join("23a2a8");
    assert_eq!(fixture_store::list(&written).expect("listed").len(), 1);
}

#[test]
fn manifest_failure_aborts_the_source() {
    let temp = tempdir().expect("tempdir should be created");
    let http = FakeHttp::default();
    let (mut factory, log) = scrapers(&[]);
    let mut parser = FakeParser;
    let err = FetchPipeline::new(&http, &mut parser, &mut factory, FetchConfig::default())
        .fetch_source(&SOURCES[1], temp.path())
        .expect_err("manifest missing");
    assert!(matches!(err, HarnessError::Http { .. }));
    assert_eq!(log.borrow().opened, 0);
}
