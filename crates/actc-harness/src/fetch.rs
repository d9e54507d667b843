//! Fixture fetch pipeline.
//!
//! Every descriptor is turned into a [`Fixture`] by exactly one strategy:
//!
//! - `.xml` resources are fetched over plain HTTP and stored verbatim;
//! - instant-redirect resources are fetched over plain HTTP, parsed with a
//!   standalone markup parser and wrapped in a synthesized page snapshot;
//! - everything else goes through the scraper, with headers scrubbed.
//!
//! Descriptors are processed sequentially against a single scraper. Failures
//! of the first pass are retried once with a freshly opened scraper and are
//! never persisted if they keep failing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use actc_error::Result;
use actc_types::{Fixture, IgnoredFixture, PageSnapshot, TestFixture};
use serde_json::{Value, json};
use tracing::{debug, info, info_span, warn};

use crate::fixture_store;
use crate::headers::{HEADER_ALLOW_LIST, scrub_page_headers};
use crate::registry::{RuleBatch, Source, TestCaseDescriptor, group_by_rule, parse_manifest};
use crate::retry::{Failure, Phase, run_with_single_retry};

const XML_ACCEPT: &str = "application/xml";
const HTML_ACCEPT: &str = "text/html";
const MANIFEST_ACCEPT: &str = "application/json";

/// A live scraper instance. Not shared between threads; one page at a time.
pub trait Scraper {
    fn scrape(&mut self, url: &str) -> Result<PageSnapshot>;

    fn close(&mut self) -> Result<()>;
}

/// Starts scraper instances; called once per fetch phase.
pub trait ScraperFactory {
    fn open(&mut self) -> Result<Box<dyn Scraper>>;
}

/// Plain HTTP GET returning the body as text. Non-success statuses are errors.
pub trait HttpClient {
    fn get_text(&self, url: &str, accept: &str) -> Result<String>;
}

/// Parses markup into a serialized document tree without a browser.
pub trait MarkupParser {
    fn parse_document(&mut self, markup: &str, url: &str) -> Result<Value>;
}

/// How a descriptor is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Xml,
    InstantRedirect,
    Scrape,
}

impl FetchStrategy {
    pub fn for_descriptor(descriptor: &TestCaseDescriptor) -> Self {
        if descriptor.is_xml() {
            Self::Xml
        } else if descriptor.is_instant_redirect() {
            Self::InstantRedirect
        } else {
            Self::Scrape
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::InstantRedirect => "redirect",
            Self::Scrape => "scrape",
        }
    }
}

/// Device profile of synthesized pages: a 1280x720 landscape screen.
pub fn standard_device() -> Value {
    json!({
        "type": "screen",
        "viewport": { "width": 1280, "height": 720, "orientation": "landscape" },
        "display": { "resolution": 1, "scan": "progressive" },
        "scripting": { "enabled": true },
        "preferences": []
    })
}

/// Minimal page snapshot around a standalone-parsed document.
pub fn synthesize_redirect_page(url: &str, document: Value) -> PageSnapshot {
    PageSnapshot::new(json!({
        "request": { "method": "GET", "url": url, "headers": [] },
        "response": {
            "url": url,
            "status": 200,
            "headers": [{ "name": HEADER_ALLOW_LIST[0], "value": "text/html" }],
            "body": ""
        },
        "document": document,
        "device": standard_device()
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Pause between two consecutive fetches.
    pub delay: Duration,
    /// Remove a source's output directory before fetching into it.
    pub clean: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            clean: true,
        }
    }
}

/// A descriptor together with the directory its fixture goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    pub directory: PathBuf,
    pub descriptor: TestCaseDescriptor,
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub attempted: usize,
    pub written: Vec<PathBuf>,
    pub first_pass_failures: usize,
    pub unresolved: Vec<Failure<FetchItem>>,
}

impl FetchReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Fold the report of another source into this one.
    pub fn absorb(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.written.extend(other.written);
        self.first_pass_failures += other.first_pass_failures;
        self.unresolved.extend(other.unresolved);
    }
}

/// Drives the collaborators over a set of rule batches.
pub struct FetchPipeline<'a> {
    http: &'a dyn HttpClient,
    parser: &'a mut dyn MarkupParser,
    scrapers: &'a mut dyn ScraperFactory,
    config: FetchConfig,
}

impl<'a> FetchPipeline<'a> {
    pub fn new(
        http: &'a dyn HttpClient,
        parser: &'a mut dyn MarkupParser,
        scrapers: &'a mut dyn ScraperFactory,
        config: FetchConfig,
    ) -> Self {
        Self {
            http,
            parser,
            scrapers,
            config,
        }
    }

    /// Fetch one upstream source into `<root>/<source dir>`.
    pub fn fetch_source(&mut self, source: &Source, root: &Path) -> Result<FetchReport> {
        let out = root.join(source.out_dir);
        info!(source = source.name, url = source.manifest_url, "fetching test case manifest");
        let manifest = self.http.get_text(source.manifest_url, MANIFEST_ACCEPT)?;
        let descriptors = parse_manifest(&manifest)?;
        if self.config.clean {
            info!(dir = %out.display(), "cleaning output directory");
            clean_dir(&out)?;
        }
        let batches = group_by_rule(&out, descriptors);
        info!(
            source = source.name,
            rules = batches.len(),
            "test cases grouped by rule"
        );
        self.fetch_batches(&batches)
    }

    /// Fetch every descriptor of `batches`, retrying failures once.
    pub fn fetch_batches(&mut self, batches: &[RuleBatch]) -> Result<FetchReport> {
        let Self {
            http,
            parser,
            scrapers,
            config,
        } = self;
        let items: Vec<FetchItem> = batches
            .iter()
            .flat_map(|batch| {
                batch.tests.iter().map(|descriptor| FetchItem {
                    directory: batch.directory.clone(),
                    descriptor: descriptor.clone(),
                })
            })
            .collect();

        let mut written = Vec::new();
        let mut first_fetch = true;
        let report = run_with_single_retry(
            items,
            |phase| {
                debug!(phase = phase.as_str(), "opening scraper");
                scrapers.open()
            },
            |scraper, item, phase| {
                if !first_fetch && !config.delay.is_zero() {
                    std::thread::sleep(config.delay);
                }
                first_fetch = false;
                let path = fetch_item(*http, &mut **parser, &mut **scraper, item, phase)?;
                written.push(path);
                Ok(())
            },
            |mut scraper| scraper.close(),
        )?;

        for failure in &report.unresolved {
            warn!(
                rule = %failure.item.descriptor.rule_id,
                fixture = %failure.item.descriptor.fixture_id,
                url = %failure.item.descriptor.url,
                error = %failure.error,
                "still failing after two attempts"
            );
        }

        Ok(FetchReport {
            attempted: report.attempted,
            written,
            first_pass_failures: report.first_pass_failures,
            unresolved: report.unresolved,
        })
    }
}

fn fetch_item(
    http: &dyn HttpClient,
    parser: &mut dyn MarkupParser,
    scraper: &mut dyn Scraper,
    item: &FetchItem,
    phase: Phase,
) -> Result<PathBuf> {
    let descriptor = &item.descriptor;
    let strategy = FetchStrategy::for_descriptor(descriptor);
    let span = info_span!(
        "rule",
        rule = %descriptor.rule_id,
        fixture = %descriptor.fixture_id,
        phase = phase.as_str()
    );
    let _guard = span.enter();

    let started = Instant::now();
    let fixture = fetch_fixture(http, parser, scraper, descriptor, strategy)?;
    let path = fixture_store::write(&item.directory, &fixture)?;
    info!(
        strategy = strategy.as_str(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "fixture written"
    );
    Ok(path)
}

/// Produce the fixture for one descriptor without touching the disk.
pub fn fetch_fixture(
    http: &dyn HttpClient,
    parser: &mut dyn MarkupParser,
    scraper: &mut dyn Scraper,
    descriptor: &TestCaseDescriptor,
    strategy: FetchStrategy,
) -> Result<Fixture> {
    let id = descriptor.fixture_id.clone();
    match strategy {
        FetchStrategy::Xml => {
            let data = http.get_text(&descriptor.url, XML_ACCEPT)?;
            Ok(Fixture::Xml(IgnoredFixture {
                id,
                url: descriptor.url.clone(),
                data,
            }))
        }
        FetchStrategy::InstantRedirect => {
            let markup = http.get_text(&descriptor.url, HTML_ACCEPT)?;
            let document = parser.parse_document(&markup, &descriptor.url)?;
            Ok(Fixture::Redirect(TestFixture {
                id,
                outcome: descriptor.expected,
                page: synthesize_redirect_page(&descriptor.url, document),
            }))
        }
        FetchStrategy::Scrape => {
            let mut page = scraper.scrape(&descriptor.url)?;
            scrub_page_headers(&mut page);
            Ok(Fixture::Test(TestFixture {
                id,
                outcome: descriptor.expected,
                page,
            }))
        }
    }
}

fn clean_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}
