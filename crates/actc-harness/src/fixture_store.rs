//! On-disk fixture store: `<root>/<rule id (lowercased)>/<fixture id>.json`.
//!
//! Records are pretty-printed with a trailing newline so regenerated fixtures
//! diff cleanly under version control. A malformed record is fatal; there is
//! no partial recovery.

use std::fs;
use std::path::{Path, PathBuf};

use actc_error::{HarnessError, Result};
use actc_types::Fixture;
use tracing::debug;

/// Directory holding the fixtures of `rule_id` under `root`.
pub fn rule_dir(root: &Path, rule_id: &str) -> PathBuf {
    root.join(rule_id.to_lowercase())
}

/// Read every `*.json` fixture in `dir`, in file-name order.
pub fn list(dir: &Path) -> Result<Vec<Fixture>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let fixtures = paths
        .iter()
        .map(|path| read(path))
        .collect::<Result<Vec<_>>>()?;
    debug!(dir = %dir.display(), count = fixtures.len(), "fixtures loaded");
    Ok(fixtures)
}

/// Decode a single fixture file.
pub fn read(path: &Path) -> Result<Fixture> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|err| HarnessError::fixture_parse(path, err))
}

/// Persist `fixture` into `dir` as `<id>.json`, creating `dir` if needed.
pub fn write(dir: &Path, fixture: &Fixture) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(fixture.id().file_name());
    let mut encoded = serde_json::to_string_pretty(fixture)
        .map_err(|err| HarnessError::json(format!("fixture {}", fixture.id()), err))?;
    encoded.push('\n');
    fs::write(&path, encoded)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use actc_types::{FixtureId, IgnoredFixture, PageSnapshot, TestFixture, Verdict};
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn sample_test(id: &str) -> TestFixture {
        TestFixture {
            id: FixtureId::new(id),
            outcome: Verdict::Failed,
            page: PageSnapshot::new(json!({
                "response": { "url": "https://example.org/x.html", "headers": [] },
                "document": { "type": "document", "children": [] }
            })),
        }
    }

    #[test]
    fn rule_dir_is_lowercased() {
        let dir = rule_dir(Path::new("fixtures/new"), "In6Db8");
        assert_eq!(dir, Path::new("fixtures/new/in6db8"));
    }

    #[test]
    fn round_trip_each_variant() {
        let temp = tempdir().expect("tempdir should be created");
        let originals = vec![
            Fixture::Test(sample_test("aaaaaa")),
            Fixture::Redirect(sample_test("bbbbbb")),
            Fixture::Xml(IgnoredFixture {
                id: FixtureId::new("cccccc"),
                url: "https://example.org/feed.xml".to_owned(),
                data: "<?xml version=\"1.0\"?>\n<feed/>".to_owned(),
            }),
        ];
        for fixture in &originals {
            write(temp.path(), fixture).expect("fixture should be written");
        }
        let listed = list(temp.path()).expect("fixtures should be listed");
        assert_eq!(listed, originals, "case=round_trip");
    }

    #[test]
    fn written_file_is_pretty_and_newline_terminated() {
        let temp = tempdir().expect("tempdir should be created");
        let path = write(temp.path(), &Fixture::Test(sample_test("dddddd")))
            .expect("fixture should be written");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("dddddd.json"));
        let contents = fs::read_to_string(&path).expect("fixture should be readable");
        assert!(contents.ends_with("}\n"), "case=trailing_newline");
        assert!(contents.starts_with("{\n  \"type\": \"test\",\n  \"id\": \"dddddd\""), "case=key_order contents={contents}");
    }

    #[test]
    fn empty_directory_lists_nothing() {
        let temp = tempdir().expect("tempdir should be created");
        fs::write(temp.path().join("README.md"), "not a fixture").expect("stray file");
        assert!(list(temp.path()).expect("empty dir lists").is_empty());
    }

    #[test]
    fn malformed_fixture_is_fatal() {
        let temp = tempdir().expect("tempdir should be created");
        write(temp.path(), &Fixture::Test(sample_test("eeeeee"))).expect("good fixture");
        fs::write(temp.path().join("ffffff.json"), "{ \"id\": ").expect("bad fixture");
        let err = list(temp.path()).expect_err("malformed fixture must fail");
        assert!(matches!(err, HarnessError::FixtureParse { ref path, .. } if path.ends_with("ffffff.json")));
        assert!(err.is_fatal());
    }
}
