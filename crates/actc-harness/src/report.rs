//! EARL (Evaluation and Report Language) JSON-LD report of a run.
//!
//! Each recorded outcome contributes a test subject (the fixture page) and
//! an assertion about it. Unevaluable fixtures are asserted as `cantTell`
//! with an explanatory `earl:info`.

use std::fs;
use std::path::Path;

use actc_error::{HarnessError, Result};
use actc_types::Verdict;
use serde_json::{Value, json};
use tracing::info;

use crate::runner::{RecordedOutcome, RecordedResult};

const UNEVALUABLE_INFO: &str = "Not evaluated: the test case is not an HTML page";

fn context() -> Value {
    json!({
        "earl": "http://www.w3.org/ns/earl#",
        "dct": "http://purl.org/dc/terms/",
        "sch": "https://schema.org/"
    })
}

fn subject_id(outcome: &RecordedOutcome) -> String {
    format!("_:subject-{}-{}", outcome.rule_id.to_lowercase(), outcome.fixture)
}

fn subject(outcome: &RecordedOutcome) -> Value {
    let mut subject = json!({
        "@id": subject_id(outcome),
        "@type": ["earl:TestSubject", "sch:WebPage"]
    });
    if let Some(url) = &outcome.page_url {
        subject["dct:source"] = json!(url);
    }
    subject
}

fn assertion(assertor: &str, outcome: &RecordedOutcome) -> Value {
    let mut result = json!({ "@type": "earl:TestResult" });
    match &outcome.result {
        RecordedResult::Evaluated { actual, .. } => {
            result["earl:outcome"] = json!({ "@id": actual.earl_outcome() });
        }
        RecordedResult::Unevaluable => {
            result["earl:outcome"] = json!({ "@id": Verdict::CantTell.earl_outcome() });
            result["earl:info"] = json!(UNEVALUABLE_INFO);
        }
    }
    json!({
        "@type": "earl:Assertion",
        "earl:assertedBy": { "@id": assertor },
        "earl:mode": { "@id": "earl:automatic" },
        "earl:test": { "@id": outcome.test_uri },
        "earl:subject": { "@id": subject_id(outcome) },
        "earl:result": result
    })
}

/// Fold recorded outcomes into a JSON-LD document.
pub fn build_report(assertor: &str, outcomes: &[RecordedOutcome]) -> Value {
    let mut graph = Vec::with_capacity(outcomes.len() * 2);
    for outcome in outcomes {
        graph.push(subject(outcome));
        graph.push(assertion(assertor, outcome));
    }
    json!({ "@context": context(), "@graph": graph })
}

/// Serialize `report` to `path`, pretty-printed and newline-terminated.
pub fn write_report(path: &Path, report: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut encoded = serde_json::to_string_pretty(report)
        .map_err(|err| HarnessError::json("EARL report", err))?;
    encoded.push('\n');
    fs::write(path, encoded)?;
    let assertions = report["@graph"].as_array().map_or(0, |graph| graph.len() / 2);
    info!(path = %path.display(), assertions, "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use actc_types::{FixtureId, Reconciliation};
    use tempfile::tempdir;

    use super::*;
    use crate::reconcile::CaseDecision;

    fn evaluated(fixture: &str, actual: Verdict) -> RecordedOutcome {
        RecordedOutcome {
            rule_id: "23a2a8".to_owned(),
            engine_rule: "R2".to_owned(),
            test_uri: "https://act-rules.github.io/rules/23a2a8".to_owned(),
            fixture: FixtureId::new(fixture),
            page_url: Some(format!("https://a.org/{fixture}.html")),
            result: RecordedResult::Evaluated {
                actual,
                expected: Verdict::Passed,
                classification: Reconciliation::Ok,
                decision: CaseDecision::Pass,
            },
        }
    }

    #[test]
    fn subject_and_assertion_per_outcome() {
        let mut xml = evaluated("cccccc", Verdict::Passed);
        xml.result = RecordedResult::Unevaluable;
        let report = build_report("https://engine.example", &[evaluated("aaaaaa", Verdict::Failed), xml]);
        let graph = report["@graph"].as_array().expect("graph");
        assert_eq!(graph.len(), 4);
        assert_eq!(graph[0]["@id"], "_:subject-23a2a8-aaaaaa");
        assert_eq!(graph[0]["dct:source"], "https://a.org/aaaaaa.html");
        assert_eq!(graph[1]["earl:subject"]["@id"], "_:subject-23a2a8-aaaaaa");
        assert_eq!(graph[1]["earl:result"]["earl:outcome"]["@id"], "earl:failed");
        assert_eq!(graph[1]["earl:assertedBy"]["@id"], "https://engine.example");
        assert_eq!(graph[3]["earl:result"]["earl:outcome"]["@id"], "earl:cantTell", "case=xml_cant_tell");
        assert_eq!(graph[3]["earl:result"]["earl:info"], UNEVALUABLE_INFO);
    }

    #[test]
    fn written_report_round_trips() {
        let temp = tempdir().expect("tempdir should be created");
        let path = temp.path().join("reports").join("earl.json");
        let report = build_report("_:a", &[evaluated("aaaaaa", Verdict::Passed)]);
        write_report(&path, &report).expect("report written");
        let text = fs::read_to_string(&path).expect("report readable");
        assert!(text.ends_with("}\n"));
        let decoded: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(decoded, report);
    }
}
