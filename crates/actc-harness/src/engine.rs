//! Boundary to the rule evaluation engine.

use actc_error::Result;
use actc_types::{PageSnapshot, Verdict};
use serde::{Deserialize, Serialize};

use crate::oracle::Oracle;

/// One verdict the engine produced, for the rule it pertains to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutcome {
    pub rule: String,
    #[serde(rename = "outcome")]
    pub verdict: Verdict,
}

/// Evaluates a page against a rule. The oracle, when given, is consulted
/// synchronously for questions the markup alone cannot answer.
pub trait Engine {
    fn evaluate(
        &mut self,
        page: &PageSnapshot,
        rule: &str,
        oracle: Option<&mut dyn Oracle>,
    ) -> Result<Vec<EngineOutcome>>;
}

/// Reduce the outcomes for `rule` to the single worst-case verdict
/// (`failed > cantTell > passed > inapplicable`). A rule with no outcome
/// for the page is inapplicable.
pub fn reduce_outcomes(rule: &str, outcomes: &[EngineOutcome]) -> Verdict {
    Verdict::worst_case(
        outcomes
            .iter()
            .filter(|outcome| outcome.rule == rule)
            .map(|outcome| outcome.verdict),
    )
    .unwrap_or(Verdict::Inapplicable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(rule: &str, verdict: Verdict) -> EngineOutcome {
        EngineOutcome {
            rule: rule.to_owned(),
            verdict,
        }
    }

    #[test]
    fn reduction_picks_worst_case_for_the_rule() {
        let outcomes = [
            outcome("R1", Verdict::Passed),
            outcome("R2", Verdict::Failed),
            outcome("R1", Verdict::CantTell),
            outcome("R1", Verdict::Inapplicable),
        ];
        assert_eq!(reduce_outcomes("R1", &outcomes), Verdict::CantTell);
        assert_eq!(reduce_outcomes("R2", &outcomes), Verdict::Failed);
        assert_eq!(reduce_outcomes("R3", &outcomes), Verdict::Inapplicable, "case=no_outcome");
    }

    #[test]
    fn outcome_wire_shape() {
        let decoded: EngineOutcome =
            serde_json::from_str(r#"{ "rule": "R9", "outcome": "cantTell" }"#).expect("decodes");
        assert_eq!(decoded, outcome("R9", Verdict::CantTell));
    }
}
