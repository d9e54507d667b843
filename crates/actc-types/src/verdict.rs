//! Verdicts produced by the evaluation engine and expected by upstream
//! registries, plus the reconciliation classes derived from comparing them.

use std::fmt;
use std::str::FromStr;

use actc_error::HarnessError;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one rule against one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Inapplicable,
    Passed,
    Failed,
    CantTell,
}

impl Verdict {
    pub const ALL: [Self; 4] = [Self::Inapplicable, Self::Passed, Self::Failed, Self::CantTell];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inapplicable => "inapplicable",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::CantTell => "cantTell",
        }
    }

    /// Rank used when folding several outcomes for the same rule:
    /// `failed > cantTell > passed > inapplicable`.
    pub const fn severity(self) -> u8 {
        match self {
            Self::Inapplicable => 0,
            Self::Passed => 1,
            Self::CantTell => 2,
            Self::Failed => 3,
        }
    }

    /// Reduce several verdicts for the same rule to the single worst one.
    ///
    /// Returns `None` for an empty input; callers decide what "no outcome"
    /// means for them.
    pub fn worst_case(verdicts: impl IntoIterator<Item = Self>) -> Option<Self> {
        verdicts.into_iter().max_by_key(|verdict| verdict.severity())
    }

    /// EARL outcome class for this verdict.
    pub const fn earl_outcome(self) -> &'static str {
        match self {
            Self::Inapplicable => "earl:inapplicable",
            Self::Passed => "earl:passed",
            Self::Failed => "earl:failed",
            Self::CantTell => "earl:cantTell",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verdict| verdict.as_str() == s)
            .ok_or_else(|| HarnessError::json("verdict", format!("unknown outcome '{s}'")))
    }
}

/// Classification of an `(actual, expected)` verdict pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// Engine and registry agree exactly.
    Ok,
    /// Hard disagreement involving `failed`.
    Error,
    /// Tolerated `inapplicable`/`passed` disagreement.
    Lax,
    /// Engine could not decide without outside input.
    Manual,
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Error => f.write_str("error"),
            Self::Lax => f.write_str("lax"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_registry_spelling() {
        let encoded = serde_json::to_string(&Verdict::CantTell).expect("serialize verdict");
        assert_eq!(encoded, "\"cantTell\"");
        let decoded: Verdict = serde_json::from_str("\"inapplicable\"").expect("deserialize verdict");
        assert_eq!(decoded, Verdict::Inapplicable);
        assert!(serde_json::from_str::<Verdict>("\"cant_tell\"").is_err());
    }

    #[test]
    fn from_str_round_trips_display() {
        for verdict in Verdict::ALL {
            assert_eq!(verdict.to_string().parse::<Verdict>().ok(), Some(verdict));
        }
        assert!("untested".parse::<Verdict>().is_err());
    }

    #[test]
    fn worst_case_precedence() {
        use Verdict::{CantTell, Failed, Inapplicable, Passed};
        assert_eq!(Verdict::worst_case([]), None);
        assert_eq!(Verdict::worst_case([Inapplicable]), Some(Inapplicable));
        assert_eq!(Verdict::worst_case([Inapplicable, Passed]), Some(Passed));
        assert_eq!(Verdict::worst_case([Passed, CantTell, Inapplicable]), Some(CantTell));
        assert_eq!(Verdict::worst_case([CantTell, Failed, Passed]), Some(Failed));
    }

    #[test]
    fn earl_outcome_classes() {
        assert_eq!(Verdict::CantTell.earl_outcome(), "earl:cantTell");
        assert_eq!(Verdict::Failed.earl_outcome(), "earl:failed");
    }

    mod prop {
        use proptest::prelude::*;

        use super::super::Verdict;

        fn verdict() -> impl Strategy<Value = Verdict> {
            prop::sample::select(Verdict::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn worst_case_is_order_independent(mut verdicts in prop::collection::vec(verdict(), 1..12)) {
                let forward = Verdict::worst_case(verdicts.iter().copied());
                verdicts.reverse();
                let backward = Verdict::worst_case(verdicts.iter().copied());
                prop_assert_eq!(forward, backward);
            }

            #[test]
            fn worst_case_is_member(verdicts in prop::collection::vec(verdict(), 1..12)) {
                let worst = Verdict::worst_case(verdicts.iter().copied());
                prop_assert!(worst.is_some_and(|w| verdicts.contains(&w)));
            }
        }
    }
}
