//! Two-phase batch runner: attempt every item, then re-attempt only the
//! failures exactly once against a freshly opened resource handle.
//!
//! Phase 2 never interleaves with phase 1. Opening a handle is fatal for the
//! whole batch; closing one is best-effort.

use actc_error::{HarnessError, Result};
use tracing::{info, warn};

/// Which pass of the batch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    First,
    Retry,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Retry => "retry",
        }
    }
}

/// An item that still failed, with the error of its last attempt.
#[derive(Debug)]
pub struct Failure<T> {
    pub item: T,
    pub error: HarnessError,
}

#[derive(Debug)]
pub struct TwoPhaseReport<T> {
    pub attempted: usize,
    pub first_pass_failures: usize,
    pub unresolved: Vec<Failure<T>>,
}

impl<T> TwoPhaseReport<T> {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.unresolved.len()
    }

    pub fn recovered(&self) -> usize {
        self.first_pass_failures - self.unresolved.len()
    }

    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Run `attempt` over `items` with one batch retry of the failures.
///
/// `open` is called once per phase that has work; the handle it returns is
/// passed to every attempt of that phase and then handed to `close`.
pub fn run_with_single_retry<T, H>(
    items: Vec<T>,
    mut open: impl FnMut(Phase) -> Result<H>,
    mut attempt: impl FnMut(&mut H, &T, Phase) -> Result<()>,
    mut close: impl FnMut(H) -> Result<()>,
) -> Result<TwoPhaseReport<T>> {
    let attempted = items.len();
    let failures = run_phase(items, Phase::First, &mut open, &mut attempt, &mut close)?;
    let first_pass_failures = failures.len();

    let unresolved = if failures.is_empty() {
        failures
    } else {
        warn!(
            count = first_pass_failures,
            "some items failed, retrying with a fresh handle"
        );
        let items = failures.into_iter().map(|failure| failure.item).collect();
        run_phase(items, Phase::Retry, &mut open, &mut attempt, &mut close)?
    };

    info!(
        attempted,
        first_pass_failures,
        unresolved = unresolved.len(),
        "batch finished"
    );
    Ok(TwoPhaseReport {
        attempted,
        first_pass_failures,
        unresolved,
    })
}

fn run_phase<T, H>(
    items: Vec<T>,
    phase: Phase,
    open: &mut impl FnMut(Phase) -> Result<H>,
    attempt: &mut impl FnMut(&mut H, &T, Phase) -> Result<()>,
    close: &mut impl FnMut(H) -> Result<()>,
) -> Result<Vec<Failure<T>>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let mut handle = open(phase)?;
    let mut failures = Vec::new();
    for item in items {
        if let Err(error) = attempt(&mut handle, &item, phase) {
            warn!(phase = phase.as_str(), error = %error, "attempt failed");
            failures.push(Failure { item, error });
        }
    }
    if let Err(error) = close(handle) {
        warn!(phase = phase.as_str(), error = %error, "failed to release batch handle");
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn clean_batch_opens_one_handle() {
        let mut opened = Vec::new();
        let report = run_with_single_retry(
            vec![1, 2, 3],
            |phase| {
                opened.push(phase);
                Ok(0_u32)
            },
            |calls, _, _| {
                *calls += 1;
                Ok(())
            },
            |calls| {
                assert_eq!(calls, 3);
                Ok(())
            },
        )
        .expect("batch runs");
        assert!(report.is_clean());
        assert_eq!(report.succeeded(), 3);
        assert_eq!(opened, [Phase::First]);
    }

    #[test]
    fn failures_retry_once_on_fresh_handle() {
        // item -> number of attempts that fail before succeeding
        let flaky: BTreeMap<u32, u32> = [(2, 1), (4, 5)].into_iter().collect();
        let mut tries: BTreeMap<u32, u32> = BTreeMap::new();
        let mut handles = 0;
        let mut retried = Vec::new();

        let report = run_with_single_retry(
            vec![1, 2, 3, 4],
            |phase| {
                handles += 1;
                Ok(phase)
            },
            |phase, item, _| {
                if *phase == Phase::Retry {
                    retried.push(*item);
                }
                let count = tries.entry(*item).or_insert(0);
                *count += 1;
                if flaky.get(item).is_some_and(|fails| *count <= *fails) {
                    Err(HarnessError::scrape(item.to_string(), "transient"))
                } else {
                    Ok(())
                }
            },
            |_| Ok(()),
        )
        .expect("batch runs");

        assert_eq!(handles, 2, "case=fresh_handle_for_retry");
        assert_eq!(retried, [2, 4], "case=only_failures_retried");
        assert_eq!(report.first_pass_failures, 2);
        assert_eq!(report.recovered(), 1);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].item, 4);
        assert_eq!(tries[&4], 2, "case=exactly_one_retry");
    }

    #[test]
    fn open_failure_is_fatal() {
        let result = run_with_single_retry(
            vec!["a"],
            |_| Err::<(), _>(HarnessError::internal("browser did not start")),
            |_, _, _| Ok(()),
            |_| Ok(()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn close_failure_is_not_fatal() {
        let report = run_with_single_retry(
            vec!["a"],
            |_| Ok(()),
            |_, _, _| Ok(()),
            |()| Err(HarnessError::internal("already closed")),
        )
        .expect("close errors are logged only");
        assert!(report.is_clean());
    }

    #[test]
    fn empty_batch_opens_nothing() {
        let mut opened = 0;
        let report = run_with_single_retry(
            Vec::<u8>::new(),
            |_| {
                opened += 1;
                Ok(())
            },
            |_, _, _| Ok(()),
            |()| Ok(()),
        )
        .expect("empty batch");
        assert_eq!(opened, 0);
        assert_eq!(report.attempted, 0);
    }
}
