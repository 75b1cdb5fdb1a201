//! Concurrent join with an explicit failure policy.
//!
//! Quotes tolerate per-symbol failure while book categories are all or
//! nothing; the policy is named at the call site instead of being implied by
//! which combinator happens to be used.

use std::future::Future;

/// How a batch reacts to a failed member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Wait for every future and report each outcome.
    SettleAll,
    /// Return the first error and drop the futures still in flight.
    FailFast,
}

/// Drive `futures` concurrently on the current task.
///
/// Outcomes are returned in input order. Under `FailFast` the outer result is
/// the first error observed; under `SettleAll` it is always `Ok`.
pub async fn join_all<I, F, T, E>(policy: JoinPolicy, futures: I) -> Result<Vec<Result<T, E>>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    match policy {
        JoinPolicy::SettleAll => Ok(futures::future::join_all(futures).await),
        JoinPolicy::FailFast => futures::future::try_join_all(futures)
            .await
            .map(|values| values.into_iter().map(Ok).collect()),
    }
}

/// Keep the successful outcomes of a settled batch.
pub fn successes<T, E>(outcomes: Vec<Result<T, E>>) -> impl Iterator<Item = T> {
    outcomes.into_iter().filter_map(Result::ok)
}
