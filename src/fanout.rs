//! Fan-out combinators for batched API requests.
//!
//! The engine issues two kinds of request batches, with deliberately
//! different failure semantics, and the distinction is made visible at
//! every call site by going through one of these two combinators:
//!
//! - [`all_or_fail`]: authoritative listing calls; the first rejection
//!   fails the whole batch.
//! - [`settle`] / [`settle_ok`]: probe fan-outs (one access review per
//!   organization or per permission tuple); per-item failures are
//!   tolerated and the batch continues.

use crate::error::Result;
use futures::future;
use log::debug;
use std::future::Future;

/// Await every future; fail on the first rejection.
pub async fn all_or_fail<I, F, T>(futures: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    future::try_join_all(futures).await
}

/// Await every future; return each item's own outcome.
pub async fn settle<I, F, T>(futures: I) -> Vec<Result<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    future::join_all(futures).await
}

/// Await every future; keep the successes and drop failures, logging
/// each dropped item.
pub async fn settle_ok<I, F, T>(futures: I, what: &str) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    settle(futures)
        .await
        .into_iter()
        .filter_map(|outcome| match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("{what}: dropping failed batch item: {err}");
                None
            }
        })
        .collect()
}
