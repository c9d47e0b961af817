//! Chunked invocation of a bulk call.
//!
//! Items are split into consecutive chunks of at most `limit` items; every
//! chunk but the last holds exactly `limit`. Results come back in chunk
//! order, so concatenating the chunks reproduces the input.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt};
use provcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of items passed to one remote call. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChunkLimit(NonZeroUsize);

impl ChunkLimit {
    /// Twenty items per call, the Service Usage batch limit.
    pub const DEFAULT: Self = match NonZeroUsize::new(20) {
        Some(n) => Self(n),
        None => Self(NonZeroUsize::MIN),
    };

    /// Create a limit.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `limit` is zero.
    pub fn new(limit: usize) -> Result<Self> {
        NonZeroUsize::new(limit)
            .map(Self)
            .ok_or_else(|| Error::invalid_config("chunk limit must be greater than zero"))
    }

    /// The limit as a plain number.
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Number of calls needed for `len` items (ignoring the empty-input policy).
    pub const fn calls_for(self, len: usize) -> usize {
        len.div_ceil(self.0.get())
    }
}

impl Default for ChunkLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for ChunkLimit {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ChunkLimit> for usize {
    fn from(limit: ChunkLimit) -> Self {
        limit.get()
    }
}

/// What to do when there is nothing to submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyInput {
    /// Make no call at all.
    #[default]
    Skip,
    /// Make a single call with an empty chunk.
    InvokeOnce,
}

/// Split `items` into the chunks that will be submitted.
pub fn plan_chunks<T>(items: &[T], limit: ChunkLimit, empty: EmptyInput) -> Vec<&[T]> {
    if items.is_empty() {
        return match empty {
            EmptyInput::Skip => Vec::new(),
            EmptyInput::InvokeOnce => vec![items],
        };
    }
    items.chunks(limit.get()).collect()
}

/// Invoke `call` once per chunk, sequentially, collecting results in order.
///
/// A chunk is only submitted after the previous call has completed.
pub async fn run_in_chunks<'a, T, R, F, Fut>(
    items: &'a [T],
    limit: ChunkLimit,
    empty: EmptyInput,
    mut call: F,
) -> Vec<R>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = R>,
{
    let chunks = plan_chunks(items, limit, empty);
    let mut results = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        results.push(call(chunk).await);
    }
    results
}

/// Like [`run_in_chunks`] but with up to `max_in_flight` calls outstanding.
///
/// Results are still returned in chunk order. Only use this when the
/// remote side accepts concurrent calls and the order of side effects
/// across chunks does not matter.
pub async fn run_in_chunks_concurrent<'a, T, R, F, Fut>(
    items: &'a [T],
    limit: ChunkLimit,
    empty: EmptyInput,
    max_in_flight: NonZeroUsize,
    call: F,
) -> Vec<R>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(plan_chunks(items, limit, empty))
        .map(call)
        .buffered(max_in_flight.get())
        .collect()
        .await
}

/// Keep the ids whose current state differs from `target`, in input order.
pub fn pending_items<I, S>(pairs: impl IntoIterator<Item = (I, S)>, target: &S) -> Vec<I>
where
    S: PartialEq,
{
    pairs
        .into_iter()
        .filter(|(_, state)| state != target)
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(ChunkLimit::new(0), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_default_limit_is_twenty() {
        assert_eq!(ChunkLimit::default().get(), 20);
    }

    #[test]
    fn test_plan_keeps_remainder_last() -> Result<()> {
        let items: Vec<u32> = (0..45).collect();
        let sizes: Vec<usize> = plan_chunks(&items, ChunkLimit::new(20)?, EmptyInput::Skip)
            .iter()
            .map(|c| c.len())
            .collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        Ok(())
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() -> Result<()> {
        let items: Vec<u32> = (0..40).collect();
        let plan = plan_chunks(&items, ChunkLimit::new(20)?, EmptyInput::Skip);
        assert_eq!(plan.len(), 2);
        Ok(())
    }

    #[test]
    fn test_empty_input_policies() {
        let items: Vec<u32> = Vec::new();
        assert!(plan_chunks(&items, ChunkLimit::DEFAULT, EmptyInput::Skip).is_empty());

        let once = plan_chunks(&items, ChunkLimit::DEFAULT, EmptyInput::InvokeOnce);
        assert_eq!(once.len(), 1);
        assert!(once.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_pending_items_filters_target_state() {
        let pairs = vec![("a", "ENABLED"), ("b", "DISABLED"), ("c", "UNSPECIFIED")];
        assert_eq!(pending_items(pairs, &"ENABLED"), vec!["b", "c"]);
    }

    #[test]
    fn test_limit_deserializes_and_rejects_zero() {
        let ok: std::result::Result<ChunkLimit, _> = serde_json::from_str("5");
        assert!(matches!(ok, Ok(limit) if limit.get() == 5));

        let zero: std::result::Result<ChunkLimit, _> = serde_json::from_str("0");
        assert!(zero.is_err());
    }

    #[tokio::test]
    async fn test_sequential_calls_in_order() -> Result<()> {
        let items: Vec<u32> = (0..7).collect();
        let results = run_in_chunks(&items, ChunkLimit::new(3)?, EmptyInput::Skip, |chunk| async move {
            chunk.to_vec()
        })
        .await;
        assert_eq!(results, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        Ok(())
    }
}
