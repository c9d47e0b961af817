//! Property and component tests for chunked submission.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use provcheck_batcher::{
    ChunkLimit, EmptyInput, EnablerConfig, ServiceEnabler, plan_chunks, run_in_chunks,
    run_in_chunks_concurrent,
};
use provcheck_core::memory::InMemoryServiceRegistry;
use provcheck_core::{Result, ServiceId, ServiceState};

fn runtime() -> std::result::Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #[test]
    fn every_item_once_in_order(len in 1usize..200, limit in 1usize..50) {
        let items: Vec<usize> = (0..len).collect();
        let limit = ChunkLimit::new(limit).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let chunks = runtime()?.block_on(run_in_chunks(
            &items,
            limit,
            EmptyInput::Skip,
            |chunk| async move { chunk.to_vec() },
        ));

        prop_assert_eq!(chunks.len(), len.div_ceil(limit.get()));
        prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= limit.get()));
        let (last, full) = chunks.split_last().ok_or_else(|| TestCaseError::fail("no chunks"))?;
        prop_assert!(full.iter().all(|c| c.len() == limit.get()));
        prop_assert!(!last.is_empty());
        let flattened: Vec<usize> = chunks.into_iter().flatten().collect();
        prop_assert_eq!(flattened, items);
    }

    #[test]
    fn concurrent_matches_sequential(len in 0usize..120, limit in 1usize..30, in_flight in 1usize..8) {
        let items: Vec<usize> = (0..len).collect();
        let limit = ChunkLimit::new(limit).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let in_flight = NonZeroUsize::new(in_flight).ok_or_else(|| TestCaseError::fail("zero"))?;
        let rt = runtime()?;

        let sequential = rt.block_on(run_in_chunks(&items, limit, EmptyInput::Skip, |c| async move {
            c.iter().sum::<usize>()
        }));
        let concurrent = rt.block_on(run_in_chunks_concurrent(
            &items,
            limit,
            EmptyInput::Skip,
            in_flight,
            |c| async move { c.iter().sum::<usize>() },
        ));

        prop_assert_eq!(sequential, concurrent);
    }
}

#[test]
fn forty_five_items_at_twenty() -> Result<()> {
    let items: Vec<u8> = vec![0; 45];
    let sizes: Vec<usize> = plan_chunks(&items, ChunkLimit::new(20)?, EmptyInput::Skip)
        .into_iter()
        .map(<[u8]>::len)
        .collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    Ok(())
}

#[tokio::test]
async fn concurrent_results_keep_chunk_order() -> Result<()> {
    let items: Vec<u64> = (0..10).collect();
    let in_flight = NonZeroUsize::new(4).ok_or_else(|| provcheck_core::Error::invalid_config("zero"))?;

    // Earlier chunks sleep longer, so they finish last.
    let results = run_in_chunks_concurrent(&items, ChunkLimit::new(2)?, EmptyInput::Skip, in_flight, |chunk| async move {
        let first = chunk.first().copied().unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(first * 2))).await;
        first
    })
    .await;

    assert_eq!(results, vec![0, 2, 4, 6, 8]);
    Ok(())
}

fn service_names(count: usize) -> Vec<ServiceId> {
    (0..count)
        .map(|i| ServiceId::new(format!("api{i}.googleapis.com")))
        .collect()
}

#[tokio::test]
async fn enabler_submits_only_disabled_services() -> Result<()> {
    let services = service_names(25);
    let mut registry = InMemoryServiceRegistry::new();
    for id in services.iter().step_by(5) {
        registry = registry.with_service(id.as_str(), ServiceState::Enabled);
    }
    let registry = Arc::new(registry);
    let enabler = ServiceEnabler::new(
        registry.clone(),
        EnablerConfig {
            limit: ChunkLimit::new(20)?,
            ..EnablerConfig::default()
        },
    );

    let report = enabler.enable(&services).await;

    assert_eq!(report.already_enabled.len(), 5);
    assert_eq!(report.requested().len(), 20);
    assert_eq!(report.chunks.len(), 1);
    assert!(report.all_submitted());
    for id in &services {
        assert_eq!(registry.state_of(id.as_str()).await, ServiceState::Enabled);
    }
    // state lookups are chunked too: 20 + 5
    let lookups: Vec<usize> = registry.fetched_chunks().await.iter().map(Vec::len).collect();
    assert_eq!(lookups, vec![20, 5]);
    Ok(())
}

#[tokio::test]
async fn enabler_continues_after_failed_chunk() -> Result<()> {
    let services = service_names(45);
    let registry = Arc::new(InMemoryServiceRegistry::new().failing_submit(1));
    let enabler = ServiceEnabler::new(registry.clone(), EnablerConfig::default());

    let report = enabler.enable(&services).await;

    let sizes: Vec<usize> = report.chunks.iter().map(|c| c.items.len()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    assert!(!report.all_submitted());
    let failed: Vec<usize> = report.failed_chunks().iter().map(|c| c.index).collect();
    assert_eq!(failed, vec![1]);
    assert_eq!(registry.submitted_chunks().await.len(), 3);
    assert_eq!(registry.state_of("api44.googleapis.com").await, ServiceState::Enabled);
    assert_eq!(registry.state_of("api25.googleapis.com").await, ServiceState::Disabled);
    Ok(())
}
