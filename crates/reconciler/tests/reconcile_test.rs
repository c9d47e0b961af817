//! Component tests for grant reconciliation against in-memory stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use provcheck_core::memory::InMemoryGrantStore;
use provcheck_core::{
    AccessEntry, Error, GrantSnapshot, Grantee, GrantSpec, GrantStore, Principal, ResourceId, Result, Role,
};
use provcheck_reconciler::ReconcilerBuilder;

fn dataset(name: &str) -> ResourceId {
    ResourceId::new(format!("proj.{name}"))
}

fn owner_grant(resource: &ResourceId, who: &str) -> Result<GrantSpec> {
    Ok(GrantSpec::new(
        resource.clone(),
        Principal::normalize(who)?,
        Role::new("OWNER"),
    ))
}

#[tokio::test]
async fn test_second_run_writes_nothing() -> Result<()> {
    let resource = dataset("ga4_export");
    let store = Arc::new(InMemoryGrantStore::new().with_resource(resource.clone(), vec![]));
    let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build()?;
    let grants = vec![owner_grant(&resource, "deployer@proj.iam.gserviceaccount.com")?];

    let first = reconciler.ensure_grants(&resource, &grants).await?;
    let second = reconciler.ensure_grants(&resource, &grants).await?;

    assert_eq!(first.applied.len(), 1);
    assert!(first.applied.iter().all(|a| a.verified));
    assert!(second.converged());
    assert_eq!(second.already_present, grants);
    assert_eq!(store.writes().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_existing_entries_survive_the_write() -> Result<()> {
    let resource = dataset("ads_export");
    let special = AccessEntry::opaque(
        Some(Role::new("READER")),
        serde_json::json!({ "specialGroup": "projectReaders" }),
    );
    let store = Arc::new(
        InMemoryGrantStore::new().with_resource(resource.clone(), vec![special.clone()]),
    );
    let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build()?;
    let grant = owner_grant(&resource, "alice@example.com")?;

    reconciler.ensure_grants(&resource, &[grant.clone()]).await?;

    let snapshot = store
        .snapshot(&resource)
        .await
        .ok_or_else(|| Error::resource_not_found(resource.as_str()))?;
    assert_eq!(snapshot.entries.len(), 2);
    assert!(snapshot.entries.contains(&special));
    assert!(snapshot.satisfies(&grant));
    Ok(())
}

#[tokio::test]
async fn test_missing_resource_is_fatal() -> Result<()> {
    let store = Arc::new(InMemoryGrantStore::new());
    let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build()?;
    let resource = dataset("absent");

    let result = reconciler
        .ensure_grants(&resource, &[owner_grant(&resource, "alice@example.com")?])
        .await;

    assert!(matches!(result, Err(Error::ResourceNotFound { .. })));
    assert!(store.writes().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unverified_write_is_reported() -> Result<()> {
    let resource = dataset("lagging");
    let store = Arc::new(
        InMemoryGrantStore::new()
            .with_resource(resource.clone(), vec![])
            .discarding_writes(),
    );
    let reconciler = ReconcilerBuilder::new().with_store(store).build()?;

    let changes = reconciler
        .ensure_grants(&resource, &[owner_grant(&resource, "alice@example.com")?])
        .await?;

    assert_eq!(changes.applied.len(), 1);
    assert!(changes.applied.iter().all(|a| !a.verified));
    assert!(changes.all_succeeded());
    Ok(())
}

/// Store that lets another writer sneak in right before the first replace.
struct RacingStore {
    inner: InMemoryGrantStore,
    raced: AtomicBool,
    intruder: AccessEntry,
}

#[async_trait]
impl GrantStore for RacingStore {
    async fn fetch_grants(&self, resource: &ResourceId) -> Result<GrantSnapshot> {
        self.inner.fetch_grants(resource).await
    }

    async fn replace_grants(
        &self,
        resource: &ResourceId,
        entries: Vec<AccessEntry>,
        expected_version: Option<&str>,
    ) -> Result<GrantSnapshot> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner
                .external_write(resource, self.intruder.clone())
                .await?;
        }
        self.inner
            .replace_grants(resource, entries, expected_version)
            .await
    }
}

fn racing_store(resource: &ResourceId) -> Result<RacingStore> {
    Ok(RacingStore {
        inner: InMemoryGrantStore::new().with_resource(resource.clone(), vec![]),
        raced: AtomicBool::new(false),
        intruder: AccessEntry::principal(
            Principal::normalize("bob@example.com")?,
            Role::new("READER"),
        ),
    })
}

#[tokio::test]
async fn test_concurrent_change_is_a_failed_grant() -> Result<()> {
    let resource = dataset("contended");
    let store = Arc::new(racing_store(&resource)?);
    let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build()?;
    let grant = owner_grant(&resource, "alice@example.com")?;

    let changes = reconciler.ensure_grants(&resource, &[grant.clone()]).await?;

    assert!(changes.applied.is_empty());
    assert_eq!(changes.failed.len(), 1);
    assert!(changes.failed.iter().all(|(g, _)| g == &grant));

    let snapshot = store
        .inner
        .snapshot(&resource)
        .await
        .ok_or_else(|| Error::resource_not_found(resource.as_str()))?;
    assert!(snapshot.contains(&store.intruder_principal()?, &Role::new("READER")));
    Ok(())
}

#[tokio::test]
async fn test_without_version_check_last_writer_wins() -> Result<()> {
    let resource = dataset("contended");
    let store = Arc::new(racing_store(&resource)?);
    let reconciler = ReconcilerBuilder::new()
        .with_store(store.clone())
        .optimistic_concurrency(false)
        .build()?;
    let grant = owner_grant(&resource, "alice@example.com")?;

    let changes = reconciler.ensure_grants(&resource, &[grant.clone()]).await?;

    assert_eq!(changes.applied.len(), 1);
    let snapshot = store
        .inner
        .snapshot(&resource)
        .await
        .ok_or_else(|| Error::resource_not_found(resource.as_str()))?;
    assert!(!snapshot.contains(&store.intruder_principal()?, &Role::new("READER")));
    Ok(())
}

impl RacingStore {
    fn intruder_principal(&self) -> Result<Principal> {
        match &self.intruder.grantee {
            Grantee::Principal(p) => Ok(p.clone()),
            Grantee::Opaque(_) => Err(Error::invalid_input("intruder has no principal")),
        }
    }
}

#[tokio::test]
async fn test_ensure_all_spans_resources() -> Result<()> {
    let ga4 = dataset("ga4");
    let ads = dataset("ads");
    let store = Arc::new(
        InMemoryGrantStore::new()
            .with_resource(ga4.clone(), vec![])
            .with_resource(ads.clone(), vec![]),
    );
    let reconciler = ReconcilerBuilder::new().with_store(store.clone()).build()?;
    let grants = vec![
        owner_grant(&ads, "alice@example.com")?,
        owner_grant(&ga4, "alice@example.com")?,
        owner_grant(&ads, "deployer@proj.iam.gserviceaccount.com")?,
    ];

    let changes = reconciler.ensure_all(&grants).await?;

    assert_eq!(changes.applied.len(), 3);
    assert_eq!(changes.written_resources(), vec![&ads, &ga4]);
    assert_eq!(store.writes().await.len(), 3);
    Ok(())
}
