//! Writer semantics: production writes invalidate the documented cache
//! keys or fail; staging writes touch neither production rows nor cache.

mod common;

use std::sync::Arc;

use common::{FlakyCache, RecordingStore, john_wayne};
use epilogue_core::cache::{Cache, CacheKeys};
use epilogue_core::error::EnrichError;
use epilogue_core::store::WriteMode;
use epilogue_core::write::EnrichmentWriter;
use epilogue_model::{
    DeathRecord, EnrichmentOutcome, EnrichmentStats, RelatedCelebrity,
};

fn enriched_outcome(actor_id: i64) -> EnrichmentOutcome {
    let mut record = DeathRecord {
        circumstances: Some("Died of stomach cancer.".into()),
        location_of_death: Some("Los Angeles".into()),
        related_celebrities: vec![
            RelatedCelebrity {
                name: "Maureen O'Hara".into(),
                actor_id: None,
            },
            RelatedCelebrity {
                name: "Totally Unknown".into(),
                actor_id: None,
            },
        ],
        ..Default::default()
    };
    record.compute_substantive_content();
    EnrichmentOutcome {
        actor_id,
        record: Some(record),
        raw_sources: Vec::new(),
        attempts: Vec::new(),
        rejected_factors: vec!["cursed production".into()],
        stats: EnrichmentStats::default(),
        error: None,
    }
}

#[tokio::test]
async fn production_write_invalidates_documented_keys() {
    let store = RecordingStore::new().with_known_name("Maureen O'Hara", 77);
    let cache = FlakyCache::new();
    // Seed the read-path entries a live system would have.
    cache
        .set(&CacheKeys::actor_profile(1), "profile".into(), None)
        .await
        .unwrap();
    cache
        .set(&CacheKeys::actor_death(1), "death".into(), None)
        .await
        .unwrap();

    let writer = EnrichmentWriter::new(store.clone(), cache.clone(), WriteMode::Production);
    writer
        .write(&john_wayne(), &enriched_outcome(1), "scripted-model")
        .await
        .unwrap();

    let writes = store.production_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert!(store.staging_writes.lock().unwrap().is_empty());

    // Name resolution filled in the known id and kept the unknown name.
    let celebrities = &writes[0].record.related_celebrities;
    assert_eq!(celebrities[0].actor_id, Some(77));
    assert_eq!(celebrities[1].actor_id, None);
    assert_eq!(celebrities[1].name, "Totally Unknown");

    let invalidated = cache.invalidated.lock().unwrap();
    assert!(invalidated.contains(&CacheKeys::actor_profile(1)));
    assert!(invalidated.contains(&CacheKeys::actor_death(1)));
    assert!(cache
        .invalidated_patterns
        .lock()
        .unwrap()
        .contains(&CacheKeys::actor_list_pattern()));

    // Telemetry landed too.
    let rejected = store.rejected.lock().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].factor, "cursed production");
    assert_eq!(rejected[0].actor_id, 1);
}

#[tokio::test]
async fn failed_invalidation_fails_the_write() {
    let store = RecordingStore::new();
    let cache = FlakyCache::new();
    cache.set_failing(true);

    let writer = EnrichmentWriter::new(store.clone(), cache, WriteMode::Production);
    let err = writer
        .write(&john_wayne(), &enriched_outcome(1), "scripted-model")
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::CacheUnavailable(_)));
}

#[tokio::test]
async fn staging_mode_bypasses_cache_and_production_rows() {
    let store = RecordingStore::new();
    let cache = FlakyCache::new();
    cache
        .set(&CacheKeys::actor_profile(1), "profile".into(), None)
        .await
        .unwrap();

    let writer = EnrichmentWriter::new(store.clone(), cache.clone(), WriteMode::Staging);
    writer
        .write(&john_wayne(), &enriched_outcome(1), "scripted-model")
        .await
        .unwrap();

    assert_eq!(store.staging_writes.lock().unwrap().len(), 1);
    assert!(store.production_writes.lock().unwrap().is_empty());
    // No invalidation was issued; the seeded key survives.
    assert!(cache.invalidated.lock().unwrap().is_empty());
    assert!(cache.invalidated_patterns.lock().unwrap().is_empty());
    assert_eq!(
        cache.get(&CacheKeys::actor_profile(1)).await.unwrap().as_deref(),
        Some("profile")
    );
}

#[tokio::test]
async fn rewriting_the_same_enrichment_is_idempotent() {
    let store = RecordingStore::new();
    let cache = FlakyCache::new();
    let writer = EnrichmentWriter::new(store.clone(), cache, WriteMode::Production);

    let outcome = enriched_outcome(1);
    writer
        .write(&john_wayne(), &outcome, "scripted-model")
        .await
        .unwrap();
    writer
        .write(&john_wayne(), &outcome, "scripted-model")
        .await
        .unwrap();

    let writes = store.production_writes.lock().unwrap();
    assert_eq!(writes.len(), 2);
    // Same sources and model -> same version key; the upsert overwrites
    // rather than forking.
    assert_eq!(writes[0].source_version, writes[1].source_version);
    assert_eq!(writes[0].actor_id, writes[1].actor_id);
}

#[tokio::test]
async fn outcome_without_record_writes_nothing_but_telemetry() {
    let store = RecordingStore::new();
    let cache = FlakyCache::new();
    let writer = EnrichmentWriter::new(store.clone(), cache.clone(), WriteMode::Production);

    let mut outcome = enriched_outcome(1);
    outcome.record = None;
    writer
        .write(&john_wayne(), &outcome, "scripted-model")
        .await
        .unwrap();

    assert!(store.production_writes.lock().unwrap().is_empty());
    assert!(cache.invalidated.lock().unwrap().is_empty());
    assert_eq!(store.rejected.lock().unwrap().len(), 1);
}
