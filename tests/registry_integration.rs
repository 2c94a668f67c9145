//! End-to-end registry tests: publish, resolve, compose, search.

use std::sync::Arc;
use std::sync::Once;

use table_registry::{
    CandidateSearch, DependencyRef, InMemoryGraphStore, RegistryError, ResolveError, StoreError,
    TableGraphStore, TableIdentifier, TableRegistry, VersionRef,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn ident(raw: &str) -> TableIdentifier {
    TableIdentifier::parse(raw).unwrap()
}

fn new_registry() -> (Arc<InMemoryGraphStore>, TableRegistry<InMemoryGraphStore>) {
    init_tracing();
    let store = Arc::new(InMemoryGraphStore::new());
    let registry = TableRegistry::new(Arc::clone(&store));
    (store, registry)
}

// ─────────────────────────────────────────────────────────────────────────────
// PUBLISH / FETCH LIFECYCLE
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_fetch_lifecycle() {
    let (_store, registry) = new_registry();
    let beasts = ident("@bob/beasts");

    let v1 = registry
        .publish_version(&beasts, "Beast\n1: goblin", &[])
        .await
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v1.key.as_str(), "bob-beasts-1");

    let v2 = registry
        .publish_version(&beasts, "Beast\n1: goblin\n2: orc", &[])
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    let pinned = registry
        .get_table_version(&beasts, VersionRef::Version(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pinned.definition, "Beast\n1: goblin");

    let latest = registry
        .get_table_version(&beasts, VersionRef::Latest)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.definition, "Beast\n1: goblin\n2: orc");
}

#[tokio::test]
async fn test_old_versions_survive_new_publishes() {
    let (_store, registry) = new_registry();
    let beasts = ident("@bob/beasts");

    for rev in 1..=5u32 {
        registry
            .publish_version(&beasts, &format!("rev {rev}"), &[])
            .await
            .unwrap();
    }

    for rev in 1..=5u32 {
        let vertex = registry
            .get_table_version(&beasts, VersionRef::Version(rev))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vertex.definition, format!("rev {rev}"));
    }
}

#[tokio::test]
async fn test_store_level_republish_is_idempotent() {
    let (store, _registry) = new_registry();
    let beasts = ident("@bob/beasts");

    let first = store.upsert_vertex(&beasts, 1, "Beast\n1: goblin").await.unwrap();
    // Same canonical content, different line endings and padding.
    let second = store
        .upsert_vertex(&beasts, 1, "  Beast\r\n1: goblin\r\n")
        .await
        .unwrap();

    assert_eq!(first.definition_hash, second.definition_hash);
    assert_eq!(store.num_vertices(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// CONCURRENT PUBLISHING
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_publishes_never_share_a_version_slot() {
    let (store, registry) = new_registry();
    let registry = Arc::new(registry);
    let beasts = ident("@bob/beasts");

    let a = {
        let registry = Arc::clone(&registry);
        let beasts = beasts.clone();
        tokio::spawn(async move {
            registry
                .publish_version(&beasts, "writer a content", &[])
                .await
        })
    };
    let b = {
        let registry = Arc::clone(&registry);
        let beasts = beasts.clone();
        tokio::spawn(async move {
            registry
                .publish_version(&beasts, "writer b content", &[])
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes: Vec<u32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|v| v.version))
        .collect();

    // At least one writer lands, and the losers fail with a version
    // conflict they could retry; nobody overwrites anybody.
    assert!(!successes.is_empty());
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(
                err,
                RegistryError::Store(StoreError::VersionConflict { .. })
            ));
        }
    }

    let mut distinct = successes.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), successes.len(), "versions must be distinct");
    assert_eq!(store.num_vertices(), successes.len());
}

#[tokio::test]
async fn test_concurrent_identical_publishes_collapse() {
    let (store, registry) = new_registry();
    let registry = Arc::new(registry);
    let beasts = ident("@bob/beasts");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        let beasts = beasts.clone();
        handles.push(tokio::spawn(async move {
            registry.publish_version(&beasts, "Beast\n1: goblin", &[]).await
        }));
    }

    for handle in handles {
        // Identical content can land in an existing slot, so every
        // writer succeeds; slots stay unique per canonical content.
        handle.await.unwrap().unwrap();
    }

    let latest = store
        .get_vertex(&beasts, VersionRef::Latest)
        .await
        .unwrap()
        .unwrap();
    assert!(latest.version >= 1);
    assert_eq!(latest.definition, "Beast\n1: goblin");
    assert_eq!(store.num_vertices() as u32, latest.version);
}

// ─────────────────────────────────────────────────────────────────────────────
// RESOLUTION + COMPOSITION OVER PUBLISHED GRAPHS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_campaign_document_end_to_end() {
    let (_store, registry) = new_registry();

    let rarity = ident("@carol/rarity");
    let beasts = ident("@bob/beasts");
    let potions = ident("@dan/potions");
    let encounters = ident("@alice/encounters");

    registry
        .publish_version(&rarity, "Rarity\n1: common", &[])
        .await
        .unwrap();
    registry
        .publish_version(
            &beasts,
            "Beast\n1: goblin",
            &[DependencyRef::latest(rarity.clone())],
        )
        .await
        .unwrap();
    registry
        .publish_version(&potions, "Potion\n1: healing", &[])
        .await
        .unwrap();

    let document = registry
        .compose_document(
            &encounters,
            "Encounter\n1: ambush",
            &[
                DependencyRef::latest(beasts.clone()),
                DependencyRef::latest(potions.clone()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        document,
        "Encounter\n1: ambush\n\n\
         @@PRAGMA namespace=@bob/beasts\nBeast\n1: goblin\n\n\
         @@PRAGMA namespace=@carol/rarity\nRarity\n1: common\n\n\
         @@PRAGMA namespace=@dan/potions\nPotion\n1: healing"
    );
}

#[tokio::test]
async fn test_republishing_a_dependency_shifts_latest_consumers() {
    let (_store, registry) = new_registry();
    let beasts = ident("@bob/beasts");
    let encounters = ident("@alice/encounters");
    let declared = [DependencyRef::latest(beasts.clone())];

    registry
        .publish_version(&beasts, "Beast\n1: goblin", &[])
        .await
        .unwrap();
    let before = registry
        .resolve_dependencies(&encounters, &declared)
        .await
        .unwrap();
    assert_eq!(before[0].version, 1);

    registry
        .publish_version(&beasts, "Beast\n1: tarrasque", &[])
        .await
        .unwrap();
    let after = registry
        .resolve_dependencies(&encounters, &declared)
        .await
        .unwrap();
    assert_eq!(after[0].version, 2);
    assert_eq!(after[0].definition, "Beast\n1: tarrasque");
}

#[tokio::test]
async fn test_cycle_in_published_graph_fails_resolution() {
    let (store, registry) = new_registry();
    let hydra = ident("@bob/hydra");
    let heads = ident("@bob/heads");

    // hydra v1 -> heads v1 -> hydra@latest closes a loop.
    let hydra_v1 = registry
        .publish_version(&hydra, "Hydra\n1: body", &[])
        .await
        .unwrap();
    registry
        .publish_version(
            &heads,
            "Heads\n1: three",
            &[DependencyRef::latest(hydra.clone())],
        )
        .await
        .unwrap();
    store
        .upsert_edge(&hydra_v1.key, DependencyRef::latest(heads.clone()))
        .await
        .unwrap();

    let err = registry
        .resolve_dependencies(&ident("@alice/root"), &[DependencyRef::latest(hydra.clone())])
        .await
        .unwrap_err();

    match err {
        RegistryError::Resolve(ResolveError::DependencyCycle { chain }) => {
            assert_eq!(chain, vec![hydra.clone(), heads, hydra]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_max_depth_is_configurable_through_the_registry() {
    let (_store, registry) = new_registry();
    let registry = registry.with_max_depth(2);

    let deep = ident("@chain/deep");
    let middle = ident("@chain/middle");
    let shallow = ident("@chain/shallow");

    registry.publish_version(&deep, "deep", &[]).await.unwrap();
    registry
        .publish_version(&middle, "middle", &[DependencyRef::latest(deep)])
        .await
        .unwrap();
    registry
        .publish_version(&shallow, "shallow", &[DependencyRef::latest(middle.clone())])
        .await
        .unwrap();

    let err = registry
        .resolve_dependencies(
            &ident("@alice/root"),
            &[DependencyRef::latest(shallow)],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Resolve(ResolveError::DepthExceeded { max_depth: 2 })
    ));

    // The two-level subtree still fits the bound.
    let ok = registry
        .resolve_dependencies(&ident("@alice/root"), &[DependencyRef::latest(middle)])
        .await
        .unwrap();
    assert_eq!(ok.len(), 2);
}

#[tokio::test]
async fn test_unknown_reference_reports_the_full_reference() {
    let (_store, registry) = new_registry();

    let err = registry
        .resolve_dependencies(
            &ident("@alice/root"),
            &[DependencyRef::pinned(ident("@g/ghost"), 7)],
        )
        .await
        .unwrap_err();

    match err {
        RegistryError::Resolve(ResolveError::DependencyNotFound { reference }) => {
            assert_eq!(reference.to_string(), "@g/ghost@7");
        }
        other => panic!("expected not-found, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CANDIDATE SEARCH
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_candidate_search_over_published_tables() {
    let (store, registry) = new_registry();

    for raw in ["@bob/beasts", "@alice/beast-lords", "@dan/potions"] {
        registry
            .publish_version(&ident(raw), "content", &[])
            .await
            .unwrap();
    }

    let search = CandidateSearch::new(Arc::clone(&store));
    let hits = search
        .find_candidates("beast", &ident("@bob/beasts"))
        .await
        .unwrap();
    assert_eq!(hits, vec![ident("@alice/beast-lords")]);
}
