//! # Concurrent Store Instances
//!
//! Threads each open their own `DifStore` on one shared in-memory server and
//! race on the same database:
//!
//! 1. **Registry**: concurrent `register_key` loses no key
//! 2. **Dedup**: concurrent identical `add` leaves one discoverable record
//! 3. **Bootstrap**: concurrent first opens all succeed and index once

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Barrier;
    use std::thread;

    use dif_store::domain::index::FINGERPRINT_INDEX;
    use dif_store::{
        Consistency, DifStore, DifStoreApi, DifStoreDependencies, DocumentDatabase, Fingerprint,
        FingerprintRecord, InMemoryDocumentDb, InMemoryDocumentServer, IndexQuery, RetryPolicy,
        StoreConfig, SystemTimeSource,
    };

    const THREADS: usize = 8;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// A retry budget no realistic interleaving of `THREADS` writers exhausts.
    fn contended_config() -> StoreConfig {
        StoreConfig::default().with_registry_retry(RetryPolicy::immediate(10_000))
    }

    fn open(server: &InMemoryDocumentServer, config: StoreConfig) -> DifStore<InMemoryDocumentDb, SystemTimeSource> {
        let deps = DifStoreDependencies {
            db: server.database("sicds"),
            time_source: SystemTimeSource,
        };
        DifStore::new(deps, config).unwrap()
    }

    fn record_rows(server: &InMemoryDocumentServer, key: &str, fingerprint: &Fingerprint) -> usize {
        let lookup = FingerprintRecord::index_key(key, fingerprint).to_string();
        server
            .database("sicds")
            .query_index(FINGERPRINT_INDEX, &IndexQuery::Key(lookup), Consistency::Strong)
            .unwrap()
            .len()
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    #[test]
    fn test_concurrent_register_key_loses_no_updates() {
        let server = InMemoryDocumentServer::new();
        open(&server, contended_config());
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for t in 0..THREADS {
                let server = server.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    let store = open(&server, contended_config());
                    barrier.wait();
                    for i in 0..25 {
                        assert!(store.register_key(&format!("key-{}-{}", t, i)).unwrap());
                    }
                });
            }
        });

        let keys = open(&server, contended_config()).keys().unwrap();
        assert_eq!(keys.len(), THREADS * 25);
        let unique: BTreeSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_concurrent_register_same_key_is_new_once() {
        let server = InMemoryDocumentServer::new();
        open(&server, contended_config());
        let barrier = Barrier::new(THREADS);

        let fresh: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let server = server.clone();
                    let barrier = &barrier;
                    s.spawn(move || {
                        let store = open(&server, contended_config());
                        barrier.wait();
                        store.register_key("shared").unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(fresh, 1);
        assert_eq!(open(&server, contended_config()).keys().unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_concurrent_ensure_keys_merge() {
        let server = InMemoryDocumentServer::new();
        open(&server, contended_config());
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for t in 0..THREADS {
                let server = server.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    let store = open(&server, contended_config());
                    let own = format!("own-{}", t);
                    barrier.wait();
                    store.ensure_keys(&["common", own.as_str()]).unwrap();
                });
            }
        });

        let keys: BTreeSet<String> = open(&server, contended_config())
            .keys()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(keys.len(), THREADS + 1);
        assert!(keys.contains("common"));
    }

    // =========================================================================
    // DEDUP
    // =========================================================================

    #[test]
    fn test_concurrent_identical_add_keeps_one_record() {
        let server = InMemoryDocumentServer::new();
        open(&server, StoreConfig::default());
        let fingerprint = Fingerprint::new(b"same submission".to_vec());
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let server = server.clone();
                let barrier = &barrier;
                let fingerprint = &fingerprint;
                s.spawn(move || {
                    let store = open(&server, StoreConfig::default());
                    barrier.wait();
                    store.add("k", fingerprint).unwrap();
                });
            }
        });

        let store = open(&server, StoreConfig::default());
        assert!(store.has("k", &fingerprint).unwrap());
        assert_eq!(record_rows(&server, "k", &fingerprint), 1);
    }

    #[test]
    fn test_concurrent_distinct_adds_are_all_found() {
        let server = InMemoryDocumentServer::new();
        open(&server, StoreConfig::default());

        thread::scope(|s| {
            for t in 0..THREADS {
                let server = server.clone();
                s.spawn(move || {
                    let store = open(&server, StoreConfig::default());
                    for i in 0..50 {
                        let fingerprint = Fingerprint::new(format!("{}-{}", t, i).into_bytes());
                        store.add("k", &fingerprint).unwrap();
                    }
                });
            }
        });

        let store = open(&server, StoreConfig::default());
        for t in 0..THREADS {
            for i in 0..50 {
                let fingerprint = Fingerprint::new(format!("{}-{}", t, i).into_bytes());
                assert!(store.has("k", &fingerprint).unwrap());
            }
        }
        assert!(!store.has("k", &Fingerprint::new(b"never".to_vec())).unwrap());
    }

    #[test]
    fn test_check_then_add_under_contention() {
        let server = InMemoryDocumentServer::new();
        open(&server, StoreConfig::default());
        let fingerprint = Fingerprint::new(b"raced".to_vec());
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let server = server.clone();
                let barrier = &barrier;
                let fingerprint = &fingerprint;
                s.spawn(move || {
                    let store = open(&server, StoreConfig::default());
                    barrier.wait();
                    if !store.has("k", fingerprint).unwrap() {
                        store.add("k", fingerprint).unwrap();
                    }
                });
            }
        });

        assert_eq!(record_rows(&server, "k", &fingerprint), 1);
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    #[test]
    fn test_concurrent_bootstrap() {
        let server = InMemoryDocumentServer::new();
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let server = server.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    open(&server, StoreConfig::default());
                });
            }
        });

        assert_eq!(server.database_names(), vec!["sicds".to_string()]);
        let store = open(&server, StoreConfig::default());
        assert!(store.keys().unwrap().is_empty());

        let fingerprint = Fingerprint::new(b"after bootstrap".to_vec());
        store.add("k", &fingerprint).unwrap();
        assert!(store.has("k", &fingerprint).unwrap());
    }
}
