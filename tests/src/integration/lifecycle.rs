//! # Store Lifecycle Across Backends
//!
//! Restarts over the file backend, `clear` between instances, and the
//! index-propagation bound of the in-memory backend.

#[cfg(test)]
mod tests {
    use dif_store::{
        open_store, Consistency, Dif, DifStore, DifStoreApi, DifStoreDependencies, Fingerprint,
        InMemoryDocumentServer, LogEntry, StoreConfig, SystemTimeSource,
    };
    use serde_json::json;

    fn submission(url: &str) -> Fingerprint {
        Fingerprint::from_difs(&[Dif::new("url", url), Dif::new("title", "Report")])
    }

    #[test]
    fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}/sicds", dir.path().display());

        {
            let store = open_store(&url, StoreConfig::default()).unwrap();
            store.ensure_keys(&["news", "blogs"]).unwrap();
            store.add("news", &submission("http://a")).unwrap();
            store
                .append(LogEntry::new().with_field("timestamp", 1).with_field("success", true))
                .unwrap();
        }

        let store = open_store(&url, StoreConfig::default()).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["news", "blogs"]);
        assert!(store.has("news", &submission("http://a")).unwrap());
        assert!(!store.has("blogs", &submission("http://a")).unwrap());
        assert_eq!(store.log_entries_at(&json!(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_is_visible_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}/sicds", dir.path().display());

        {
            let store = open_store(&url, StoreConfig::default()).unwrap();
            store.register_key("news").unwrap();
            store.add("news", &submission("http://a")).unwrap();
            store.clear().unwrap();
        }

        let store = open_store(&url, StoreConfig::default()).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(!store.has("news", &submission("http://a")).unwrap());
        assert!(store.log_entries().unwrap().is_empty());
    }

    #[test]
    fn test_clear_by_one_store_is_seen_by_another() {
        let server = InMemoryDocumentServer::new();
        let open = || {
            let deps = DifStoreDependencies {
                db: server.database("sicds"),
                time_source: SystemTimeSource,
            };
            DifStore::new(deps, StoreConfig::default()).unwrap()
        };

        let writer = open();
        let reader = open();
        writer.register_key("news").unwrap();
        writer.add("news", &submission("http://a")).unwrap();
        assert!(reader.has("news", &submission("http://a")).unwrap());

        writer.clear().unwrap();
        assert!(!reader.has("news", &submission("http://a")).unwrap());
        assert!(reader.keys().unwrap().is_empty());
    }

    #[test]
    fn test_eventual_lag_is_bounded_by_refresh_threshold() {
        let threshold = 4;
        let config = StoreConfig::default()
            .with_has_consistency(Consistency::Eventual)
            .with_index_refresh_threshold(threshold);
        let server = InMemoryDocumentServer::new().with_refresh_threshold(threshold);
        let deps = DifStoreDependencies {
            db: server.database("sicds"),
            time_source: SystemTimeSource,
        };
        let store = DifStore::new(deps, config).unwrap();

        let first = submission("http://0");
        store.add("k", &first).unwrap();
        assert!(!store.has("k", &first).unwrap());

        for i in 1..=threshold {
            store.add("k", &submission(&format!("http://{}", i))).unwrap();
        }
        // The index refreshed itself once it held more than `threshold`
        // unseen writes.
        assert!(store.has("k", &first).unwrap());
        assert!(store.has_with("k", &first, Consistency::Strong).unwrap());
    }

    #[test]
    fn test_request_log_round_trip() {
        let store = open_store("memory:", StoreConfig::default()).unwrap();
        let request = dif_store::RequestContext {
            remote_addr: "192.0.2.7".to_string(),
            body: r#"{"key":"news"}"#.to_string(),
        };

        store
            .log_success(&request, json!({ "uniques": 1 }), &["a".to_string()], &[])
            .unwrap();
        store.log_error(&request, "unknown key").unwrap();

        let entries = store.log_entries().unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.get("remote_addr"), Some(&json!("192.0.2.7")));
            assert!(entry.get("timestamp").is_some());
        }
    }
}
