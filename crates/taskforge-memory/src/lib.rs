pub mod daily_log;
pub mod db;
pub mod error;
pub mod extraction;
pub mod gc;
pub mod store;
pub mod types;
pub mod working;

pub use error::{MemoryError, Result};
pub use store::MemoryStore;
pub use working::WorkingMemoryStore;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use taskforge_core::types::{MatchType, MemoryCategory, MemorySource};
    use types::{MemoryFilters, SetOptions};

    fn store() -> MemoryStore {
        MemoryStore::new(Connection::open_in_memory().unwrap(), 3).unwrap()
    }

    #[test]
    fn set_get_roundtrip() {
        let s = store();
        s.set("greeting", "hello", SetOptions::default()).unwrap();
        let rec = s.get("greeting").unwrap().unwrap();
        assert_eq!(rec.value, "hello");
        assert_eq!(rec.category, MemoryCategory::Other);
    }

    #[test]
    fn invariant_6_session_collision_suffixes_key() {
        let s = store();
        s.set(
            "k",
            "v1",
            SetOptions { source: Some(MemorySource::Auto), session_id: Some("s1".into()), ..Default::default() },
        )
        .unwrap();
        s.set(
            "k",
            "v2",
            SetOptions { source: Some(MemorySource::Auto), session_id: Some("s2".into()), ..Default::default() },
        )
        .unwrap();

        assert_eq!(s.get("k").unwrap().unwrap().value, "v1");
        assert_eq!(s.get("k_2").unwrap().unwrap().value, "v2");
    }

    #[test]
    fn manual_source_overwrites_in_place() {
        let s = store();
        s.set("k", "v1", SetOptions { source: Some(MemorySource::Manual), ..Default::default() }).unwrap();
        s.set("k", "v2", SetOptions { source: Some(MemorySource::Manual), ..Default::default() }).unwrap();
        assert_eq!(s.get("k").unwrap().unwrap().value, "v2");
        assert!(s.get("k_2").unwrap().is_none());
    }

    #[test]
    fn invariant_7_record_access_increments_once() {
        let s = store();
        s.set("a", "1", SetOptions::default()).unwrap();
        s.set("b", "2", SetOptions::default()).unwrap();
        s.record_access(&["a".to_string(), "b".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(s.get("a").unwrap().unwrap().access_count, 1);
        assert_eq!(s.get("b").unwrap().unwrap().access_count, 1);
    }

    #[test]
    fn record_access_noop_on_empty() {
        let s = store();
        s.record_access(&[]).unwrap(); // must not panic or touch anything
    }

    #[test]
    fn delete_removes_record() {
        let s = store();
        s.set("x", "1", SetOptions::default()).unwrap();
        assert!(s.delete("x").unwrap());
        assert!(s.get("x").unwrap().is_none());
        assert!(!s.delete("x").unwrap());
    }

    #[test]
    fn search_fts_finds_substring_match() {
        let s = store();
        s.set("lang", "typescript is typed", SetOptions::default()).unwrap();
        s.set("lang2", "javascript is dynamic", SetOptions::default()).unwrap();
        let hits = s.search_fts("typescript", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.key, "lang");
        assert_eq!(hits[0].match_type, MatchType::Fts);
    }

    #[test]
    fn s5_hybrid_search_prefers_embedded_and_matched_record() {
        let s = store();
        s.set(
            "ts",
            "typescript is typed",
            SetOptions { embedding: Some(vec![1.0, 0.0, 0.0]), ..Default::default() },
        )
        .unwrap();
        s.set("js", "javascript is dynamic", SetOptions::default()).unwrap();

        let hits = s
            .search_hybrid("typescript", 5, 0.3, 0.7, &MemoryFilters::default(), Some(&[1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(hits[0].record.key, "ts");
        assert_eq!(hits[0].match_type, MatchType::Hybrid);
        assert!(hits[0].score > 0.0 && hits[0].score <= 1.0);
    }

    #[test]
    fn invariant_8_gc_noop_with_infinite_ages() {
        let s = store();
        s.set("auto1", "v", SetOptions { source: Some(MemorySource::Auto), ..Default::default() }).unwrap();
        let report = s
            .collect_garbage(chrono::Duration::days(36500), chrono::Duration::days(36500), false)
            .unwrap();
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn gc_deletes_unaccessed_auto_records_past_max_age() {
        let s = store();
        s.set("auto1", "v", SetOptions { source: Some(MemorySource::Auto), ..Default::default() }).unwrap();
        let report = s.collect_garbage(chrono::Duration::seconds(-1), chrono::Duration::days(36500), false).unwrap();
        assert_eq!(report.deleted, vec!["auto1".to_string()]);
        assert!(s.get("auto1").unwrap().is_none());
    }

    #[test]
    fn gc_never_deletes_manual_or_compaction() {
        let s = store();
        s.set("m", "v", SetOptions { source: Some(MemorySource::Manual), ..Default::default() }).unwrap();
        s.set("c", "v", SetOptions { source: Some(MemorySource::Compaction), ..Default::default() }).unwrap();
        let report = s.collect_garbage(chrono::Duration::seconds(-1), chrono::Duration::seconds(-1), false).unwrap();
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn working_memory_sweeps_expired_entries() {
        let wm = WorkingMemoryStore::new(Connection::open_in_memory().unwrap());
        wm.set("k", "v", "ctx", Some(chrono::Duration::seconds(-1))).unwrap();
        assert!(wm.get("k").unwrap().is_none());
        assert_eq!(wm.count().unwrap(), 0);
    }

    #[test]
    fn working_memory_promoted_entries_survive_expiry() {
        let wm = WorkingMemoryStore::new(Connection::open_in_memory().unwrap());
        wm.set("k", "v", "ctx", Some(chrono::Duration::seconds(-1))).unwrap();
        wm.mark_for_promotion("k").unwrap();
        let candidates = wm.get_promotion_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
