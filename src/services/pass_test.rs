use super::*;
use crate::store::test_helpers::MemoryStore;

const TARGET: &str = "boards/grid.canvas";

fn config() -> RenameConfig {
    RenameConfig::new(Some(TARGET), Some("P_")).unwrap()
}

fn canvas(nodes: &[(&str, &str, f64, f64)]) -> String {
    let nodes: Vec<serde_json::Value> = nodes
        .iter()
        .map(|(id, file, x, y)| serde_json::json!({"id": id, "type": "file", "file": file, "x": x, "y": y, "color": "2"}))
        .collect();
    serde_json::json!({"nodes": nodes, "edges": [{"id": "e", "fromNode": "a", "toNode": "b"}]}).to_string()
}

fn files_of(store: &MemoryStore) -> Vec<String> {
    let doc = CanvasDocument::parse(&store.get(TARGET).unwrap()).unwrap();
    doc.nodes.iter().filter_map(|n| n.file_path().map(str::to_owned)).collect()
}

// =============================================================================
// run_pass
// =============================================================================

#[tokio::test]
async fn run_pass_renames_and_persists_once() {
    let text = canvas(&[("a", "boards/Pasted 1.png", 0.0, 0.0), ("b", "boards/Pasted 2.jpg", 300.0, 0.0)]);
    let store = MemoryStore::with_files([
        (TARGET, text.as_str()),
        ("boards/Pasted 1.png", "1"),
        ("boards/Pasted 2.jpg", "2"),
    ]);

    let report = run_pass(&store, &config(), Origin::Tick).await.unwrap();

    assert_eq!(report.renamed.len(), 2);
    assert!(report.persisted);
    assert_eq!(store.writes(), vec![TARGET.to_owned()]);
    assert_eq!(store.get("boards/P_L1C1.png").as_deref(), Some("1"));
    assert_eq!(store.get("boards/P_L1C2.jpg").as_deref(), Some("2"));
    assert_eq!(files_of(&store), vec!["boards/P_L1C1.png", "boards/P_L1C2.jpg"]);
}

#[tokio::test]
async fn run_pass_preserves_unknown_fields() {
    let text = canvas(&[("a", "boards/x.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/x.png", "")]);

    run_pass(&store, &config(), Origin::Tick).await.unwrap();

    let written: serde_json::Value = serde_json::from_str(&store.get(TARGET).unwrap()).unwrap();
    assert_eq!(written["nodes"][0]["color"], "2");
    assert_eq!(written["nodes"][0]["file"], "boards/P_L1C1.png");
    assert_eq!(written["edges"][0]["fromNode"], "a");
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let text = canvas(&[("a", "boards/x.png", 0.0, 0.0), ("b", "boards/y.png", 0.0, 400.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/x.png", ""), ("boards/y.png", "")]);

    run_pass(&store, &config(), Origin::Tick).await.unwrap();
    let second = run_pass(&store, &config(), Origin::Tick).await.unwrap();

    assert!(second.renamed.is_empty());
    assert!(!second.persisted);
    assert_eq!(second.qualifying, 2);
    assert_eq!(store.writes().len(), 1);
    assert_eq!(store.renames().len(), 2);
}

#[tokio::test]
async fn run_pass_missing_source_goes_to_retry() {
    let text = canvas(&[("a", "boards/late.png", 0.0, 0.0), ("b", "boards/here.png", 300.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/here.png", "")]);

    let report = run_pass(&store, &config(), Origin::Paste).await.unwrap();

    assert_eq!(report.retry.len(), 1);
    assert_eq!(report.retry[0].old_path, "boards/late.png");
    assert_eq!(report.renamed.len(), 1);
    assert!(report.abandoned.is_empty());
    // The missing node keeps its old path in the written document.
    assert_eq!(files_of(&store), vec!["boards/late.png", "boards/P_L1C2.png"]);
}

#[tokio::test]
async fn run_pass_conflict_is_abandoned_without_retry() {
    let text = canvas(&[("a", "boards/x.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/x.png", "x"), ("boards/P_L1C1.png", "taken")]);

    let report = run_pass(&store, &config(), Origin::Tick).await.unwrap();

    assert!(report.retry.is_empty());
    assert_eq!(report.abandoned.len(), 1);
    assert_eq!(report.abandoned[0].code, "E_CONFLICT");
    assert!(!report.persisted);
    assert!(store.writes().is_empty());
    assert_eq!(store.get("boards/P_L1C1.png").as_deref(), Some("taken"));
}

#[tokio::test]
async fn run_pass_unparseable_document_is_untouched() {
    let broken = r#"{"nodes":[{"id":"a","type":"file","file":"boards/x.png","x":0,"#;
    let store = MemoryStore::with_files([(TARGET, broken), ("boards/x.png", "")]);

    let err = run_pass(&store, &config(), Origin::Tick).await.unwrap_err();

    assert!(matches!(err, PassError::Canvas { .. }));
    assert_eq!(err.error_code(), "E_CANVAS_PARSE");
    assert_eq!(store.get(TARGET).as_deref(), Some(broken));
    assert!(store.writes().is_empty());
    assert!(store.renames().is_empty());
}

#[tokio::test]
async fn run_pass_skips_node_with_broken_coordinate() {
    let text = r#"{"nodes":[{"id":"a","type":"file","file":"boards/a.png","x":0,"y":0},{"id":"b","type":"file","file":"boards/b.png","x":"oops","y":0}],"edges":[]}"#;
    let store = MemoryStore::with_files([(TARGET, text), ("boards/a.png", ""), ("boards/b.png", "")]);

    let report = run_pass(&store, &config(), Origin::Tick).await.unwrap();

    assert_eq!(report.renamed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].node_id, "b");
    assert!(store.contains("boards/P_L1C1.png"));
    assert!(store.contains("boards/b.png"));
    let written: serde_json::Value = serde_json::from_str(&store.get(TARGET).unwrap()).unwrap();
    assert_eq!(written["nodes"][0]["file"], "boards/P_L1C1.png");
    assert_eq!(written["nodes"][1]["x"], "oops");
}

#[tokio::test]
async fn run_pass_missing_document_errors() {
    let store = MemoryStore::default();
    let err = run_pass(&store, &config(), Origin::Tick).await.unwrap_err();
    assert!(matches!(err, PassError::Read { .. }));
    assert_eq!(err.error_code(), "E_NOT_FOUND");
}

#[tokio::test]
async fn run_pass_without_images_reports_zero_qualifying() {
    let text = r#"{"nodes":[{"id":"t","type":"text","text":"hi","x":0,"y":0}],"edges":[]}"#;
    let store = MemoryStore::with_files([(TARGET, text)]);

    let report = run_pass(&store, &config(), Origin::Paste).await.unwrap();

    assert_eq!(report.qualifying, 0);
    assert!(report.renamed.is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn preview_does_not_rename() {
    let text = canvas(&[("a", "boards/x.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/x.png", "")]);

    let plan = preview(&store, &config()).await.unwrap();

    assert_eq!(plan.entries.len(), 1);
    assert_eq!(plan.entries[0].new_path, "boards/P_L1C1.png");
    assert!(store.renames().is_empty());
    assert!(store.writes().is_empty());
}

// =============================================================================
// retry_entry
// =============================================================================

fn late_entry() -> PlanEntry {
    PlanEntry { node_id: "a".into(), old_path: "boards/late.png".into(), new_path: "boards/P_L1C1.png".into() }
}

#[tokio::test]
async fn retry_entry_renames_once_file_appears() {
    let text = canvas(&[("a", "boards/late.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str())]);

    let first = run_pass(&store, &config(), Origin::Paste).await.unwrap();
    assert_eq!(first.retry, vec![late_entry()]);

    store.insert("boards/late.png", "img");
    let report = retry_entry(&store, &config(), first.retry[0].clone()).await.unwrap();

    assert_eq!(report.origin, Origin::Retry);
    assert_eq!(report.renamed, vec![late_entry()]);
    assert!(report.retry.is_empty());
    assert!(report.persisted);
    assert_eq!(files_of(&store), vec!["boards/P_L1C1.png"]);
}

#[tokio::test]
async fn retry_entry_still_missing_is_abandoned_not_retried() {
    let text = canvas(&[("a", "boards/late.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str())]);

    let report = retry_entry(&store, &config(), late_entry()).await.unwrap();

    assert!(report.retry.is_empty());
    assert_eq!(report.abandoned.len(), 1);
    assert_eq!(report.abandoned[0].code, "E_SOURCE_MISSING");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn retry_entry_drops_stale_entry() {
    // The node was re-pointed elsewhere between the pass and the retry.
    let text = canvas(&[("a", "boards/other.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/late.png", "")]);

    let report = retry_entry(&store, &config(), late_entry()).await.unwrap();

    assert_eq!(report.abandoned[0].code, "E_STALE_ENTRY");
    assert!(store.renames().is_empty());
    assert!(store.contains("boards/late.png"));
}

// =============================================================================
// apply_once
// =============================================================================

#[tokio::test(start_paused = true)]
async fn apply_once_without_missing_sources_is_a_single_pass() {
    let text = canvas(&[("a", "boards/x.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str()), ("boards/x.png", "")]);

    let reports = apply_once(&store, &config(), Duration::from_secs(1)).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].origin, Origin::Manual);
    assert_eq!(reports[0].renamed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn apply_once_retries_missing_source_once() {
    let text = canvas(&[("a", "boards/late.png", 0.0, 0.0)]);
    let store = MemoryStore::with_files([(TARGET, text.as_str())]);

    let start = tokio::time::Instant::now();
    let reports = apply_once(&store, &config(), Duration::from_secs(1)).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].retry.len(), 1);
    assert_eq!(reports[1].origin, Origin::Retry);
    assert_eq!(reports[1].abandoned[0].code, "E_SOURCE_MISSING");
}
