use super::*;

const SAMPLE: &str = r##"{"nodes":[{"id":"a1","type":"file","file":"img/one.png","x":0,"y":0,"width":200,"height":150,"color":"4"},{"id":"t1","type":"text","text":"hello","x":300,"y":10,"width":250,"height":60}],"edges":[{"id":"e1","fromNode":"a1","fromSide":"right","toNode":"t1","toSide":"left"}],"metadata":{"version":"1.0"}}"##;

#[test]
fn parse_reads_known_fields() {
    let doc = CanvasDocument::parse(SAMPLE).unwrap();
    assert_eq!(doc.nodes.len(), 2);
    let node = &doc.nodes[0];
    assert_eq!(node.node_id(), Some("a1"));
    assert!(node.is_file());
    assert_eq!(node.file_path(), Some("img/one.png"));
    assert_eq!(node.width, Some(Value::from(200)));
    assert!(!doc.nodes[1].is_file());
    assert!(doc.nodes[1].file_path().is_none());
}

#[test]
fn unknown_fields_round_trip() {
    let doc = CanvasDocument::parse(SAMPLE).unwrap();
    let text = doc.to_json().unwrap();

    let original: Value = serde_json::from_str(SAMPLE).unwrap();
    let rewritten: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(original, rewritten);
}

#[test]
fn parse_missing_edges_defaults_empty() {
    let doc = CanvasDocument::parse(r#"{"nodes":[]}"#).unwrap();
    assert!(doc.nodes.is_empty());
    assert!(doc.edges.is_empty());
}

#[test]
fn parse_rejects_garbage() {
    let err = CanvasDocument::parse("{not json").unwrap_err();
    assert!(matches!(err, CanvasError::Parse(_)));
}

#[test]
fn center_uses_default_size_when_absent() {
    let doc = CanvasDocument::parse(r#"{"nodes":[{"id":"n","type":"file","file":"a.png","x":10,"y":20}]}"#).unwrap();
    let (cx, cy) = doc.nodes[0].center().unwrap();
    assert!((cx - 60.0).abs() < f64::EPSILON);
    assert!((cy - 70.0).abs() < f64::EPSILON);
}

#[test]
fn with_renamed_rewrites_only_matching_nodes() {
    let doc = CanvasDocument::parse(SAMPLE).unwrap();
    let renamed = vec![
        PlanEntry { node_id: "a1".into(), old_path: "img/one.png".into(), new_path: "P_L1C1.png".into() },
        PlanEntry { node_id: "missing".into(), old_path: "x.png".into(), new_path: "y.png".into() },
    ];

    let next = doc.with_renamed(&renamed);
    assert_eq!(next.nodes[0].file_path(), Some("P_L1C1.png"));
    assert_eq!(next.nodes[0].extra.get("color"), Some(&Value::from("4")));
    assert_eq!(next.nodes[1], doc.nodes[1]);
    // The source snapshot is left alone.
    assert_eq!(doc.nodes[0].file_path(), Some("img/one.png"));
}

#[test]
fn with_renamed_skips_node_whose_file_changed() {
    let doc = CanvasDocument::parse(SAMPLE).unwrap();
    let renamed = vec![PlanEntry { node_id: "a1".into(), old_path: "img/other.png".into(), new_path: "P.png".into() }];
    let next = doc.with_renamed(&renamed);
    assert_eq!(next.nodes[0].file_path(), Some("img/one.png"));
}

#[test]
fn node_referencing_matches_id_and_path() {
    let doc = CanvasDocument::parse(SAMPLE).unwrap();
    assert!(doc.node_referencing("a1", "img/one.png").is_some());
    assert!(doc.node_referencing("a1", "img/two.png").is_none());
    assert!(doc.node_referencing("t1", "img/one.png").is_none());
}

#[test]
fn fractional_coordinates_stay_fractional() {
    let text = r#"{"nodes":[{"id":"n","type":"file","file":"a.png","x":-12.5,"y":-40,"width":99.75}],"edges":[]}"#;
    let doc = CanvasDocument::parse(text).unwrap();
    let rewritten: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    let original: Value = serde_json::from_str(text).unwrap();
    assert_eq!(original, rewritten);
}

#[test]
fn malformed_node_fields_parse_and_round_trip() {
    let text = r#"{"nodes":[{"id":"n","type":"file","file":42,"x":0,"y":0},{"id":"m","type":"file","file":"a.png"},{"id":7,"type":null,"file":"b.png","x":"oops","y":0,"width":null}],"edges":[]}"#;
    let doc = CanvasDocument::parse(text).unwrap();

    assert!(doc.nodes[0].file_path().is_none());
    assert!(doc.nodes[1].center().is_none());
    assert!(doc.nodes[2].node_id().is_none());
    assert!(!doc.nodes[2].is_file());
    assert!(doc.nodes[2].center().is_none());
    assert_eq!(doc.nodes[2].width, Some(Value::Null));

    let rewritten: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    let original: Value = serde_json::from_str(text).unwrap();
    assert_eq!(original, rewritten);
}
