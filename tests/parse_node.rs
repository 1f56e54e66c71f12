//! Integration tests for the parse node.
//!
//! These drive `ParseNode` through its public surface with the default
//! html2text converter, the way an orchestrator would.
//!
//! Run with:
//!   cargo test --test parse_node -- --nocapture
//!
//! Set `RUST_LOG=debug` to see the node's tracing output.

use pipeline_parse_node::{
    ConversionError, ContentConverter, Node, NodeConfig, NodeError, NodeProgressCallback,
    ParseNode, State,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn parse_node(config: Option<NodeConfig>) -> ParseNode {
    init_tracing();
    ParseNode::new("docs", vec!["parsed_doc".to_string()], config, None)
        .expect("node should build")
}

fn html_docs(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "content": format!(
                        "<html><body><h2>Page {i}</h2><p>Body of page {i}, see \
                         <a href=\"https://example.org/page/{i}\">link {i}</a>.</p></body></html>"
                    ),
                    "source": format!("https://example.org/page/{i}"),
                    "depth": i % 3,
                    "tags": ["fetched", {"status": 200}],
                })
            })
            .collect(),
    )
}

fn state_with_docs(docs: Value) -> State {
    let mut state = State::new();
    state.set("docs", docs);
    state.set("user_prompt", json!("What is on these pages?"));
    state
}

fn output(state: &State) -> &Vec<Value> {
    state
        .get("parsed_doc")
        .and_then(Value::as_array)
        .expect("output slot should hold an array")
}

/// Assert that `text` looks like converted output.
fn assert_plain_text(text: &str, context: &str) {
    assert!(!text.contains("<p>"), "[{context}] markup left: {text:?}");
    assert!(!text.contains("</"), "[{context}] markup left: {text:?}");
    assert!(!text.contains("href"), "[{context}] link target left: {text:?}");
    assert!(!text.contains("https://"), "[{context}] URL left: {text:?}");
}

/// Converter that fails on one marker and otherwise delegates to html2text.
fn failing_on(marker: &'static str) -> Arc<dyn ContentConverter> {
    let inner = pipeline_parse_node::Html2TextConverter::default();
    Arc::new(move |html: &str| -> Result<String, ConversionError> {
        if html.contains(marker) {
            Err(ConversionError::RenderFailed {
                detail: format!("cannot render {marker}"),
            })
        } else {
            inner.convert(html)
        }
    })
}

// ── Core behaviour ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_converts_every_document_in_order() {
    let node = parse_node(None);
    let mut state = state_with_docs(html_docs(5));

    node.execute(&mut state).await.expect("execute should succeed");

    let out = output(&state);
    assert_eq!(out.len(), 5);
    for (i, doc) in out.iter().enumerate() {
        let text = doc["content"].as_str().unwrap();
        assert!(text.contains(&format!("Page {i}")), "doc {i}: {text:?}");
        assert!(text.contains(&format!("link {i}")), "doc {i}: {text:?}");
        assert_plain_text(text, &format!("doc {i}"));
    }
}

#[tokio::test]
async fn test_only_content_field_changes() {
    let node = parse_node(None);
    let input = html_docs(4);
    let mut state = state_with_docs(input.clone());

    node.execute(&mut state).await.unwrap();

    for (before, after) in input.as_array().unwrap().iter().zip(output(&state)) {
        let before = before.as_object().unwrap();
        let after = after.as_object().unwrap();
        assert_eq!(before.len(), after.len());
        for (key, value) in before {
            if key != "content" {
                assert_eq!(after.get(key), Some(value), "field {key} changed");
            }
        }
    }
}

#[tokio::test]
async fn test_other_slots_untouched() {
    let node = parse_node(None);
    let input = html_docs(2);
    let mut state = state_with_docs(input.clone());

    node.execute(&mut state).await.unwrap();

    assert_eq!(state.get("docs"), Some(&input));
    assert_eq!(state.get("user_prompt"), Some(&json!("What is on these pages?")));
    assert_eq!(state.len(), 3);
}

#[tokio::test]
async fn test_link_text_kept_url_dropped() {
    let node = parse_node(None);
    let mut state = state_with_docs(json!([
        {"content": "<a href=\"http://x\">click here</a>"}
    ]));

    node.execute(&mut state).await.unwrap();

    let text = output(&state)[0]["content"].as_str().unwrap();
    assert!(text.contains("click here"), "got: {text:?}");
    assert!(!text.contains("http://x"), "got: {text:?}");
}

#[tokio::test]
async fn test_empty_collection() {
    let node = parse_node(None);
    let mut state = state_with_docs(json!([]));

    node.execute(&mut state).await.unwrap();

    assert!(output(&state).is_empty());
}

#[tokio::test]
async fn test_empty_content_converts_to_empty_string() {
    let node = parse_node(None);
    let mut state = state_with_docs(json!([{"content": ""}]));

    node.execute(&mut state).await.unwrap();

    assert_eq!(output(&state)[0]["content"], json!(""));
}

#[tokio::test]
async fn test_idempotent() {
    let node = parse_node(None);
    let mut state = state_with_docs(html_docs(3));
    node.execute(&mut state).await.unwrap();
    let once = output(&state).clone();

    // Feed the output back in as the input collection. The fixtures hold no
    // escaped markup, so the converted text contains nothing that reads as HTML.
    let mut again = state_with_docs(Value::Array(once.clone()));
    node.execute(&mut again).await.unwrap();

    assert_eq!(output(&again), &once);
}

#[tokio::test]
async fn test_overwrites_previous_output() {
    let node = parse_node(None);
    let mut state = state_with_docs(html_docs(1));
    state.set("parsed_doc", json!("stale"));

    node.execute(&mut state).await.unwrap();

    assert_eq!(output(&state).len(), 1);
}

// ── Input resolution ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_input_slot_leaves_state_unchanged() {
    let node = parse_node(None);
    let mut state = State::new();
    state.set("user_prompt", json!("question"));
    let before = state.clone();

    let err = node.execute(&mut state).await.unwrap_err();

    assert!(
        matches!(err, NodeError::MissingInputSlot { .. }),
        "unexpected error: {err}"
    );
    assert_eq!(state, before);
}

#[tokio::test]
async fn test_compound_expression_reads_first_resolved_slot() {
    init_tracing();
    let node = ParseNode::new(
        "html_docs | docs",
        vec!["parsed_doc".to_string()],
        None,
        None,
    )
    .unwrap();
    let mut state = state_with_docs(json!([{"content": "<p>from docs</p>"}]));

    node.execute(&mut state).await.unwrap();
    assert!(output(&state)[0]["content"]
        .as_str()
        .unwrap()
        .contains("from docs"));

    state.set("html_docs", json!([{"content": "<p>from html_docs</p>"}]));
    node.execute(&mut state).await.unwrap();
    assert!(output(&state)[0]["content"]
        .as_str()
        .unwrap()
        .contains("from html_docs"));
}

#[tokio::test]
async fn test_and_expression_requires_every_slot() {
    init_tracing();
    let node = ParseNode::new("docs & url", vec!["parsed_doc".to_string()], None, None).unwrap();
    let mut state = state_with_docs(html_docs(1));

    let err = node.execute(&mut state).await.unwrap_err();
    assert!(matches!(err, NodeError::MissingInputSlot { .. }));

    state.set("url", json!("https://example.org"));
    node.execute(&mut state).await.unwrap();
    assert_eq!(output(&state).len(), 1);
}

// ── Atomic failure ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failure_at_any_index_publishes_nothing() {
    let n = 6;
    for k in 0..n {
        for concurrency in [1, 4] {
            let config = NodeConfig::builder()
                .converter(failing_on("BROKEN"))
                .concurrency(concurrency)
                .build()
                .unwrap();
            let node = parse_node(Some(config));

            let mut docs = html_docs(n);
            docs[k]["content"] = json!("<p>BROKEN</p>");
            let mut state = state_with_docs(docs);
            state.set("parsed_doc", json!("previous run"));
            let before = state.clone();

            let err = node.execute(&mut state).await.unwrap_err();

            match err {
                NodeError::MalformedDocument { index, .. } => assert_eq!(index, Some(k)),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(state, before, "k={k}, concurrency={concurrency}");
        }
    }
}

#[tokio::test]
async fn test_malformed_documents_are_rejected() {
    let node = parse_node(None);

    for (docs, bad_index) in [
        (json!([{"content": "<p>ok</p>"}, {"title": "no content"}]), Some(1)),
        (json!([{"content": {"tag": "p"}}]), Some(0)),
        (json!([{"content": "<p>ok</p>"}, "just a string"]), Some(1)),
        (json!({"content": "<p>not a list</p>"}), None),
    ] {
        let mut state = state_with_docs(docs.clone());
        let before = state.clone();

        let err = node.execute(&mut state).await.unwrap_err();

        match err {
            NodeError::MalformedDocument { index, .. } => {
                assert_eq!(index, bad_index, "input: {docs}")
            }
            other => panic!("unexpected error for {docs}: {other}"),
        }
        assert_eq!(state, before);
    }
}

// ── Concurrency & progress ───────────────────────────────────────────────────

#[tokio::test]
async fn test_parallel_conversion_preserves_order() {
    let sequential = parse_node(None);
    let parallel = parse_node(Some(NodeConfig::builder().concurrency(8).build().unwrap()));

    let mut a = state_with_docs(html_docs(40));
    let mut b = a.clone();
    sequential.execute(&mut a).await.unwrap();
    parallel.execute(&mut b).await.unwrap();

    assert_eq!(a, b);
}

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    completed: Mutex<Vec<usize>>,
    errors: AtomicUsize,
    finished: Mutex<Option<(usize, usize)>>,
}

impl NodeProgressCallback for Recorder {
    fn on_execute_start(&self, total: usize) {
        self.started.store(total, Ordering::SeqCst);
    }

    fn on_document_complete(&self, index: usize, _total: usize, _text_len: usize) {
        self.completed.lock().unwrap().push(index);
    }

    fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_execute_complete(&self, total: usize, success_count: usize) {
        *self.finished.lock().unwrap() = Some((total, success_count));
    }
}

#[tokio::test]
async fn test_progress_callback_sees_every_document() {
    let recorder = Arc::new(Recorder::default());
    let config = NodeConfig::builder()
        .concurrency(3)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let node = parse_node(Some(config));
    let mut state = state_with_docs(html_docs(7));

    node.execute(&mut state).await.unwrap();

    assert_eq!(recorder.started.load(Ordering::SeqCst), 7);
    let mut seen = recorder.completed.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..7).collect::<Vec<_>>());
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((7, 7)));
}

#[tokio::test]
async fn test_progress_callback_reports_failure() {
    let recorder = Arc::new(Recorder::default());
    let config = NodeConfig::builder()
        .converter(failing_on("BROKEN"))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let node = parse_node(Some(config));
    let mut docs = html_docs(3);
    docs[1]["content"] = json!("<p>BROKEN</p>");
    let mut state = state_with_docs(docs);

    assert!(node.execute(&mut state).await.is_err());
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    // The batch is closed out even though nothing was published
    assert_eq!(*recorder.finished.lock().unwrap(), Some((3, 0)));
}

// ── Configuration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_verbose_does_not_change_output() {
    let quiet = parse_node(None);
    let verbose = parse_node(Some(NodeConfig::builder().verbose(true).build().unwrap()));

    let mut a = state_with_docs(html_docs(3));
    let mut b = a.clone();
    quiet.execute(&mut a).await.unwrap();
    verbose.execute(&mut b).await.unwrap();

    assert_eq!(a, b);
}

#[tokio::test]
async fn test_key_value_config_with_custom_field() {
    init_tracing();
    let config = json!({
        "verbose": false,
        "content_field": "document",
        "llm_model": "shared with other nodes",
    });
    let node = ParseNode::from_map(
        "docs",
        vec!["parsed_doc".to_string()],
        config.as_object().unwrap(),
        Some("ParseNodeDepthK"),
    )
    .unwrap();
    let mut state = state_with_docs(json!([
        {"document": "<p>Level <b>two</b></p>", "source": "https://example.org", "depth": 2}
    ]));

    node.execute(&mut state).await.unwrap();

    let doc = &output(&state)[0];
    let text = doc["document"].as_str().unwrap();
    assert!(text.contains("Level"), "got: {text:?}");
    assert!(text.contains("two"), "got: {text:?}");
    assert_plain_text(text, "document field");
    assert_eq!(doc["depth"], json!(2));
}

#[test]
fn test_execute_blocking_outside_runtime() {
    let node = parse_node(None);
    let mut state = state_with_docs(html_docs(2));

    node.execute_blocking(&mut state).unwrap();

    assert_eq!(output(&state).len(), 2);
}

#[test]
fn test_execute_from_sync_context_with_block_on() {
    let node = parse_node(None);
    let mut state = state_with_docs(html_docs(1));

    tokio_test::block_on(node.execute(&mut state)).unwrap();

    assert_eq!(output(&state).len(), 1);
}

#[test]
fn test_node_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ParseNode>();
    assert_send_sync::<Arc<dyn Node>>();
}
