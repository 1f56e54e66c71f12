//! The parse node: converts the HTML content of a document collection to
//! plain text.
//!
//! ## Execution
//!
//! ```text
//! state ──▶ resolve inputs ──▶ read collection ──▶ convert ×N ──▶ write output
//!           (KeyResolver)      (first input slot)  (in parallel)  (one step)
//! ```
//!
//! The collection is read once and the output slot written once. Every
//! converted document is held in a local buffer until the whole batch has
//! succeeded, so a failure on any document leaves the state untouched.

use crate::config::NodeConfig;
use crate::converter::{ContentConverter, Html2TextConverter};
use crate::error::NodeError;
use crate::node::Node;
use crate::progress::ProgressCallback;
use crate::resolver::{ExpressionResolver, InputExpression, KeyResolver};
use crate::state::{Document, State};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Display name used when none is given.
pub const DEFAULT_NODE_NAME: &str = "ParseNodeDepthK";

/// Pipeline node that replaces each document's HTML content with text.
pub struct ParseNode {
    name: String,
    input: String,
    output: Vec<String>,
    config: NodeConfig,
    converter: Arc<dyn ContentConverter>,
    resolver: Arc<dyn KeyResolver>,
}

impl std::fmt::Debug for ParseNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseNode")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("config", &self.config)
            .finish()
    }
}

impl ParseNode {
    /// Build a parse node.
    ///
    /// # Arguments
    /// * `input`     — boolean expression over slot names (e.g. `"docs | html"`)
    /// * `output`    — output slot names; this node writes exactly one
    /// * `config`    — node configuration; `None` for defaults
    /// * `node_name` — display name; `None` for [`DEFAULT_NODE_NAME`]
    ///
    /// # Errors
    /// [`NodeError::InvalidExpression`] when `input` does not parse (only
    /// checked for the default resolver) and [`NodeError::InvalidConfig`]
    /// when `output` does not name exactly one non-empty slot.
    pub fn new(
        input: impl Into<String>,
        output: Vec<String>,
        config: Option<NodeConfig>,
        node_name: Option<&str>,
    ) -> Result<Self, NodeError> {
        let input = input.into();
        let config = config.unwrap_or_default();

        if output.len() != 1 {
            return Err(NodeError::InvalidConfig(format!(
                "parse node writes exactly one output slot, {} declared",
                output.len()
            )));
        }
        if output[0].trim().is_empty() {
            return Err(NodeError::InvalidConfig(
                "output slot name must not be empty".into(),
            ));
        }

        let resolver = match &config.resolver {
            Some(r) => Arc::clone(r),
            None => {
                InputExpression::parse(&input)?;
                Arc::new(ExpressionResolver) as Arc<dyn KeyResolver>
            }
        };
        let converter = match &config.converter {
            Some(c) => Arc::clone(c),
            None => Arc::new(Html2TextConverter::new(config.wrap_width)) as Arc<dyn ContentConverter>,
        };

        Ok(Self {
            name: node_name.unwrap_or(DEFAULT_NODE_NAME).to_string(),
            input,
            output,
            config,
            converter,
            resolver,
        })
    }

    /// Build a parse node from an orchestrator's key/value configuration.
    ///
    /// See [`NodeConfig::from_map`] for the recognised keys.
    pub fn from_map(
        input: impl Into<String>,
        output: Vec<String>,
        config: &Map<String, Value>,
        node_name: Option<&str>,
    ) -> Result<Self, NodeError> {
        Self::new(input, output, Some(NodeConfig::from_map(config)?), node_name)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Convert every document, keeping input order and stopping at the first
    /// failure.
    async fn convert_all(&self, documents: Vec<Document>) -> Result<Vec<Document>, NodeError> {
        let job = Arc::new(Job {
            converter: Arc::clone(&self.converter),
            field: self.config.content_field.clone(),
            total: documents.len(),
            verbose: self.config.verbose,
            progress: self.config.progress_callback.clone(),
        });

        let mut converted: Vec<(usize, Document)> =
            stream::iter(documents.into_iter().enumerate().map(|(index, doc)| {
                let job = Arc::clone(&job);
                async move {
                    tokio::task::spawn_blocking(move || job.convert(index, doc))
                        .await
                        .map_err(|e| {
                            NodeError::Internal(format!("conversion of document {index} did not finish: {e}"))
                        })?
                        .map(|doc| (index, doc))
                }
            }))
            .buffer_unordered(self.config.concurrency)
            .try_collect()
            .await?;

        // Restore input order
        converted.sort_by_key(|(index, _)| *index);
        Ok(converted.into_iter().map(|(_, doc)| doc).collect())
    }
}

#[async_trait]
impl Node for ParseNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_expression(&self) -> &str {
        &self.input
    }

    fn output_slots(&self) -> &[String] {
        &self.output
    }

    async fn execute(&self, state: &mut State) -> Result<(), NodeError> {
        info!("--- Executing {} Node ---", self.name);
        let start = Instant::now();

        // ── Step 1: Resolve input slots ──────────────────────────────────────
        let input_keys = self.resolver.resolve(&self.input, state)?;
        let Some(source) = input_keys.first().cloned() else {
            return Err(NodeError::MissingInputSlot {
                expression: self.input.clone(),
                available: state.keys().map(str::to_string).collect(),
            });
        };
        debug!("{}: input expression '{}' resolved to {:?}", self.name, self.input, input_keys);

        // ── Step 2: Read the collection ──────────────────────────────────────
        let documents = {
            let scoped = state.scoped(&input_keys, &self.output);
            read_documents(scoped.read(&source)?, &source, &self.config.content_field)?
        };
        let total = documents.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_execute_start(total);
        }

        // ── Step 3: Convert ──────────────────────────────────────────────────
        let converted = match self.convert_all(documents).await {
            Ok(converted) => converted,
            Err(e) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_execute_complete(total, 0);
                }
                return Err(e);
            }
        };

        // ── Step 4: Publish ──────────────────────────────────────────────────
        let value = Value::Array(converted.into_iter().map(Document::into_value).collect());
        state
            .scoped(&input_keys, &self.output)
            .write(&self.output[0], value)?;

        if self.config.verbose {
            info!(
                "{}: converted {} documents from '{}' into '{}' in {}ms",
                self.name,
                total,
                source,
                self.output[0],
                start.elapsed().as_millis()
            );
        }
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_execute_complete(total, total);
        }

        Ok(())
    }
}

/// Check the shape of the input collection and take an owned copy of it.
fn read_documents(value: &Value, slot: &str, field: &str) -> Result<Vec<Document>, NodeError> {
    let Value::Array(items) = value else {
        return Err(NodeError::MalformedDocument {
            index: None,
            reason: format!(
                "slot '{slot}' holds {}, expected a sequence of documents",
                json_kind(value)
            ),
            source: None,
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let doc = Document::from_value(item.clone()).ok_or_else(|| {
                NodeError::malformed(index, format!("expected an object, found {}", json_kind(item)))
            })?;
            match doc.get(field) {
                Some(Value::String(_)) => Ok(doc),
                Some(other) => Err(NodeError::malformed(
                    index,
                    format!("field '{field}' holds {}, expected an HTML string", json_kind(other)),
                )),
                None => Err(NodeError::malformed(index, format!("missing field '{field}'"))),
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Everything a worker needs to convert one document.
struct Job {
    converter: Arc<dyn ContentConverter>,
    field: String,
    total: usize,
    verbose: bool,
    progress: Option<ProgressCallback>,
}

impl Job {
    fn convert(&self, index: usize, mut doc: Document) -> Result<Document, NodeError> {
        let html = doc.text(&self.field).unwrap_or_default();

        match self.converter.convert(html) {
            Ok(text) => {
                if self.verbose {
                    info!("Document {}/{}: {} bytes → {} bytes", index + 1, self.total, html.len(), text.len());
                } else {
                    debug!("Document {}/{}: {} bytes → {} bytes", index + 1, self.total, html.len(), text.len());
                }
                if let Some(ref cb) = self.progress {
                    cb.on_document_complete(index, self.total, text.len());
                }
                doc.replace_text(&self.field, text);
                Ok(doc)
            }
            Err(e) => {
                warn!("Document {}/{}: conversion failed: {}", index + 1, self.total, e);
                if let Some(ref cb) = self.progress {
                    cb.on_document_error(index, self.total, &e.to_string());
                }
                Err(NodeError::conversion(index, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::node::NodeKind;
    use serde_json::json;

    fn shouting() -> Arc<dyn ContentConverter> {
        Arc::new(|html: &str| -> Result<String, ConversionError> {
            if html.contains("BAD") {
                Err(ConversionError::RenderFailed {
                    detail: "unsupported markup".into(),
                })
            } else {
                Ok(html.to_uppercase())
            }
        })
    }

    fn node_with(converter: Arc<dyn ContentConverter>) -> ParseNode {
        let config = NodeConfig::builder().converter(converter).build().unwrap();
        ParseNode::new("docs", vec!["parsed".into()], Some(config), None).unwrap()
    }

    #[test]
    fn default_name_and_kind() {
        let node = ParseNode::new("docs", vec!["parsed".into()], None, None).unwrap();
        assert_eq!(node.name(), DEFAULT_NODE_NAME);
        assert_eq!(node.kind(), NodeKind::Node);
        assert_eq!(node.input_expression(), "docs");
        assert_eq!(node.output_slots(), ["parsed".to_string()]);
    }

    #[test]
    fn custom_name() {
        let node = ParseNode::new("docs", vec!["parsed".into()], None, Some("ParseLevel2")).unwrap();
        assert_eq!(node.name(), "ParseLevel2");
    }

    #[test]
    fn construction_validates_outputs_and_expression() {
        assert!(matches!(
            ParseNode::new("docs", vec![], None, None),
            Err(NodeError::InvalidConfig(_))
        ));
        assert!(matches!(
            ParseNode::new("docs", vec!["a".into(), "b".into()], None, None),
            Err(NodeError::InvalidConfig(_))
        ));
        assert!(matches!(
            ParseNode::new("docs", vec![" ".into()], None, None),
            Err(NodeError::InvalidConfig(_))
        ));
        assert!(matches!(
            ParseNode::new("docs &", vec!["parsed".into()], None, None),
            Err(NodeError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn from_map_rejects_bad_option_types() {
        let config = json!({"verbose": "loud"});
        let result = ParseNode::from_map(
            "docs",
            vec!["parsed".into()],
            config.as_object().unwrap(),
            None,
        );
        assert!(matches!(result, Err(NodeError::InvalidConfig(_))));
    }

    #[test]
    fn read_documents_rejects_non_arrays() {
        let err = read_documents(&json!({"content": "x"}), "docs", "content").unwrap_err();
        assert!(matches!(err, NodeError::MalformedDocument { index: None, .. }));
    }

    #[test]
    fn read_documents_reports_first_bad_index() {
        let value = json!([
            {"content": "<p>a</p>"},
            {"content": 7},
            {"title": "no content"},
        ]);
        let err = read_documents(&value, "docs", "content").unwrap_err();
        assert!(matches!(err, NodeError::MalformedDocument { index: Some(1), .. }));
    }

    #[tokio::test]
    async fn converts_with_injected_converter() {
        let node = node_with(shouting());
        let mut state = State::new();
        state.set("docs", json!([{"content": "a", "id": 1}, {"content": "b", "id": 2}]));

        node.execute(&mut state).await.unwrap();

        assert_eq!(
            state.get("parsed"),
            Some(&json!([{"content": "A", "id": 1}, {"content": "B", "id": 2}]))
        );
    }

    #[tokio::test]
    async fn converter_failure_is_malformed_document() {
        let node = node_with(shouting());
        let mut state = State::new();
        state.set("docs", json!([{"content": "ok"}, {"content": "BAD"}]));
        let before = state.clone();

        let err = node.execute(&mut state).await.unwrap_err();

        assert!(matches!(err, NodeError::MalformedDocument { index: Some(1), .. }));
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn input_slot_is_not_modified() {
        let node = node_with(shouting());
        let mut state = State::new();
        state.set("docs", json!([{"content": "a"}]));

        node.execute(&mut state).await.unwrap();

        assert_eq!(state.get("docs"), Some(&json!([{"content": "a"}])));
    }

    #[tokio::test]
    async fn custom_content_field() {
        let config = NodeConfig::builder()
            .content_field("document")
            .converter(shouting())
            .build()
            .unwrap();
        let node = ParseNode::new("docs", vec!["parsed".into()], Some(config), None).unwrap();
        let mut state = State::new();
        state.set("docs", json!([{"document": "x", "content": "untouched"}]));

        node.execute(&mut state).await.unwrap();

        assert_eq!(
            state.get("parsed"),
            Some(&json!([{"document": "X", "content": "untouched"}]))
        );
    }
}
