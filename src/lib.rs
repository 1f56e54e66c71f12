//! # pipeline-parse-node
//!
//! A pipeline stage that turns the raw HTML of a document collection into
//! plain text/markdown and publishes the result in shared pipeline state.
//!
//! ## Execution Overview
//!
//! ```text
//! State { "docs": [ {content: "<html>…", source: …}, … ] }
//!  │
//!  ├─ 1. Resolve  evaluate the input expression against the state's keys
//!  ├─ 2. Read     take the collection from the first resolved slot
//!  ├─ 3. Convert  html2text per document (parallel, order-preserving)
//!  ├─ 4. Clean    whitespace/Unicode normalisation
//!  └─ 5. Publish  write the whole collection to the output slot in one step
//!  │
//! State { "docs": […], "parsed_doc": [ {content: "Plain text…", source: …}, … ] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeline_parse_node::{Node, NodeConfig, ParseNode, State};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let node = ParseNode::new(
//!         "docs",
//!         vec!["parsed_doc".to_string()],
//!         Some(NodeConfig::builder().verbose(true).build()?),
//!         None,
//!     )?;
//!
//!     let mut state = State::new();
//!     state.set("docs", json!([
//!         {"content": "<p>Read the <a href=\"https://example.org\">docs</a></p>", "source": "https://example.org"}
//!     ]));
//!
//!     node.execute(&mut state).await?;
//!     println!("{}", state.get("parsed_doc").unwrap());
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Semantics
//!
//! A batch either converts completely or not at all. If the input slot is
//! missing, a document is malformed, or the converter rejects one document,
//! `execute` returns an error and the state is left exactly as it was.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod error;
pub mod node;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{NodeConfig, NodeConfigBuilder};
pub use converter::{ContentConverter, Html2TextConverter};
pub use error::{ConversionError, NodeError};
pub use node::{Node, NodeKind};
pub use parse::{ParseNode, DEFAULT_NODE_NAME};
pub use progress::{NodeProgressCallback, NoopProgressCallback, ProgressCallback};
pub use resolver::{ExpressionResolver, InputExpression, KeyResolver};
pub use state::{Document, ScopedState, State};
