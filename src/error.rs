//! Error types for the parse node.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`NodeError`] — **Fatal** for the stage: the node cannot be built or
//!   its execution cannot complete (missing input slot, bad document, bad
//!   configuration). Returned as `Err(NodeError)` from construction and from
//!   [`crate::node::Node::execute`]. When execution fails the state store is
//!   left exactly as it was.
//!
//! * [`ConversionError`] — **Leaf**: a single HTML payload could not be
//!   rendered. Produced by [`crate::converter::ContentConverter`]
//!   implementations and carried as the `source` of
//!   [`NodeError::MalformedDocument`], so callers see which document failed
//!   and why.

use thiserror::Error;

/// All fatal errors returned by a pipeline node.
#[derive(Debug, Error)]
pub enum NodeError {
    // ── State errors ──────────────────────────────────────────────────────
    /// The input expression could not be satisfied by the keys in the state.
    #[error(
        "No state keys matched the expression '{expression}'.\nState contains keys: [{}]",
        .available.join(", ")
    )]
    MissingInputSlot {
        expression: String,
        available: Vec<String>,
    },

    /// A stage tried to read or write a slot it did not declare.
    #[error("Slot '{slot}' is not declared by this node")]
    UndeclaredSlot { slot: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// A document (or the collection holding it) has the wrong shape, or its
    /// content could not be converted.
    ///
    /// `index` is the 0-based position in the input collection; `None` when
    /// the collection itself is malformed.
    #[error("Malformed document{}: {reason}", .index.map(|i| format!(" at index {i}")).unwrap_or_default())]
    MalformedDocument {
        index: Option<usize>,
        reason: String,
        #[source]
        source: Option<ConversionError>,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The input expression is syntactically invalid.
    #[error("Invalid input expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// Builder or key/value validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A worker task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NodeError {
    /// Wrap a converter failure for the document at `index`.
    pub fn conversion(index: usize, source: ConversionError) -> Self {
        NodeError::MalformedDocument {
            index: Some(index),
            reason: format!("content could not be converted: {source}"),
            source: Some(source),
        }
    }

    /// A document at `index` whose shape is wrong before conversion starts.
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        NodeError::MalformedDocument {
            index: Some(index),
            reason: reason.into(),
            source: None,
        }
    }
}

/// A failure to convert one HTML payload to text.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// The renderer rejected the markup or its configuration.
    #[error("HTML rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// The configured line width is too narrow to lay out the content.
    #[error("Line width {width} is too narrow to render this content")]
    TooNarrow { width: usize },
}
