//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn NodeProgressCallback>`] via
//! [`crate::config::NodeConfigBuilder::progress_callback`] to receive events
//! as the node converts each document of its input collection.
//!
//! # Example
//!
//! ```rust
//! use pipeline_parse_node::{NodeConfig, NodeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl NodeProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, text_len: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("document {}/{} converted ({} bytes)", index + 1, total, text_len);
//!     }
//! }
//!
//! let config = NodeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { converted: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by a node as it processes each document.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the
/// per-document methods are called from blocking worker threads, possibly
/// out of order. All methods default to no-ops.
pub trait NodeProgressCallback: Send + Sync {
    /// Called once after the input collection has been read.
    ///
    /// # Arguments
    /// * `total` — number of documents that will be converted
    fn on_execute_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a document's content has been converted.
    ///
    /// # Arguments
    /// * `index`    — 0-based position in the input collection
    /// * `total`    — number of documents in the collection
    /// * `text_len` — byte length of the produced text
    fn on_document_complete(&self, index: usize, total: usize, text_len: usize) {
        let _ = (index, total, text_len);
    }

    /// Called when a document fails. The batch is aborted afterwards.
    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once when the batch ends, whether or not it succeeded.
    ///
    /// `success_count` is the number of documents published to the output
    /// slot: `total` on success, `0` when the batch failed.
    fn on_execute_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl NodeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NodeConfig`].
pub type ProgressCallback = Arc<dyn NodeProgressCallback>;
