//! Configuration for a parse node.
//!
//! All node behaviour is controlled through [`NodeConfig`], built either via
//! [`NodeConfigBuilder`] or from the free-form key/value mapping an
//! orchestrator hands to every node ([`NodeConfig::from_map`]). The
//! configuration is fixed when the node is constructed and read-only while
//! it executes.
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `verbose` | bool | `false` |
//! | `content_field` | string | `"content"` |
//! | `concurrency` | integer ≥ 1 | `1` |
//! | `wrap_width` | integer ≥ 20 | `80` |

use crate::converter::ContentConverter;
use crate::error::NodeError;
use crate::progress::ProgressCallback;
use crate::resolver::KeyResolver;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default document field holding the raw HTML.
pub const DEFAULT_CONTENT_FIELD: &str = "content";

/// Narrowest line width accepted for the default converter.
pub const MIN_WRAP_WIDTH: usize = 20;

/// Configuration for a parse node.
///
/// # Example
/// ```rust
/// use pipeline_parse_node::NodeConfig;
///
/// let config = NodeConfig::builder()
///     .verbose(true)
///     .concurrency(4)
///     .content_field("document")
///     .build()
///     .unwrap();
/// assert_eq!(config.content_field, "document");
/// ```
#[derive(Clone)]
pub struct NodeConfig {
    /// Promote per-document diagnostics to `info`. Default: false.
    ///
    /// Never changes the node's output.
    pub verbose: bool,

    /// Document field that holds the HTML to convert. Default: `"content"`.
    pub content_field: String,

    /// Number of documents converted in parallel. Default: 1.
    ///
    /// Output order is the input order whatever this is set to.
    pub concurrency: usize,

    /// Line width used by the default HTML converter. Default: 80.
    pub wrap_width: usize,

    /// Pre-constructed converter. If None, the node uses
    /// [`crate::converter::Html2TextConverter`] with `wrap_width`.
    pub converter: Option<Arc<dyn ContentConverter>>,

    /// Pre-constructed key resolver. If None, the node uses
    /// [`crate::resolver::ExpressionResolver`].
    pub resolver: Option<Arc<dyn KeyResolver>>,

    /// Optional per-document progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            content_field: DEFAULT_CONTENT_FIELD.to_string(),
            concurrency: 1,
            wrap_width: 80,
            converter: None,
            resolver: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("verbose", &self.verbose)
            .field("content_field", &self.content_field)
            .field("concurrency", &self.concurrency)
            .field("wrap_width", &self.wrap_width)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn ContentConverter>"))
            .field("resolver", &self.resolver.as_ref().map(|_| "<dyn KeyResolver>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn NodeProgressCallback>"),
            )
            .finish()
    }
}

impl NodeConfig {
    /// Create a new builder for `NodeConfig`.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from an orchestrator's key/value mapping.
    ///
    /// Recognised keys must carry the documented type and range, otherwise
    /// [`NodeError::InvalidConfig`] is returned. Other keys belong to other
    /// nodes sharing the same mapping and are ignored.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, NodeError> {
        let mut builder = Self::builder();

        for (key, value) in map {
            builder = match key.as_str() {
                "verbose" => builder.verbose(expect_bool(key, value)?),
                "content_field" => builder.content_field(expect_str(key, value)?),
                "concurrency" => {
                    let n = expect_uint(key, value)?;
                    if n == 0 {
                        return Err(NodeError::InvalidConfig(
                            "'concurrency' must be ≥ 1, got 0".into(),
                        ));
                    }
                    builder.concurrency(n)
                }
                "wrap_width" => builder.wrap_width(expect_uint(key, value)?),
                _ => {
                    debug!("Ignoring unrecognised node option '{}'", key);
                    builder
                }
            };
        }

        builder.build()
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, NodeError> {
    value
        .as_bool()
        .ok_or_else(|| type_error(key, "a boolean", value))
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, NodeError> {
    value
        .as_str()
        .ok_or_else(|| type_error(key, "a string", value))
}

fn expect_uint(key: &str, value: &Value) -> Result<usize, NodeError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| type_error(key, "a non-negative integer", value))
}

fn type_error(key: &str, expected: &str, value: &Value) -> NodeError {
    NodeError::InvalidConfig(format!("'{key}' must be {expected}, got {value}"))
}

/// Builder for [`NodeConfig`].
#[derive(Debug)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn verbose(mut self, v: bool) -> Self {
        self.config.verbose = v;
        self
    }

    pub fn content_field(mut self, field: impl Into<String>) -> Self {
        self.config.content_field = field.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn wrap_width(mut self, width: usize) -> Self {
        self.config.wrap_width = width;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn ContentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn KeyResolver>) -> Self {
        self.config.resolver = Some(resolver);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NodeConfig, NodeError> {
        let c = &self.config;
        if c.content_field.trim().is_empty() {
            return Err(NodeError::InvalidConfig(
                "'content_field' must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(NodeError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.wrap_width < MIN_WRAP_WIDTH {
            return Err(NodeError::InvalidConfig(format!(
                "'wrap_width' must be ≥ {MIN_WRAP_WIDTH}, got {}",
                c.wrap_width
            )));
        }
        Ok(self.config)
    }
}
