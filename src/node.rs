//! The contract between a pipeline stage and the orchestrator driving it.

use crate::error::NodeError;
use crate::state::State;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How the orchestrator treats a node when wiring the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Runs and hands control to its single successor.
    #[default]
    Node,
    /// Chooses between successors based on the state it produces.
    ConditionalNode,
}

/// One stage of a pipeline.
///
/// The orchestrator calls [`Node::execute`] once per run with the shared
/// state. On success the node's declared output slots have been written; on
/// error the state is exactly as it was before the call.
#[async_trait]
pub trait Node: Send + Sync {
    /// Display name, used in logs.
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind {
        NodeKind::Node
    }

    /// Boolean expression over slot names selecting this node's inputs.
    fn input_expression(&self) -> &str;

    /// Slots this node writes, in declaration order.
    fn output_slots(&self) -> &[String];

    /// Run the node against `state`.
    async fn execute(&self, state: &mut State) -> Result<(), NodeError>;

    /// Synchronous wrapper around [`Node::execute`].
    ///
    /// Creates a temporary tokio runtime internally, so it must not be
    /// called from inside an async context.
    fn execute_blocking(&self, state: &mut State) -> Result<(), NodeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| NodeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.execute(state))
    }
}
