//! Canvas document model.
//!
//! DESIGN
//! ======
//! A canvas is a JSON file with `nodes` and `edges`. Only a handful of node
//! fields matter for renaming; everything else is captured in flattened
//! `extra` maps so a rewrite reproduces fields we do not understand.
//! `serde_json` is built with `preserve_order`, so key order survives too.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::planner::PlanEntry;

/// Node `type` value for nodes that reference a vault file.
pub const FILE_NODE_TYPE: &str = "file";

/// Size assumed for a node that does not carry `width`/`height`.
pub const DEFAULT_NODE_SIZE: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("canvas parse failed: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("canvas serialize failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// One positioned element of the canvas.
///
/// Every field the renamer reads is held as the raw JSON value: a node with
/// a broken `id`, `type`, `file` or coordinate is skipped by the planner
/// instead of failing the whole document, and is written back exactly as
/// read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type", default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub file: Option<Value>,
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub x: Option<Value>,
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub y: Option<Value>,
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(default, deserialize_with = "raw", skip_serializing_if = "Option::is_none")]
    pub height: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A present field stays `Some`, even when it holds `null`.
fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

impl CanvasNode {
    /// The node id, if it is a string.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        self.id.as_ref().and_then(Value::as_str)
    }

    /// The referenced vault path, if `file` holds a string.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file.as_ref().and_then(Value::as_str)
    }

    /// Center point of the node's bounding box; `None` unless `x` and `y`
    /// are numbers. A missing or non-numeric size counts as
    /// [`DEFAULT_NODE_SIZE`].
    #[must_use]
    pub fn center(&self) -> Option<(f64, f64)> {
        let x = number(self.x.as_ref())?;
        let y = number(self.y.as_ref())?;
        let width = number(self.width.as_ref()).unwrap_or(DEFAULT_NODE_SIZE);
        let height = number(self.height.as_ref()).unwrap_or(DEFAULT_NODE_SIZE);
        Some((x + width / 2.0, y + height / 2.0))
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind.as_ref().and_then(Value::as_str) == Some(FILE_NODE_TYPE)
    }
}

/// A whole canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasDocument {
    /// Parse canvas JSON text.
    ///
    /// # Errors
    ///
    /// Returns `CanvasError::Parse` if the text is not a canvas document.
    pub fn parse(text: &str) -> Result<Self, CanvasError> {
        serde_json::from_str(text).map_err(CanvasError::Parse)
    }

    /// Serialize back to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns `CanvasError::Serialize` if a preserved value cannot be encoded.
    pub fn to_json(&self) -> Result<String, CanvasError> {
        serde_json::to_string(self).map_err(CanvasError::Serialize)
    }

    /// Build a new snapshot with the `file` field of each renamed node
    /// replaced by its new path. Nodes are matched by id.
    #[must_use]
    pub fn with_renamed(&self, renamed: &[PlanEntry]) -> Self {
        let mut next = self.clone();
        for node in &mut next.nodes {
            let Some(entry) = renamed.iter().find(|e| node.node_id() == Some(e.node_id.as_str())) else {
                continue;
            };
            // EDGE: only rewrite if the node still points at the old path.
            if node.file_path() == Some(entry.old_path.as_str()) {
                node.file = Some(Value::String(entry.new_path.clone()));
            }
        }
        next
    }

    /// Find a node by id that still references `path`.
    #[must_use]
    pub fn node_referencing(&self, node_id: &str, path: &str) -> Option<&CanvasNode> {
        self.nodes
            .iter()
            .find(|n| n.node_id() == Some(node_id) && n.file_path() == Some(path))
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
