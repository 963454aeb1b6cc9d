//! Grid-rename planner: derive row/column positions and target names.
//!
//! DESIGN
//! ======
//! Planning is pure: a node slice goes in, an immutable `RenamePlan` comes
//! out. Image node centers are clustered per axis with a tolerance of one
//! unit, the clusters are ranked ascending, and each image is named after
//! its (line, column) cell. Applying the plan is the caller's job.
//!
//! EDGE CASES
//! ==========
//! - Non-file nodes and non-image files never appear in a plan.
//! - A node already carrying its target path is left out, so a second run
//!   with no movement yields an empty plan.
//! - Indices are relative to the current node set; moving one image can
//!   shift every other image's cell.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::canvas::CanvasNode;

/// Extensions (lowercase) treated as images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Centers closer than this share a row or column.
pub const CLUSTER_TOLERANCE: f64 = 1.0;

// =============================================================================
// TYPES
// =============================================================================

/// An image node reduced to what the grid needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedImage {
    pub node_id: String,
    pub file: String,
    pub center_x: f64,
    pub center_y: f64,
}

/// 1-based grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub line: usize,
    pub column: usize,
}

/// One rename the caller should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub node_id: String,
    pub old_path: String,
    pub new_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("file field is missing, empty, or not a string")]
    InvalidFile,
    #[error("node has no string id")]
    NoId,
    #[error("node has no numeric position")]
    NoPosition,
    #[error("file path has no file name")]
    NoFileName,
    #[error("file name has no extension")]
    NoExtension,
}

/// A qualifying node the planner could not name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub node_id: String,
    pub file: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenamePlan {
    /// Number of image nodes considered, including ones already in place.
    pub qualifying: usize,
    pub entries: Vec<PlanEntry>,
    pub skipped: Vec<SkippedNode>,
}

impl RenamePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Whether `path` ends in one of the image extensions, ignoring case.
#[must_use]
pub fn is_image_path(path: &str) -> bool {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

/// Split file nodes into positioned images and nodes that cannot be placed.
///
/// Non-file nodes and files that are not images are dropped silently; a file
/// node whose `file` field is unusable, or an image without a position, is
/// reported as skipped.
#[must_use]
pub fn collect_images(nodes: &[CanvasNode]) -> (Vec<PositionedImage>, Vec<SkippedNode>) {
    let mut images = Vec::new();
    let mut skipped = Vec::new();

    for node in nodes.iter().filter(|n| n.is_file()) {
        let raw_id = || node.id.as_ref().map(value_text).unwrap_or_default();
        let Some(file) = node.file_path().filter(|f| !f.trim().is_empty()) else {
            let raw = node.file.as_ref().map(value_text).unwrap_or_default();
            skipped.push(SkippedNode { node_id: raw_id(), file: raw, reason: SkipReason::InvalidFile });
            continue;
        };
        if !is_image_path(file) {
            continue;
        }
        let Some(node_id) = node.node_id() else {
            skipped.push(SkippedNode { node_id: raw_id(), file: file.to_owned(), reason: SkipReason::NoId });
            continue;
        };
        let Some((center_x, center_y)) = node.center() else {
            skipped.push(SkippedNode { node_id: node_id.to_owned(), file: file.to_owned(), reason: SkipReason::NoPosition });
            continue;
        };
        images.push(PositionedImage { node_id: node_id.to_owned(), file: file.to_owned(), center_x, center_y });
    }

    (images, skipped)
}

/// Strings as-is, anything else as its JSON text.
fn value_text(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_owned)
}

/// Image file nodes with a usable position, in document order.
#[must_use]
pub fn positioned_images(nodes: &[CanvasNode]) -> Vec<PositionedImage> {
    collect_images(nodes).0
}

// =============================================================================
// CLUSTERING
// =============================================================================

/// Sorted cluster representatives for one axis.
///
/// Values are visited in ascending order; a value opens a new cluster unless
/// an existing representative lies within `CLUSTER_TOLERANCE`.
#[must_use]
pub fn cluster_axis(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut reps: Vec<f64> = Vec::new();
    for v in sorted {
        if !reps.iter().any(|r| (r - v).abs() < CLUSTER_TOLERANCE) {
            reps.push(v);
        }
    }
    reps
}

/// 1-based rank of `value` among `reps`, matched with the same tolerance.
#[must_use]
pub fn rank_in(reps: &[f64], value: f64) -> Option<usize> {
    reps.iter()
        .position(|r| (r - value).abs() < CLUSTER_TOLERANCE)
        .map(|i| i + 1)
}

/// Assign a grid cell to every image.
#[must_use]
pub fn assign_cells(images: &[PositionedImage]) -> Vec<(PositionedImage, GridCell)> {
    let xs: Vec<f64> = images.iter().map(|p| p.center_x).collect();
    let ys: Vec<f64> = images.iter().map(|p| p.center_y).collect();
    let columns = cluster_axis(&xs);
    let lines = cluster_axis(&ys);

    images
        .iter()
        .filter_map(|img| {
            // Every value is within tolerance of a representative by construction.
            let column = rank_in(&columns, img.center_x)?;
            let line = rank_in(&lines, img.center_y)?;
            Some((img.clone(), GridCell { line, column }))
        })
        .collect()
}

// =============================================================================
// NAMING
// =============================================================================

/// Directory prefix for files that live next to a document:
/// empty at the vault root, otherwise `"{parent}/"`.
#[must_use]
pub fn directory_prefix(document_path: &str) -> String {
    match document_path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => format!("{parent}/"),
        _ => String::new(),
    }
}

/// Extension of the last path segment, case preserved.
///
/// # Errors
///
/// Returns a `SkipReason` when the path has no file name or no extension.
pub fn file_extension(path: &str) -> Result<&str, SkipReason> {
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(SkipReason::NoFileName);
    }
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Ok(ext),
        _ => Err(SkipReason::NoExtension),
    }
}

#[must_use]
pub fn target_name(prefix: &str, cell: GridCell, extension: &str) -> String {
    format!("{prefix}L{}C{}.{extension}", cell.line, cell.column)
}

// =============================================================================
// PLAN
// =============================================================================

/// Compute the rename plan for a node set.
///
/// `dir_prefix` is the output of [`directory_prefix`] for the document.
#[must_use]
pub fn plan(nodes: &[CanvasNode], prefix: &str, dir_prefix: &str) -> RenamePlan {
    let (images, skipped) = collect_images(nodes);
    for node in &skipped {
        warn!(node_id = %node.node_id, file = %node.file, reason = %node.reason, "skipping file node");
    }
    let mut plan = RenamePlan { qualifying: images.len(), skipped, ..RenamePlan::default() };

    for (img, cell) in assign_cells(&images) {
        let ext = match file_extension(&img.file) {
            Ok(ext) => ext.to_owned(),
            Err(reason) => {
                warn!(node_id = %img.node_id, file = %img.file, %reason, "skipping image node");
                plan.skipped.push(SkippedNode { node_id: img.node_id.clone(), file: img.file.clone(), reason });
                continue;
            }
        };

        let new_path = format!("{dir_prefix}{}", target_name(prefix, cell, &ext));
        if new_path == img.file {
            continue;
        }
        plan.entries.push(PlanEntry { node_id: img.node_id, old_path: img.file, new_path });
    }

    plan
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
