//! Spatial deduplication of newly entered points
//!
//! Operators re-enter the same intersection or doorway many times while
//! walking paths. Before a point becomes a new node we look for the nearest
//! existing node and, if it is within the merge radius, ask whether they are
//! the same place.

use tracing::debug;

use crate::error::GraphError;
use crate::model::Node;
use crate::operator::Operator;
use crate::transform::{CoordinateMode, WorldPoint};

/// Merge radii per coordinate mode, in native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupSettings {
    pub global_epsilon: f64,
    pub local_epsilon: f64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            global_epsilon: CoordinateMode::Global.default_epsilon(),
            local_epsilon: CoordinateMode::Local.default_epsilon(),
        }
    }
}

impl DedupSettings {
    /// Merge radius for `mode`, in that mode's units.
    pub fn epsilon(&self, mode: CoordinateMode) -> f64 {
        match mode {
            CoordinateMode::Global => self.global_epsilon,
            CoordinateMode::Local => self.local_epsilon,
        }
    }

    /// Squared merge radius in scaled units.
    pub fn threshold(&self, mode: CoordinateMode) -> f64 {
        let eps = self.epsilon(mode) * mode.scale();
        eps * eps
    }
}

/// Squared distance after scaling both points by the mode's factor.
pub fn scaled_distance_squared(a: WorldPoint, b: WorldPoint, mode: CoordinateMode) -> f64 {
    let s = mode.scale();
    let dx = a.x * s - b.x * s;
    let dy = a.y * s - b.y * s;
    dx * dx + dy * dy
}

/// The node closest to `candidate` with its scaled squared distance.
///
/// Ties keep the first node in iteration order.
pub fn nearest<'a, I>(candidate: WorldPoint, nodes: I, mode: CoordinateMode) -> Option<(&'a Node, f64)>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut closest: Option<(&'a Node, f64)> = None;
    for node in nodes {
        let d2 = scaled_distance_squared(candidate, node.position(), mode);
        match closest {
            Some((_, best)) if d2 >= best => {}
            _ => closest = Some((node, d2)),
        }
    }
    closest
}

/// The nearest node if it lies strictly inside the merge radius.
pub fn find_duplicate<'a, I>(
    candidate: WorldPoint,
    nodes: I,
    mode: CoordinateMode,
    settings: &DedupSettings,
) -> Option<&'a Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    let (node, d2) = nearest(candidate, nodes, mode)?;
    let threshold = settings.threshold(mode);
    debug!(node = node.id, d2, threshold, "nearest existing node");
    (d2 < threshold).then_some(node)
}

/// What the operator decided about a near match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Reuse the existing node.
    Merge,
    /// Keep the candidate as a new node.
    KeepNew,
    /// Discard the candidate and enter the coordinates again.
    Reenter,
}

/// Ask whether `candidate` should merge into `existing`. Unrecognized answers re-prompt.
pub fn confirm_merge<O: Operator + ?Sized>(
    operator: &mut O,
    existing: &Node,
) -> Result<MergeDecision, GraphError> {
    let label = if existing.name.is_empty() {
        format!("#{}", existing.id)
    } else {
        existing.name.clone()
    };
    let prompt = format!(
        "Merge with node {} at {:.4}? [yes/no/retry] ",
        label,
        existing.position()
    );

    loop {
        let answer = operator.ask(&prompt)?;
        match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(MergeDecision::Merge),
            "n" | "no" => return Ok(MergeDecision::KeepNew),
            "r" | "retry" => return Ok(MergeDecision::Reenter),
            _ => continue,
        }
    }
}
