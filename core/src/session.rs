//! Session-scoped authoring state
//!
//! Everything that used to live in module globals (current building and
//! floor, last edge attributes) is carried in a [`SessionContext`] that the
//! command loop hands to each operation.

use crate::error::GraphError;
use crate::model::{Building, Node, NodeId, OUTDOOR};
use crate::operator::{parse_yes_no, Operator};
use crate::transform::{CoordinateMode, FloorCalibration};

/// Where new nodes are being placed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthoringContext {
    /// Outdoor, geographic coordinates.
    #[default]
    Global,
    /// Building-local meters on one floor.
    Building {
        building_id: NodeId,
        name: String,
        floor: i32,
        /// Absent when the catalog has no floor plan for this floor.
        calibration: Option<FloorCalibration>,
    },
}

impl AuthoringContext {
    /// Context for one floor of `building`, with its calibration if any.
    pub fn for_floor(building: &Building, floor: i32) -> Self {
        AuthoringContext::Building {
            building_id: building.node_id,
            name: building.name.clone(),
            floor,
            calibration: building.calibration(floor).copied(),
        }
    }

    /// Coordinate convention of this context.
    pub fn mode(&self) -> CoordinateMode {
        match self {
            AuthoringContext::Global => CoordinateMode::Global,
            AuthoringContext::Building { .. } => CoordinateMode::Local,
        }
    }

    /// Building id stamped on new nodes.
    pub fn building_id(&self) -> NodeId {
        match self {
            AuthoringContext::Global => OUTDOOR,
            AuthoringContext::Building { building_id, .. } => *building_id,
        }
    }

    /// Floor stamped on new nodes.
    pub fn floor(&self) -> Option<i32> {
        match self {
            AuthoringContext::Global => None,
            AuthoringContext::Building { floor, .. } => Some(*floor),
        }
    }

    /// Floor plan calibration, when clicking is possible.
    pub fn calibration(&self) -> Option<&FloorCalibration> {
        match self {
            AuthoringContext::Global => None,
            AuthoringContext::Building { calibration, .. } => calibration.as_ref(),
        }
    }

    /// Whether `node` was authored in this context and is a merge candidate.
    pub fn contains(&self, node: &Node) -> bool {
        match self {
            AuthoringContext::Global => node.building_id == OUTDOOR,
            AuthoringContext::Building {
                building_id, floor, ..
            } => node.building_id == *building_id && node.floor == Some(*floor),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AuthoringContext::Global => "outdoors".to_string(),
            AuthoringContext::Building { name, floor, .. } => format!("{} floor {}", name, floor),
        }
    }
}

/// Attributes of an edge about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeAttrs {
    pub kind: String,
    pub accessible: bool,
    pub indoors: bool,
}

/// Most recently used edge attributes, offered as defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDefaults {
    pub kind: Option<String>,
    pub accessible: bool,
    pub indoors: bool,
}

impl Default for EdgeDefaults {
    fn default() -> Self {
        Self {
            kind: None,
            accessible: true,
            indoors: false,
        }
    }
}

impl EdgeDefaults {
    /// Prompt for the next edge's attributes; empty answers reuse the last values.
    pub fn prompt<O: Operator + ?Sized>(&mut self, operator: &mut O) -> Result<EdgeAttrs, GraphError> {
        let kind = loop {
            let answer = operator.ask("Enter the edge type: ")?;
            if !answer.is_empty() {
                break answer;
            }
            if let Some(last) = &self.kind {
                break last.clone();
            }
        };

        let accessible = ask_flag(operator, "Is the path accessible? ", self.accessible)?;
        let indoors = ask_flag(operator, "Is the path indoors? ", self.indoors)?;

        self.kind = Some(kind.clone());
        self.accessible = accessible;
        self.indoors = indoors;

        Ok(EdgeAttrs {
            kind,
            accessible,
            indoors,
        })
    }
}

/// Empty keeps `default`; anything but an affirmative reads as no.
fn ask_flag<O: Operator + ?Sized>(operator: &mut O, prompt: &str, default: bool) -> Result<bool, GraphError> {
    let answer = operator.ask(prompt)?;
    if answer.is_empty() {
        return Ok(default);
    }
    Ok(parse_yes_no(&answer).unwrap_or(false))
}

/// Explicit session state threaded through every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub area: AuthoringContext,
    pub edges: EdgeDefaults,
}
