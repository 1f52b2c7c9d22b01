//! Persisted record types: nodes, edges and the building catalog.
//!
//! Field names follow the JSON records consumed by the navigation app, so
//! these structs are the on-disk format as well as the in-memory model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GraphError;
use crate::transform::{FloorCalibration, WorldPoint};

/// Node identifier; also the id of a building's anchor node.
pub type NodeId = i64;
pub type EdgeId = i64;

/// Building id carried by outdoor nodes.
pub const OUTDOOR: NodeId = -1;

/// A location in the navigation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Display name. A leading `~` marks a waypoint that is not a routing destination.
    pub name: String,
    /// Longitude outdoors, meters east of the floor origin indoors.
    pub x: f64,
    /// Latitude outdoors, meters south of the floor origin indoors.
    pub y: f64,
    pub building_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(default)]
    pub edge_ids: Vec<EdgeId>,
}

impl Node {
    /// The node's position as a point.
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// True for nodes on the outdoor map.
    pub fn is_outdoor(&self) -> bool {
        self.building_id == OUTDOOR
    }

    /// Waypoints are drawn smaller and never offered as destinations.
    pub fn is_waypoint(&self) -> bool {
        self.name.starts_with('~')
    }
}

/// A walkable path between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    /// Lower node for staircases.
    pub start_node_id: NodeId,
    /// Upper node for staircases.
    pub end_node_id: NodeId,
    pub length: f64,
    /// Path kind such as "stairs" or "sidewalk".
    #[serde(rename = "type")]
    pub kind: String,
    pub accessible: bool,
    pub indoors: bool,
}

impl Edge {
    /// Whether `node` is one of this edge's endpoints.
    pub fn touches(&self, node: NodeId) -> bool {
        self.start_node_id == node || self.end_node_id == node
    }
}

/// Read-only building reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub name: String,
    /// Id of the anchor node representing the building on the outdoor map.
    pub node_id: NodeId,
    #[serde(default)]
    pub floors: BTreeMap<i32, FloorCalibration>,
}

impl Building {
    /// Calibration of one floor, if it has a floor plan.
    pub fn calibration(&self, floor: i32) -> Option<&FloorCalibration> {
        self.floors.get(&floor)
    }
}

/// The loaded building catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    buildings: Vec<Building>,
}

impl Catalog {
    /// Build a catalog, rejecting floor calibrations that cannot drive a pixel transform.
    pub fn new(buildings: Vec<Building>) -> Result<Self, GraphError> {
        for building in &buildings {
            for (floor, calibration) in &building.floors {
                calibration
                    .validate()
                    .map_err(|reason| GraphError::InvalidCalibration {
                        building: building.name.clone(),
                        floor: *floor,
                        reason,
                    })?;
            }
        }
        Ok(Self { buildings })
    }

    /// Case-insensitive lookup by building name.
    pub fn find(&self, name: &str) -> Option<&Building> {
        let name = name.trim();
        self.buildings
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    /// All buildings in file order.
    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// True when no buildings were loaded.
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_field_names() {
        let node = Node {
            id: 4,
            name: "Library".into(),
            x: -80.5,
            y: 43.4,
            building_id: OUTDOOR,
            floor: None,
            edge_ids: vec![1, 2],
        };

        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            json,
            r#"{"id":4,"name":"Library","x":-80.5,"y":43.4,"buildingId":-1,"edgeIds":[1,2]}"#
        );
    }

    #[test]
    fn test_edge_type_field() {
        let edge: Edge = serde_json::from_str(
            r#"{"id":1,"startNodeId":2,"endNodeId":3,"length":1.5,"type":"stairs","accessible":false,"indoors":true}"#,
        )
        .unwrap();

        assert_eq!(edge.kind, "stairs");
        assert!(edge.touches(3));
        assert!(!edge.touches(1));
    }

    #[test]
    fn test_building_floor_keys() {
        let building: Building = serde_json::from_str(
            r#"{"name":"Hall","nodeId":7,"floors":{"2":{"metersPerPixel":0.1,"originPixelX":10,"originPixelY":20}}}"#,
        )
        .unwrap();

        let cal = building.calibration(2).unwrap();
        assert_eq!(cal.origin_pixel_x, 10);
        assert!(building.calibration(1).is_none());
    }

    #[test]
    fn test_catalog_find_ignores_case() {
        let catalog = Catalog::new(vec![Building {
            name: "Science Hall".into(),
            node_id: 12,
            floors: BTreeMap::new(),
        }])
        .unwrap();

        assert_eq!(catalog.find("science hall").map(|b| b.node_id), Some(12));
        assert!(catalog.find("Gym").is_none());
    }

    #[test]
    fn test_catalog_rejects_zero_scale() {
        let mut floors = BTreeMap::new();
        floors.insert(
            1,
            FloorCalibration {
                meters_per_pixel: 0.0,
                origin_pixel_x: 0,
                origin_pixel_y: 0,
            },
        );

        let result = Catalog::new(vec![Building {
            name: "Hall".into(),
            node_id: 1,
            floors,
        }]);
        assert!(matches!(
            result,
            Err(GraphError::InvalidCalibration { floor: 1, .. })
        ));
    }
}
