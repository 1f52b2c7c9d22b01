//! # navgraph core
//!
//! Authoring engine for pedestrian navigation graphs: spatial deduplication
//! of entered points, world ↔ floor-plan pixel transforms, and the
//! pick-point protocol that lets a viewer supply coordinates by click.
//!
//! ## Example
//!
//! ```rust
//! use navgraph_core::{
//!     AuthoringContext, DedupSettings, EdgeAttrs, Graph, Placement, ScriptedOperator, WorldPoint,
//! };
//!
//! let mut graph = Graph::new(DedupSettings::default());
//! let mut operator = ScriptedOperator::new(["Main gate", "Library steps"]);
//! let ctx = AuthoringContext::Global;
//!
//! let Placement::Node(mut gate) = graph.create_node(WorldPoint::new(-80.54, 43.47), &ctx, &mut operator)? else {
//!     unreachable!()
//! };
//! let Placement::Node(mut steps) = graph.create_node(WorldPoint::new(-80.541, 43.471), &ctx, &mut operator)? else {
//!     unreachable!()
//! };
//!
//! let attrs = EdgeAttrs { kind: "sidewalk".into(), accessible: true, indoors: false };
//! let edge = graph.create_edge(&mut gate, &mut steps, attrs)?;
//! assert_eq!(graph.node(gate.id()).unwrap().edge_ids, vec![edge]);
//! # Ok::<(), navgraph_core::GraphError>(())
//! ```

pub mod dedup;
pub mod error;
pub mod graph;
pub mod model;
pub mod operator;
pub mod pick;
pub mod session;
pub mod transform;

pub use dedup::{DedupSettings, MergeDecision};
pub use error::{GraphError, PickError};
pub use graph::{Graph, IdAllocator, NodeHandle, Placement};
pub use model::{Building, Catalog, Edge, EdgeId, Node, NodeId, OUTDOOR};
pub use operator::{LineOperator, Operator, ScriptedOperator};
pub use pick::{PickChannel, PickLink, Snapshot, StreamLink};
pub use session::{AuthoringContext, EdgeAttrs, EdgeDefaults, SessionContext};
pub use transform::{CoordinateMode, FloorCalibration, PixelPoint, WorldPoint};
