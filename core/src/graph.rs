//! Graph model: node/edge collections, id allocation, adjacency bookkeeping

use std::collections::HashMap;
use tracing::{debug, info};

use crate::dedup::{confirm_merge, find_duplicate, DedupSettings, MergeDecision};
use crate::error::GraphError;
use crate::model::{Edge, EdgeId, Node, NodeId};
use crate::operator::{ask_non_empty, Operator};
use crate::session::{AuthoringContext, EdgeAttrs};
use crate::transform::WorldPoint;

/// Monotonic id counter seeded past every id already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    /// Start past the largest of `ids`, or at 0.
    pub fn seeded<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        let next = ids.into_iter().max().map_or(0, |max| max + 1).max(0);
        Self { next }
    }

    /// The id the next allocation will return.
    pub fn peek(&self) -> i64 {
        self.next
    }

    fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A node returned by [`Graph::create_node`].
///
/// Edges can only be built from handles, so an edge endpoint always refers
/// to a node the graph has seen. A freshly created node stays staged in its
/// handle until its first edge admits it into the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHandle {
    id: NodeId,
    staged: Option<Node>,
}

impl NodeHandle {
    fn member(id: NodeId) -> Self {
        Self { id, staged: None }
    }

    /// Id of the node, staged or admitted.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True until the node has been admitted into the graph.
    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }
}

/// Outcome of placing a point.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// A new or merged node.
    Node(NodeHandle),
    /// The operator asked to type the coordinates again.
    Reenter,
}

/// In-memory navigation graph for one authoring session.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<NodeId, usize>,
    edge_index: HashMap<EdgeId, usize>,
    node_ids: IdAllocator,
    edge_ids: IdAllocator,
    dedup: DedupSettings,
}

impl Graph {
    /// Empty graph.
    pub fn new(dedup: DedupSettings) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            node_ids: IdAllocator::seeded(None),
            edge_ids: IdAllocator::seeded(None),
            dedup,
        }
    }

    /// Rebuild a graph from persisted records, refusing anything inconsistent.
    ///
    /// Duplicate ids, edges naming unknown nodes, and `edgeIds` lists that
    /// disagree with the edge set are all fatal.
    pub fn from_records(nodes: Vec<Node>, edges: Vec<Edge>, dedup: DedupSettings) -> Result<Self, GraphError> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id, i).is_some() {
                return Err(GraphError::duplicate_node(node.id));
            }
        }

        let mut edge_index = HashMap::with_capacity(edges.len());
        let mut incident: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            if edge_index.insert(edge.id, i).is_some() {
                return Err(GraphError::duplicate_edge(edge.id));
            }
            for endpoint in [edge.start_node_id, edge.end_node_id] {
                if !node_index.contains_key(&endpoint) {
                    return Err(GraphError::Inconsistent(format!(
                        "edge {} references missing node {}",
                        edge.id, endpoint
                    )));
                }
                incident.entry(endpoint).or_default().push(edge.id);
            }
        }

        for node in &nodes {
            let mut listed = node.edge_ids.clone();
            listed.sort_unstable();
            let mut actual = incident.remove(&node.id).unwrap_or_default();
            actual.sort_unstable();
            if listed != actual {
                return Err(GraphError::Inconsistent(format!(
                    "node {} lists edges {:?} but is an endpoint of {:?}",
                    node.id, listed, actual
                )));
            }
        }

        let node_ids = IdAllocator::seeded(nodes.iter().map(|n| n.id));
        let edge_ids = IdAllocator::seeded(edges.iter().map(|e| e.id));
        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            next_node = node_ids.peek(),
            next_edge = edge_ids.peek(),
            "graph loaded"
        );

        Ok(Self {
            nodes,
            edges,
            node_index,
            edge_index,
            node_ids,
            edge_ids,
            dedup,
        })
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up an admitted node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Look up an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&id).map(|&i| &self.edges[i])
    }

    /// Whether `id` has been admitted.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Id the next new node will get.
    pub fn next_node_id(&self) -> NodeId {
        self.node_ids.peek()
    }

    /// Id the next new edge will get.
    pub fn next_edge_id(&self) -> EdgeId {
        self.edge_ids.peek()
    }

    pub fn dedup_settings(&self) -> &DedupSettings {
        &self.dedup
    }

    /// The node behind a handle, staged or admitted.
    pub fn resolve<'a>(&'a self, handle: &'a NodeHandle) -> Result<&'a Node, GraphError> {
        match &handle.staged {
            Some(node) => Ok(node),
            None => self.node(handle.id).ok_or(GraphError::UnknownNode(handle.id)),
        }
    }

    /// Turn an entered position into a node, merging with a nearby node if the operator agrees.
    ///
    /// Only nodes in the same context are merge candidates. A new node gets
    /// the next id, the context's building and floor, and a name from the operator.
    pub fn create_node<O: Operator + ?Sized>(
        &mut self,
        position: WorldPoint,
        context: &AuthoringContext,
        operator: &mut O,
    ) -> Result<Placement, GraphError> {
        let candidates = self.nodes.iter().filter(|n| context.contains(n));
        if let Some(existing) = find_duplicate(position, candidates, context.mode(), &self.dedup) {
            match confirm_merge(operator, existing)? {
                MergeDecision::Merge => {
                    info!(node = existing.id, "merged into existing node");
                    return Ok(Placement::Node(NodeHandle::member(existing.id)));
                }
                MergeDecision::Reenter => return Ok(Placement::Reenter),
                MergeDecision::KeepNew => {}
            }
        }

        let id = self.node_ids.allocate();
        let name = ask_non_empty(operator, "Enter the node's name: ")?;
        debug!(node = id, %name, "created node");

        Ok(Placement::Node(NodeHandle {
            id,
            staged: Some(Node {
                id,
                name,
                x: position.x,
                y: position.y,
                building_id: context.building_id(),
                floor: context.floor(),
                edge_ids: Vec::new(),
            }),
        }))
    }

    /// Link two nodes. Staged endpoints are admitted; both adjacency lists get the new edge id.
    pub fn create_edge(
        &mut self,
        start: &mut NodeHandle,
        end: &mut NodeHandle,
        attrs: EdgeAttrs,
    ) -> Result<EdgeId, GraphError> {
        if start.id == end.id {
            return Err(GraphError::SelfLoop(start.id));
        }
        let length = self
            .resolve(start)?
            .position()
            .distance(self.resolve(end)?.position());

        self.admit(start);
        self.admit(end);

        let id = self.edge_ids.allocate();
        for endpoint in [start.id, end.id] {
            let i = self.node_index[&endpoint];
            self.nodes[i].edge_ids.push(id);
        }

        self.edge_index.insert(id, self.edges.len());
        self.edges.push(Edge {
            id,
            start_node_id: start.id,
            end_node_id: end.id,
            length,
            kind: attrs.kind,
            accessible: attrs.accessible,
            indoors: attrs.indoors,
        });
        info!(edge = id, start = start.id, end = end.id, length, "created edge");

        Ok(id)
    }

    fn admit(&mut self, handle: &mut NodeHandle) {
        if let Some(node) = handle.staged.take() {
            if !self.node_index.contains_key(&node.id) {
                self.node_index.insert(node.id, self.nodes.len());
                self.nodes.push(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OUTDOOR;
    use crate::operator::ScriptedOperator;

    fn outdoor(id: NodeId, x: f64, y: f64, edge_ids: Vec<EdgeId>) -> Node {
        Node {
            id,
            name: format!("n{}", id),
            x,
            y,
            building_id: OUTDOOR,
            floor: None,
            edge_ids,
        }
    }

    fn edge(id: EdgeId, start: NodeId, end: NodeId) -> Edge {
        Edge {
            id,
            start_node_id: start,
            end_node_id: end,
            length: 1.0,
            kind: "sidewalk".into(),
            accessible: true,
            indoors: false,
        }
    }

    fn attrs() -> EdgeAttrs {
        EdgeAttrs {
            kind: "sidewalk".into(),
            accessible: true,
            indoors: false,
        }
    }

    fn place(graph: &mut Graph, at: WorldPoint, op: &mut ScriptedOperator) -> NodeHandle {
        match graph.create_node(at, &AuthoringContext::Global, op).unwrap() {
            Placement::Node(h) => h,
            Placement::Reenter => panic!("unexpected reenter"),
        }
    }

    #[test]
    fn test_empty_graph_creates_seed_node_without_prompt() {
        let mut graph = Graph::new(DedupSettings::default());
        let mut op = ScriptedOperator::new(["Quad"]);

        let handle = place(&mut graph, WorldPoint::new(34.0, 12.0), &mut op);

        assert_eq!(handle.id(), 0);
        assert!(handle.is_staged());
        assert!(!op.was_asked("Merge"));
        assert_eq!(graph.next_node_id(), 1);
        assert_eq!(graph.resolve(&handle).unwrap().name, "Quad");
    }

    #[test]
    fn test_near_point_prompts_and_merges() {
        let mut graph = Graph::from_records(
            vec![outdoor(5, 12.0, 34.0, vec![])],
            vec![],
            DedupSettings::default(),
        )
        .unwrap();
        let mut op = ScriptedOperator::new(["yes"]);

        let handle = place(&mut graph, WorldPoint::new(12.0, 34.000_05), &mut op);

        assert!(op.was_asked("Merge with node n5"));
        assert_eq!(handle.id(), 5);
        assert!(!handle.is_staged());
        assert_eq!(graph.next_node_id(), 6);
    }

    #[test]
    fn test_declined_merge_creates_new_node() {
        let mut graph = Graph::from_records(
            vec![outdoor(5, 12.0, 34.0, vec![])],
            vec![],
            DedupSettings::default(),
        )
        .unwrap();
        let mut op = ScriptedOperator::new(["no", "Gate"]);

        let handle = place(&mut graph, WorldPoint::new(12.0, 34.000_05), &mut op);

        assert_eq!(handle.id(), 6);
        assert_eq!(graph.next_node_id(), 7);
    }

    #[test]
    fn test_retry_consumes_no_id() {
        let mut graph = Graph::from_records(
            vec![outdoor(5, 12.0, 34.0, vec![])],
            vec![],
            DedupSettings::default(),
        )
        .unwrap();
        let mut op = ScriptedOperator::new(["retry"]);

        let placed = graph
            .create_node(WorldPoint::new(12.0, 34.0), &AuthoringContext::Global, &mut op)
            .unwrap();

        assert_eq!(placed, Placement::Reenter);
        assert_eq!(graph.next_node_id(), 6);
    }

    #[test]
    fn test_far_points_always_get_fresh_ids() {
        let mut graph = Graph::from_records(
            vec![outdoor(0, 0.0, 0.0, vec![])],
            vec![],
            DedupSettings::default(),
        )
        .unwrap();
        let mut seen = vec![0];

        for i in 1..6 {
            let mut op = ScriptedOperator::new([format!("p{}", i)]);
            let mut start = place(&mut graph, WorldPoint::new(i as f64 * 0.001, 0.0), &mut op);
            let mut anchor = NodeHandle::member(0);
            graph.create_edge(&mut anchor, &mut start, attrs()).unwrap();

            assert!(!op.was_asked("Merge"));
            assert!(!seen.contains(&start.id()));
            seen.push(start.id());
        }
        assert_eq!(graph.nodes().len(), 6);
    }

    #[test]
    fn test_other_context_is_not_a_merge_candidate() {
        let mut indoor = outdoor(5, 12.0, 34.0, vec![]);
        indoor.building_id = 40;
        indoor.floor = Some(1);
        let mut graph = Graph::from_records(vec![indoor], vec![], DedupSettings::default()).unwrap();
        let mut op = ScriptedOperator::new(["Gate"]);

        let handle = place(&mut graph, WorldPoint::new(12.0, 34.0), &mut op);

        assert!(!op.was_asked("Merge"));
        assert_eq!(handle.id(), 6);
    }

    #[test]
    fn test_create_edge_links_both_ends_once() {
        let mut graph = Graph::new(DedupSettings::default());
        let mut op = ScriptedOperator::new(["A", "B"]);

        let mut a = place(&mut graph, WorldPoint::new(0.0, 0.0), &mut op);
        let mut b = place(&mut graph, WorldPoint::new(0.003, 0.004), &mut op);
        let id = graph.create_edge(&mut a, &mut b, attrs()).unwrap();

        let e = graph.edge(id).unwrap();
        assert!((e.length - 0.005).abs() < 1e-12);
        assert_eq!(graph.node(a.id()).unwrap().edge_ids, vec![id]);
        assert_eq!(graph.node(b.id()).unwrap().edge_ids, vec![id]);
        assert!(!a.is_staged() && !b.is_staged());
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.next_edge_id(), id + 1);
    }

    #[test]
    fn test_fan_out_admits_start_once() {
        let mut graph = Graph::new(DedupSettings::default());
        let mut op = ScriptedOperator::new(["Hub", "E", "W"]);

        let mut hub = place(&mut graph, WorldPoint::new(0.0, 0.0), &mut op);
        let mut east = place(&mut graph, WorldPoint::new(0.01, 0.0), &mut op);
        let first = graph.create_edge(&mut hub, &mut east, attrs()).unwrap();
        let mut west = place(&mut graph, WorldPoint::new(-0.01, 0.0), &mut op);
        let second = graph.create_edge(&mut hub, &mut west, attrs()).unwrap();

        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.node(hub.id()).unwrap().edge_ids, vec![first, second]);
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = Graph::from_records(
            vec![outdoor(1, 0.0, 0.0, vec![])],
            vec![],
            DedupSettings::default(),
        )
        .unwrap();
        let mut a = NodeHandle::member(1);
        let mut b = NodeHandle::member(1);

        let result = graph.create_edge(&mut a, &mut b, attrs());
        assert!(matches!(result, Err(GraphError::SelfLoop(1))));
        assert_eq!(graph.next_edge_id(), 0);
    }

    #[test]
    fn test_from_records_seeds_allocators() {
        let graph = Graph::from_records(
            vec![outdoor(3, 0.0, 0.0, vec![10]), outdoor(8, 1.0, 0.0, vec![10])],
            vec![edge(10, 3, 8)],
            DedupSettings::default(),
        )
        .unwrap();

        assert_eq!(graph.next_node_id(), 9);
        assert_eq!(graph.next_edge_id(), 11);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let result = Graph::from_records(
            vec![outdoor(3, 0.0, 0.0, vec![]), outdoor(3, 1.0, 0.0, vec![])],
            vec![],
            DedupSettings::default(),
        );
        assert!(matches!(result, Err(GraphError::Inconsistent(_))));
    }

    #[test]
    fn test_from_records_rejects_dangling_edge() {
        let result = Graph::from_records(
            vec![outdoor(3, 0.0, 0.0, vec![10])],
            vec![edge(10, 3, 4)],
            DedupSettings::default(),
        );
        assert!(matches!(result, Err(GraphError::Inconsistent(_))));
    }

    #[test]
    fn test_from_records_rejects_stale_adjacency() {
        let result = Graph::from_records(
            vec![outdoor(3, 0.0, 0.0, vec![10]), outdoor(4, 1.0, 0.0, vec![])],
            vec![edge(10, 3, 4)],
            DedupSettings::default(),
        );
        assert!(matches!(result, Err(GraphError::Inconsistent(_))));
    }

    #[test]
    fn test_id_allocator_seed() {
        assert_eq!(IdAllocator::seeded(vec![]).peek(), 0);
        assert_eq!(IdAllocator::seeded(vec![4, 9, 2]).peek(), 10);
    }
}
