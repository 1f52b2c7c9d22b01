//! Interactive authoring session

use anyhow::Result;
use navgraph_core::operator::ask_non_empty;
use navgraph_core::pick::acquire_point;
use navgraph_core::{
    AuthoringContext, Catalog, Graph, GraphError, NodeHandle, Operator, PickChannel, Placement, SessionContext,
    Snapshot,
};
use tracing::{info, warn};

use crate::commands::{CommandRegistry, Flow, UnknownCommand};
use crate::config::Config;
use crate::store::RecordStore;
use crate::viewer::ViewerProcess;

/// What happens to the current node after each edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Walk along the path: the end node becomes the next start.
    Advance,
    /// Fan out: every edge starts at the first node.
    Stay,
}

fn place_node<O: Operator + ?Sized>(
    graph: &mut Graph,
    area: &AuthoringContext,
    picker: &mut PickChannel,
    operator: &mut O,
    prompt: &str,
) -> Result<NodeHandle, GraphError> {
    loop {
        let position = acquire_point(picker, area, operator, prompt)?;
        match graph.create_node(position, area, operator)? {
            Placement::Node(handle) => return Ok(handle),
            Placement::Reenter => continue,
        }
    }
}

/// Enter a path of edges starting from a fresh point until the operator stops.
///
/// Returns the number of edges created.
pub fn author_path<O: Operator + ?Sized>(
    graph: &mut Graph,
    context: &mut SessionContext,
    picker: &mut PickChannel,
    operator: &mut O,
    mode: ChainMode,
) -> Result<usize, GraphError> {
    let mut current = place_node(
        graph,
        &context.area,
        picker,
        operator,
        "Please enter the starting coordinates: ",
    )?;
    let mut created = 0;

    loop {
        let mut next = place_node(graph, &context.area, picker, operator, "Please enter the end coordinates: ")?;
        if next.id() == current.id() {
            operator.tell("The end point is the start node; enter a different end point.")?;
            continue;
        }

        let attrs = context.edges.prompt(operator)?;
        let edge = graph.create_edge(&mut current, &mut next, attrs)?;
        created += 1;
        operator.tell(&format!("Added edge {} from node {} to node {}", edge, current.id(), next.id()))?;

        let answer = operator.ask("Continue? ")?.to_ascii_lowercase();
        if matches!(answer.as_str(), "exit" | "n" | "no" | "stop") {
            break;
        }
        if mode == ChainMode::Advance {
            current = next;
        }
    }

    Ok(created)
}

fn ask_floor<O: Operator + ?Sized>(operator: &mut O) -> Result<i32, GraphError> {
    loop {
        let answer = ask_non_empty(operator, "Enter the building floor: ")?;
        match answer.parse() {
            Ok(floor) => return Ok(floor),
            Err(_) => operator.tell(&format!("{:?} is not a floor number", answer))?,
        }
    }
}

/// One authoring session: loaded records, context, viewer, and the operator.
pub struct Session<O> {
    config: Config,
    store: RecordStore,
    catalog: Catalog,
    graph: Graph,
    context: SessionContext,
    picker: PickChannel,
    viewer: Option<ViewerProcess>,
    operator: O,
    unsaved: usize,
}

impl<O: Operator> Session<O> {
    /// Load the record store and catalog named by `config`.
    pub fn open(config: Config, operator: O) -> Result<Self> {
        let store = RecordStore::from_config(&config);
        let graph = store.load_graph(config.dedup.into())?;
        let catalog = store.load_catalog()?;
        info!(buildings = catalog.buildings().len(), "catalog loaded");

        Ok(Self {
            config,
            store,
            catalog,
            graph,
            context: SessionContext::default(),
            picker: PickChannel::NotConnected,
            viewer: None,
            operator,
            unsaved: 0,
        })
    }

    /// The graph as edited so far, saved or not.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current building/floor selection and edge defaults.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Whether a viewer child is alive, connected or not.
    pub fn viewer_running(&mut self) -> bool {
        self.viewer.as_mut().map_or(false, |v| v.is_running())
    }

    /// Process id of the viewer child, if one was launched and not yet closed.
    pub fn viewer_pid(&self) -> Option<u32> {
        self.viewer.as_ref().map(ViewerProcess::id)
    }

    /// Read commands until `stop` or the end of operator input. Unsaved work is discarded.
    pub fn run(&mut self, registry: &CommandRegistry<Self>) -> Result<()> {
        loop {
            let command = match self.operator.ask("What would you like to do: ") {
                Ok(c) => c.to_ascii_lowercase(),
                Err(GraphError::InputClosed) => break,
                Err(e) => return Err(e.into()),
            };

            if command.is_empty() {
                continue;
            }
            if command == "help" {
                for (name, help) in registry.commands() {
                    self.operator.tell(&format!("  {:<10} {}", name, help))?;
                }
                continue;
            }

            match registry.dispatch(&command, self) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) if e.is::<UnknownCommand>() => {
                    self.operator.tell(&format!("{} (try `help`)", e))?;
                }
                Err(e) if matches!(e.downcast_ref::<GraphError>(), Some(GraphError::InputClosed)) => break,
                Err(e) => return Err(e),
            }
        }

        self.shutdown();
        Ok(())
    }

    /// `add` / `add-stay`: author one path of edges.
    pub fn add(&mut self, mode: ChainMode) -> Result<Flow> {
        let created = author_path(
            &mut self.graph,
            &mut self.context,
            &mut self.picker,
            &mut self.operator,
            mode,
        )?;
        self.unsaved += created;
        Ok(Flow::Continue)
    }

    /// Write the graph to the record store. A failed save is reported, not fatal.
    pub fn save(&mut self) -> Result<Flow> {
        match self.store.save_graph(&self.graph) {
            Ok(()) => {
                self.unsaved = 0;
                self.operator.tell(&format!(
                    "Saved {} nodes and {} edges",
                    self.graph.nodes().len(),
                    self.graph.edges().len()
                ))?;
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                self.operator.tell(&format!("Save failed: {:#}", e))?;
            }
        }
        Ok(Flow::Continue)
    }

    /// `building`: pick a building and floor, or `none` for outdoors.
    pub fn select_building(&mut self) -> Result<Flow> {
        let name = self.operator.ask("Enter the building name (or `none` for outdoors): ")?;
        if name.is_empty() {
            self.operator.tell("No building name given; context unchanged.")?;
            return Ok(Flow::Continue);
        }

        let area = if name.eq_ignore_ascii_case("none") {
            AuthoringContext::Global
        } else {
            let Some(building) = self.catalog.find(&name) else {
                self.operator.tell(&format!("No building named {:?}; context unchanged.", name))?;
                return Ok(Flow::Continue);
            };
            let floor = ask_floor(&mut self.operator)?;
            AuthoringContext::for_floor(building, floor)
        };
        self.enter(area)
    }

    /// `floor`: move to another floor of the current building.
    pub fn select_floor(&mut self) -> Result<Flow> {
        let AuthoringContext::Building { name, .. } = &self.context.area else {
            self.operator.tell("Select a building first.")?;
            return Ok(Flow::Continue);
        };
        let Some(building) = self.catalog.find(name) else {
            self.operator.tell(&format!("Building {:?} is no longer in the catalog.", name))?;
            return Ok(Flow::Continue);
        };

        let floor = ask_floor(&mut self.operator)?;
        let area = AuthoringContext::for_floor(building, floor);
        self.enter(area)
    }

    fn enter(&mut self, area: AuthoringContext) -> Result<Flow> {
        if area != self.context.area && self.viewer.is_some() {
            self.close_viewer();
            self.operator.tell("Context changed; closed the viewer.")?;
        }

        if let AuthoringContext::Building {
            calibration: None, ..
        } = &area
        {
            self.operator.tell("No floor plan calibration for this floor; clicking is unavailable.")?;
        }
        info!(context = %area.describe(), "context selected");
        self.operator.tell(&format!("Authoring {}", area.describe()))?;
        self.context.area = area;
        Ok(Flow::Continue)
    }

    /// `show`: launch the viewer for the current floor.
    pub fn show(&mut self) -> Result<Flow> {
        let (name, floor) = match &self.context.area {
            AuthoringContext::Global => {
                self.operator.tell("Select a building first.")?;
                return Ok(Flow::Continue);
            }
            AuthoringContext::Building {
                name,
                floor,
                calibration: None,
                ..
            } => {
                self.operator.tell(&format!("No data in {} for floor {}", name, floor))?;
                return Ok(Flow::Continue);
            }
            AuthoringContext::Building { name, floor, .. } => (name.clone(), *floor),
        };

        if self.viewer_running() && self.picker.is_connected() {
            self.operator.tell("The viewer is already running.")?;
            return Ok(Flow::Continue);
        }
        // a live child with a dead channel is useless; replace it
        self.close_viewer();

        let snapshot = Snapshot {
            nodes: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
        };
        match ViewerProcess::launch(&self.config, &name, floor, &snapshot) {
            Ok((viewer, picker)) => {
                self.viewer = Some(viewer);
                self.picker = picker;
                self.operator.tell(&format!("Viewer started for {} floor {}", name, floor))?;
            }
            Err(e) => {
                warn!(error = %e, "viewer launch failed");
                self.operator.tell(&format!("Could not start the viewer: {:#}", e))?;
            }
        }
        Ok(Flow::Continue)
    }

    /// `stop`: end the session, discarding unsaved edges.
    pub fn stop(&mut self) -> Result<Flow> {
        if self.unsaved > 0 {
            self.operator
                .tell(&format!("Discarding {} unsaved edge(s).", self.unsaved))?;
        }
        Ok(Flow::Stop)
    }

    fn close_viewer(&mut self) {
        self.picker.disconnect();
        self.viewer = None;
    }

    fn shutdown(&mut self) {
        if self.unsaved > 0 {
            warn!(edges = self.unsaved, "session ended with unsaved changes");
        }
        self.close_viewer();
        info!("session ended");
    }
}

impl<O: Operator + 'static> Session<O> {
    /// The command table for [`Session::run`].
    pub fn registry() -> CommandRegistry<Self> {
        let mut registry = CommandRegistry::new();
        registry.register("add", "start a new path from a fresh point", |s: &mut Self| {
            s.add(ChainMode::Advance)
        });
        registry.register("add-stay", "fan out several edges from one point", |s: &mut Self| {
            s.add(ChainMode::Stay)
        });
        registry.register("save", "write nodes and edges to disk", |s: &mut Self| s.save());
        registry.register("building", "choose the building and floor to author in", |s: &mut Self| {
            s.select_building()
        });
        registry.register("floor", "change floor within the current building", |s: &mut Self| {
            s.select_floor()
        });
        registry.register("show", "open the floor plan viewer", |s: &mut Self| s.show());
        registry.register("stop", "end the session without saving", |s: &mut Self| s.stop());
        registry
    }
}
