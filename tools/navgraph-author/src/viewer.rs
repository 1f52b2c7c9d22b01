//! Floor-plan viewer: overlay rendering, the viewer process, and its launcher
//!
//! The viewer runs as a child of the authoring session. It receives a graph
//! snapshot on stdin, writes an SVG overlay of the selected floor, then
//! answers pick requests with the world position of the next click read from
//! the rendering surface's click stream. Run standalone, it reads the record
//! store itself and only echoes clicked positions.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;

use anyhow::{Context as AnyhowContext, Result};
use navgraph_core::pick::{serve_requests, PendingSlot, PickResponder};
use navgraph_core::transform::parse_pixel;
use navgraph_core::{Building, FloorCalibration, Node, NodeId, PickChannel, Snapshot, StreamLink};
use serde::Serialize;
use tera::Tera;
use tracing::{info, warn};

use crate::config::Config;
use crate::store::RecordStore;

const OVERLAY_TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="{{ width }}" height="{{ height }}">
  <title>{{ title }}</title>
  <image href="{{ image }}" x="0" y="0"/>
{% for l in lines %}  <line x1="{{ l.x1 }}" y1="{{ l.y1 }}" x2="{{ l.x2 }}" y2="{{ l.y2 }}" stroke="red" stroke-width="1"/>
{% endfor %}{% for m in markers %}  <circle cx="{{ m.x }}" cy="{{ m.y }}" r="{{ m.r }}" fill="{{ m.fill }}"><title>{{ m.label }}</title></circle>
{% endfor %}</svg>
"#;

const MARGIN: i64 = 20;

/// A node drawn as a circle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: NodeId,
    pub x: i64,
    pub y: i64,
    pub r: u32,
    pub fill: &'static str,
    pub label: String,
}

/// An edge between two visible nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

/// Everything drawn over one floor plan, in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub title: String,
    pub image: String,
    pub width: i64,
    pub height: i64,
    pub markers: Vec<Marker>,
    pub lines: Vec<Line>,
}

impl Overlay {
    /// Project the nodes of `building` on `floor` and the edges between them.
    ///
    /// The building's anchor node lives on the outdoor map and is skipped.
    pub fn build(
        snapshot: &Snapshot,
        building: &Building,
        floor: i32,
        calibration: &FloorCalibration,
        image: String,
    ) -> Self {
        let visible: Vec<&Node> = snapshot
            .nodes
            .iter()
            .filter(|n| n.building_id == building.node_id)
            .filter(|n| n.id != building.node_id)
            .filter(|n| n.floor == Some(floor))
            .collect();

        let pixels: HashMap<NodeId, _> = visible
            .iter()
            .map(|n| (n.id, calibration.world_to_pixel(n.position())))
            .collect();

        let markers: Vec<Marker> = visible
            .iter()
            .map(|n| {
                let p = pixels[&n.id];
                let waypoint = n.is_waypoint();
                Marker {
                    id: n.id,
                    x: p.x,
                    y: p.y,
                    r: if waypoint { 1 } else { 2 },
                    fill: if waypoint { "gray" } else { "blue" },
                    label: if n.name.is_empty() {
                        format!("#{}", n.id)
                    } else {
                        n.name.clone()
                    },
                }
            })
            .collect();

        let mut seen = BTreeSet::new();
        let lines: Vec<Line> = snapshot
            .edges
            .iter()
            .filter_map(|e| {
                let a = pixels.get(&e.start_node_id)?;
                let b = pixels.get(&e.end_node_id)?;
                seen.insert((e.start_node_id, e.end_node_id)).then_some(Line {
                    x1: a.x,
                    y1: a.y,
                    x2: b.x,
                    y2: b.y,
                })
            })
            .collect();

        let width = markers.iter().map(|m| m.x).max().unwrap_or(0).max(calibration.origin_pixel_x) + MARGIN;
        let height = markers.iter().map(|m| m.y).max().unwrap_or(0).max(calibration.origin_pixel_y) + MARGIN;

        Overlay {
            title: format!("{} floor {}", building.name, floor),
            image,
            width,
            height,
            markers,
            lines,
        }
    }

    /// Render through the SVG template; names are escaped.
    pub fn render_svg(&self) -> Result<String> {
        let context = tera::Context::from_serialize(self)?;
        Ok(Tera::one_off(OVERLAY_TEMPLATE, &context, true)?)
    }
}

fn overlay_path(config: &Config, building: &str, floor: i32) -> PathBuf {
    let stem: String = building
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    config.overlays.join(format!("{}-{}.svg", stem, floor))
}

/// Body of the `view` subcommand.
///
/// `standalone` (or a terminal on stdin) means there is no authoring session:
/// the graph comes from the record store and no pick requests are served.
pub fn run_viewer(config: &Config, building_name: &str, floor: i32, standalone: bool) -> Result<()> {
    let catalog = RecordStore::from_config(config).load_catalog()?;
    let building = catalog
        .find(building_name)
        .with_context(|| format!("no building named {:?}", building_name))?;
    let calibration = *building
        .calibration(floor)
        .with_context(|| format!("no data in {} for floor {}", building.name, floor))?;

    let (snapshot, requests) = if standalone || io::stdin().is_terminal() {
        let (nodes, edges) = RecordStore::from_config(config).load_records()?;
        info!("standalone viewer, clicks are echoed only");
        (Snapshot { nodes, edges }, None)
    } else {
        let mut requests = BufReader::new(io::stdin());
        let snapshot = Snapshot::read_line(&mut requests).context("read graph snapshot")?;
        (snapshot, Some(requests))
    };

    let plan = config.floor_plan(&building.name, floor);
    if !plan.exists() {
        warn!(path = %plan.display(), "floor plan image missing");
    }
    let image = fs::canonicalize(&plan).unwrap_or(plan).display().to_string();
    let overlay = Overlay::build(&snapshot, building, floor, &calibration, image);

    fs::create_dir_all(&config.overlays).with_context(|| format!("create {}", config.overlays.display()))?;
    let out = overlay_path(config, &building.name, floor);
    fs::write(&out, overlay.render_svg()?).with_context(|| format!("write {}", out.display()))?;
    info!(
        path = %out.display(),
        nodes = overlay.markers.len(),
        edges = overlay.lines.len(),
        "overlay written"
    );

    let slot = Arc::new(PendingSlot::new());
    if let Some(requests) = requests {
        let requests_slot = Arc::clone(&slot);
        thread::spawn(move || {
            if let Err(e) = serve_requests(requests, &requests_slot) {
                warn!(error = %e, "request channel failed");
            }
            // Authoring session is gone; nothing left to answer.
            std::process::exit(0);
        });
    }

    let clicks_path = &config.viewer.clicks;
    let clicks = File::open(clicks_path).with_context(|| format!("open click source {}", clicks_path.display()))?;
    let mut responder = PickResponder::new(&slot, calibration, io::stdout(), io::stderr());

    for line in BufReader::new(clicks).lines() {
        let line = line.with_context(|| format!("read {}", clicks_path.display()))?;
        match parse_pixel(&line) {
            Some(pixel) => {
                responder.click(pixel)?;
            }
            None if line.trim().is_empty() => {}
            None => warn!(line = line.trim(), "ignoring malformed click"),
        }
    }

    info!("click source closed, viewer exiting");
    Ok(())
}

/// Authoring-side handle on a running viewer. Dropping it kills the process.
pub struct ViewerProcess {
    child: Child,
}

impl ViewerProcess {
    /// Spawn the viewer for one floor and hand it the graph snapshot.
    pub fn launch(config: &Config, building: &str, floor: i32, snapshot: &Snapshot) -> Result<(Self, PickChannel)> {
        let program = match &config.viewer.program {
            Some(p) => p.clone(),
            None => env::current_exe().context("locate viewer executable")?,
        };

        let mut cmd = Command::new(&program);
        if let Some(source) = &config.source {
            cmd.arg("--config").arg(source);
        }
        cmd.arg("view")
            .arg("--building")
            .arg(building)
            .arg(format!("--floor={}", floor))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn viewer {}", program.display()))?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let viewer = ViewerProcess { child };

        let mut stdin = stdin.context("viewer stdin not captured")?;
        let stdout = stdout.context("viewer stdout not captured")?;
        snapshot.write_line(&mut stdin).context("send snapshot to viewer")?;
        info!(pid = viewer.id(), building, floor, "viewer started");

        Ok((viewer, PickChannel::connect(StreamLink::new(BufReader::new(stdout), stdin))))
    }

    /// Process id of the viewer child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether the child has not exited yet.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for ViewerProcess {
    fn drop(&mut self) {
        if self.is_running() {
            info!(pid = self.child.id(), "stopping viewer");
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
