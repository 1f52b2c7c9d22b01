//! JSON record store for nodes, edges and the building catalog

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use navgraph_core::{Building, Catalog, DedupSettings, Edge, Graph, Node};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::Config;

/// Node, edge and building files named by the config.
#[derive(Debug, Clone)]
pub struct RecordStore {
    nodes: PathBuf,
    edges: PathBuf,
    buildings: PathBuf,
}

impl RecordStore {
    /// Store over explicit paths.
    pub fn new(nodes: impl Into<PathBuf>, edges: impl Into<PathBuf>, buildings: impl Into<PathBuf>) -> Self {
        Self {
            nodes: nodes.into(),
            edges: edges.into(),
            buildings: buildings.into(),
        }
    }

    /// Store over the record paths of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.nodes, &config.edges, &config.buildings)
    }

    /// Node and edge records in file order. Missing files mean an empty graph.
    pub fn load_records(&self) -> Result<(Vec<Node>, Vec<Edge>)> {
        let nodes = read_records(&self.nodes)?;
        let edges = read_records(&self.edges)?;
        Ok((nodes, edges))
    }

    /// Load the records and check them for consistency.
    pub fn load_graph(&self, dedup: DedupSettings) -> Result<Graph> {
        let (nodes, edges) = self.load_records()?;
        Graph::from_records(nodes, edges, dedup)
            .with_context(|| format!("load {} / {}", self.nodes.display(), self.edges.display()))
    }

    /// Replace both record files, or neither.
    ///
    /// Both files are written to temporaries beside their targets first. If
    /// the second rename fails, the first file is put back as it was.
    pub fn save(&self, nodes: &[Node], edges: &[Edge]) -> Result<()> {
        let staged_edges = stage(&self.edges, &to_json(edges)?)?;
        let staged_nodes = stage(&self.nodes, &to_json(nodes)?)?;
        let previous_edges = read_existing(&self.edges)?;

        persist(staged_edges, &self.edges)?;
        if let Err(e) = persist(staged_nodes, &self.nodes) {
            if let Err(undo) = restore(&self.edges, previous_edges) {
                warn!(error = %undo, path = %self.edges.display(), "could not roll back");
            }
            return Err(e);
        }

        info!(nodes = nodes.len(), edges = edges.len(), "saved graph");
        Ok(())
    }

    /// [`RecordStore::save`] for a whole graph.
    pub fn save_graph(&self, graph: &Graph) -> Result<()> {
        self.save(graph.nodes(), graph.edges())
    }

    /// Buildings with validated floor calibrations.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let buildings: Vec<Building> = read_records(&self.buildings)?;
        Catalog::new(buildings).with_context(|| format!("validate {}", self.buildings.display()))
    }
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "record file missing, starting empty");
        return Ok(Vec::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Four-space indented JSON without a trailing newline, matching the files the app bundles.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(out)
}

fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).with_context(|| format!("stage {}", path.display()))?;
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .with_context(|| format!("stage {}", path.display()))?;
    Ok(file)
}

fn persist(file: NamedTempFile, path: &Path) -> Result<()> {
    file.persist(path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

fn restore(path: &Path, previous: Option<Vec<u8>>) -> Result<()> {
    match previous {
        Some(bytes) => persist(stage(path, &bytes)?, path),
        None => fs::remove_file(path).with_context(|| format!("remove {}", path.display())),
    }
}
