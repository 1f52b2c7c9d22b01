use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use navgraph_core::DedupSettings;
use serde::Deserialize;
use tracing::info;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG: &str = "navgraph.yaml";

/// Tool configuration, read from YAML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub nodes: PathBuf,
    pub edges: PathBuf,
    pub buildings: PathBuf,
    /// Directory holding `<building>/<floor>.png`.
    pub floor_plans: PathBuf,
    /// Where the viewer writes its SVG overlays.
    pub overlays: PathBuf,
    pub viewer: ViewerConfig,
    pub dedup: DedupConfig,
    /// File this config was read from, passed on to the viewer.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// How the viewer process is started and fed clicks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Line stream of `px py` clicks from the rendering surface.
    pub clicks: PathBuf,
    /// Viewer executable; defaults to this binary.
    pub program: Option<PathBuf>,
}

/// Merge radii; both must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupConfig {
    pub global_epsilon: f64,
    pub local_epsilon: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: "nodes.json".into(),
            edges: "edges.json".into(),
            buildings: "buildings.json".into(),
            floor_plans: ".".into(),
            overlays: "overlays".into(),
            viewer: ViewerConfig::default(),
            dedup: DedupConfig::default(),
            source: None,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            clicks: "clicks.fifo".into(),
            program: None,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        let d = DedupSettings::default();
        Self {
            global_epsilon: d.global_epsilon,
            local_epsilon: d.local_epsilon,
        }
    }
}

impl From<DedupConfig> for DedupSettings {
    fn from(c: DedupConfig) -> Self {
        DedupSettings {
            global_epsilon: c.global_epsilon,
            local_epsilon: c.local_epsilon,
        }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;
        anyhow::ensure!(
            config.dedup.global_epsilon > 0.0 && config.dedup.local_epsilon > 0.0,
            "dedup epsilons must be positive"
        );
        Ok(config)
    }

    /// Load `path`, or `navgraph.yaml` if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG).exists() => PathBuf::from(DEFAULT_CONFIG),
            None => {
                info!("no config file, using defaults");
                return Ok(Config::default());
            }
        };

        let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let mut config = Config::from_yaml(&s).with_context(|| format!("parse {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        config.source = Some(path);
        Ok(config)
    }

    /// Floor plan image for one floor.
    pub fn floor_plan(&self, building: &str, floor: i32) -> PathBuf {
        self.floor_plans.join(building).join(format!("{}.png", floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("nodes: data/nodes.json\ndedup:\n  local_epsilon: 1.5\n").unwrap();

        assert_eq!(config.nodes, PathBuf::from("data/nodes.json"));
        assert_eq!(config.edges, PathBuf::from("edges.json"));
        assert_eq!(config.dedup.local_epsilon, 1.5);
        assert_eq!(config.dedup.global_epsilon, 0.000_09);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml("nodez: x.json\n").is_err());
    }

    #[test]
    fn test_negative_epsilon_rejected() {
        assert!(Config::from_yaml("dedup:\n  global_epsilon: -1\n").is_err());
    }

    #[test]
    fn test_floor_plan_path() {
        let config = Config::from_yaml("floor_plans: plans\n").unwrap();
        assert_eq!(config.floor_plan("Hall", 2), PathBuf::from("plans/Hall/2.png"));
    }
}
