//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the per-data-root config file
pub const PROJECT_CONFIG_FILE: &str = ".bomdex.yaml";

/// Thresholds for description token-overlap matching
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum number of shared tokens
    pub min_overlap_tokens: usize,
    /// Minimum score of the best candidate
    pub min_score: f64,
    /// Required lead of the best score over the runner-up
    pub min_margin: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_overlap_tokens: 2,
            min_score: 0.35,
            min_margin: 0.20,
        }
    }
}

/// Settings threaded through indexing, matching and explosion
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Folder holding the BOM folder and the document folders
    pub data_root: PathBuf,
    /// SQLite index file
    pub db_path: PathBuf,
    /// BOM folder name under the data root
    pub bom_folder: String,
    /// Document folder names under the data root
    pub document_folders: Vec<String>,
    /// Enables revision suggestions
    pub developer_mode: bool,
    pub max_explosion_depth: usize,
    pub header_scan_rows: usize,
    pub matching: MatchingConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            db_path: Self::default_db_path(),
            bom_folder: "BOMS".to_string(),
            document_folders: ["PDF", "STEP-DXF", "STEP", "SOP", "OVERIG"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            developer_mode: false,
            max_explosion_depth: 20,
            header_scan_rows: 30,
            matching: MatchingConfig::default(),
        }
    }
}

/// One config layer as read from a YAML file; unset keys leave the
/// lower layer untouched
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub data_root: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub bom_folder: Option<String>,
    pub document_folders: Option<Vec<String>>,
    pub developer_mode: Option<bool>,
    pub max_explosion_depth: Option<usize>,
    pub header_scan_rows: Option<usize>,
    pub matching: Option<MatchingConfig>,
}

impl ConfigLayer {
    /// Read a layer from a YAML file. Missing or malformed files yield None.
    pub fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<ConfigLayer>(&contents) {
            Ok(layer) => Some(layer),
            Err(e) => {
                tracing::warn!("ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Layer built from BOMDEX_* environment variables
    pub fn from_env() -> Self {
        ConfigLayer {
            data_root: std::env::var_os("BOMDEX_DATA_ROOT").map(PathBuf::from),
            db_path: std::env::var_os("BOMDEX_DB").map(PathBuf::from),
            developer_mode: std::env::var("BOMDEX_DEVELOPER_MODE")
                .ok()
                .and_then(|v| parse_flag(&v)),
            ..Default::default()
        }
    }
}

impl IndexConfig {
    /// Load configuration from all sources, merging in priority order.
    /// `overrides` holds command-line values and wins over everything.
    pub fn load(overrides: ConfigLayer) -> Self {
        // 1. Built-in defaults
        let mut config = IndexConfig::default();

        // 2. Global user config (~/.config/bomdex/config.yaml)
        if let Some(global) = Self::global_config_path().and_then(|p| ConfigLayer::from_file(&p)) {
            config.merge(global);
        }

        let env = ConfigLayer::from_env();

        // 3. Data root config; the root itself may come from any layer
        let data_root = overrides
            .data_root
            .clone()
            .or_else(|| env.data_root.clone())
            .unwrap_or_else(|| config.data_root.clone());
        if let Some(project) = ConfigLayer::from_file(&data_root.join(PROJECT_CONFIG_FILE)) {
            config.merge(project);
        }
        config.data_root = data_root;

        // 4. Environment variables
        config.merge(env);

        // 5. Command line
        config.merge(overrides);

        config
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bomdex")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn default_db_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "bomdex")
            .map(|dirs| dirs.data_dir().join("bomdex.db"))
            .unwrap_or_else(|| PathBuf::from("bomdex.db"))
    }

    /// Merge a layer into this config (the layer takes precedence)
    pub fn merge(&mut self, other: ConfigLayer) {
        if let Some(data_root) = other.data_root {
            self.data_root = data_root;
        }
        if let Some(db_path) = other.db_path {
            self.db_path = db_path;
        }
        if let Some(bom_folder) = other.bom_folder {
            self.bom_folder = bom_folder;
        }
        if let Some(folders) = other.document_folders {
            self.document_folders = folders;
        }
        if let Some(developer_mode) = other.developer_mode {
            self.developer_mode = developer_mode;
        }
        if let Some(depth) = other.max_explosion_depth {
            self.max_explosion_depth = depth;
        }
        if let Some(rows) = other.header_scan_rows {
            self.header_scan_rows = rows;
        }
        if let Some(matching) = other.matching {
            self.matching = matching;
        }
    }

    /// Config rooted at `data_root` with the index stored inside it
    pub fn for_data_root(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        IndexConfig {
            db_path: data_root.join("bomdex.db"),
            data_root,
            ..Default::default()
        }
    }

    /// Fail unless developer mode is on; `feature` names what was refused
    pub fn require_developer_mode(&self, feature: &str) -> miette::Result<()> {
        if self.developer_mode {
            return Ok(());
        }
        Err(miette::miette!(
            code = "bomdex::developer_mode",
            help = "set developer_mode: true in the config or BOMDEX_DEVELOPER_MODE=1",
            "{} is only available in developer mode",
            feature
        ))
    }

    pub fn bom_root(&self) -> PathBuf {
        self.data_root.join(&self.bom_folder)
    }

    pub fn document_roots(&self) -> Vec<PathBuf> {
        self.document_folders
            .iter()
            .map(|folder| self.data_root.join(folder))
            .collect()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
