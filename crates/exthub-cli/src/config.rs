use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use exthub_state::{default_state_root, StateLayout};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONSOLE_BASE_URL: &str = "https://console.exthub.dev";

/// `<state-root>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_base_url: Option<String>,
    pub previews: PreviewsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewsConfig {
    pub extdev: bool,
}

impl ConfigFile {
    /// A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed parsing config: {}", path.display()))
    }
}

/// Values given on the command line. Each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub state_root: Option<PathBuf>,
    pub registry_root: Option<PathBuf>,
    pub project: Option<String>,
    pub config_path: Option<PathBuf>,
    pub extdev: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExthubConfig {
    pub config_path: PathBuf,
    pub state_root: PathBuf,
    pub registry_root: PathBuf,
    pub project: Option<String>,
    pub console_base_url: String,
    pub extdev: bool,
}

impl ExthubConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let state_root = match overrides.state_root {
            Some(root) => root,
            None => default_state_root()?,
        };
        let config_path = overrides
            .config_path
            .unwrap_or_else(|| StateLayout::new(&state_root).config_path());
        let file = ConfigFile::load(&config_path)?;

        let registry_root = overrides
            .registry_root
            .or(file.registry_root)
            .unwrap_or_else(|| state_root.join("registry"));
        let project = overrides
            .project
            .or(file.project)
            .filter(|project| !project.trim().is_empty());
        let console_base_url = file
            .console_base_url
            .unwrap_or_else(|| DEFAULT_CONSOLE_BASE_URL.to_string());

        Ok(Self {
            config_path,
            state_root,
            registry_root,
            project,
            console_base_url,
            extdev: overrides.extdev || file.previews.extdev,
        })
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout::new(&self.state_root)
    }

    pub fn require_project(&self) -> Result<&str> {
        self.project.as_deref().ok_or_else(|| {
            anyhow!(
                "no project selected: pass --project or set `project` in {}",
                self.config_path.display()
            )
        })
    }
}
