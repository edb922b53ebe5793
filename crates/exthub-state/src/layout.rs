use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// On-disk layout of the local project state that stands in for the hosted
/// instance and billing services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.projects_dir().join(project_id)
    }

    pub fn instances_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("instances")
    }

    pub fn instance_path(&self, project_id: &str, instance_id: &str) -> PathBuf {
        self.instances_dir(project_id)
            .join(format!("{instance_id}.toml"))
    }

    pub fn sources_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("sources")
    }

    pub fn source_path(&self, project_id: &str, source_id: &str) -> PathBuf {
        self.sources_dir(project_id).join(format!("{source_id}.toml"))
    }

    pub fn billing_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join("billing.toml")
    }
}

pub fn default_state_root() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("EXTHUB_HOME") {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state root")?;
        return Ok(PathBuf::from(app_data).join("Exthub"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".exthub"))
}

pub(crate) fn validate_project_id(project_id: &str) -> Result<()> {
    let valid = !project_id.is_empty()
        && project_id.len() <= 64
        && project_id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        anyhow::bail!("invalid project id '{project_id}'");
    }
    Ok(())
}
