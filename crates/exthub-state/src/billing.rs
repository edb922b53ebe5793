use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::current_unix_timestamp;
use crate::layout::{validate_project_id, StateLayout};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_at_unix: Option<u64>,
}

pub fn read_billing_state(layout: &StateLayout, project_id: &str) -> Result<BillingState> {
    validate_project_id(project_id)?;
    let path = layout.billing_path(project_id);
    if !path.exists() {
        return Ok(BillingState::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read billing state: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse billing state: {}", path.display()))
}

pub fn is_billing_enabled(layout: &StateLayout, project_id: &str) -> Result<bool> {
    Ok(read_billing_state(layout, project_id)?.enabled)
}

/// Enabling an already-enabled project keeps the original record.
pub fn enable_billing(layout: &StateLayout, project_id: &str, instance_id: &str) -> Result<()> {
    let state = read_billing_state(layout, project_id)?;
    if state.enabled {
        return Ok(());
    }

    let state = BillingState {
        enabled: true,
        enabled_for_instance: Some(instance_id.to_string()),
        enabled_at_unix: Some(current_unix_timestamp()?),
    };
    let dir = layout.project_dir(project_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create project dir: {}", dir.display()))?;
    let path = layout.billing_path(project_id);
    let content = toml::to_string(&state)
        .with_context(|| format!("failed serializing billing state: {}", path.display()))?;
    fs::write(&path, content)
        .with_context(|| format!("failed to write billing state: {}", path.display()))?;

    tracing::info!(project = project_id, instance = instance_id, "billing enabled");
    Ok(())
}
