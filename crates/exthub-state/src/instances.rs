use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use exthub_core::{validate_instance_id, ExtensionInstance, SourceRef};

use crate::current_unix_timestamp;
use crate::layout::{validate_project_id, StateLayout};

pub fn read_instance(
    layout: &StateLayout,
    project_id: &str,
    instance_id: &str,
) -> Result<Option<ExtensionInstance>> {
    validate_project_id(project_id)?;
    validate_instance_id(instance_id)?;

    let path = layout.instance_path(project_id, instance_id);
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read instance record: {}", path.display()))?;
    let instance: ExtensionInstance = toml::from_str(&raw)
        .with_context(|| format!("failed to parse instance record: {}", path.display()))?;
    if instance.project_id != project_id || instance.instance_id != instance_id {
        return Err(anyhow!(
            "instance record {} belongs to {}/{}",
            path.display(),
            instance.project_id,
            instance.instance_id
        ));
    }
    Ok(Some(instance))
}

pub fn write_instance(layout: &StateLayout, instance: &ExtensionInstance) -> Result<PathBuf> {
    validate_project_id(&instance.project_id)?;
    validate_instance_id(&instance.instance_id)?;

    let dir = layout.instances_dir(&instance.project_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create instances dir: {}", dir.display()))?;

    let path = layout.instance_path(&instance.project_id, &instance.instance_id);
    let content = toml::to_string(instance)
        .with_context(|| format!("failed serializing instance record: {}", path.display()))?;
    let part_path = path.with_extension("toml.part");
    fs::write(&part_path, content)
        .with_context(|| format!("failed to write instance record: {}", part_path.display()))?;
    fs::rename(&part_path, &path)
        .with_context(|| format!("failed to replace instance record: {}", path.display()))?;
    Ok(path)
}

pub fn list_instances(layout: &StateLayout, project_id: &str) -> Result<Vec<ExtensionInstance>> {
    validate_project_id(project_id)?;
    let dir = layout.instances_dir(project_id);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut instances = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read instances dir: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("toml") {
            continue;
        }
        let Some(instance_id) = path.file_stem().and_then(|v| v.to_str()) else {
            continue;
        };
        if let Some(instance) = read_instance(layout, project_id, instance_id)? {
            instances.push(instance);
        }
    }

    instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
    Ok(instances)
}

/// Points an existing instance at `source`. `params` replaces the whole
/// params map when present and leaves it untouched when absent.
pub fn apply_instance_update(
    layout: &StateLayout,
    project_id: &str,
    instance_id: &str,
    source: SourceRef,
    params: Option<BTreeMap<String, String>>,
) -> Result<ExtensionInstance> {
    let mut instance = read_instance(layout, project_id, instance_id)?.ok_or_else(|| {
        anyhow!("no extension instance {instance_id} found in project {project_id}")
    })?;

    instance.config.source = source;
    if let Some(params) = params {
        instance.config.params = params;
    }
    instance.updated_at_unix = current_unix_timestamp()?;
    write_instance(layout, &instance)?;

    tracing::info!(
        project = project_id,
        instance = instance_id,
        source = %instance.config.source.name,
        "instance record updated"
    );
    Ok(instance)
}
