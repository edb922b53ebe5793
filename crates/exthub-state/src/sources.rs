use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use exthub_core::{is_url_location, ExtensionSpec, SourceRef};
use exthub_security::short_digest;

use crate::layout::{validate_project_id, StateLayout};

const SPEC_FILE_NAME: &str = "extension.toml";
const SOURCE_ID_LEN: usize = 16;
const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn uploaded_source_name(project_id: &str, source_id: &str) -> String {
    format!("projects/{project_id}/sources/{source_id}")
}

/// Builds and stores a new immutable source from a local directory or URL.
///
/// Sources are content addressed: building the same spec twice yields the
/// same source name.
pub fn create_source_from_location(
    layout: &StateLayout,
    project_id: &str,
    location: &str,
) -> Result<SourceRef> {
    validate_project_id(project_id)?;
    let location = location.trim();
    if location.is_empty() {
        return Err(anyhow!("source location must not be empty"));
    }

    let raw_spec = if is_url_location(location) {
        fetch_remote_spec(location)?
    } else {
        read_local_spec(Path::new(location))?
    };
    let spec = ExtensionSpec::from_toml_str(&raw_spec)
        .with_context(|| format!("invalid extension spec at {location}"))?;

    let source_id = short_digest(raw_spec.as_bytes(), SOURCE_ID_LEN);
    let source = SourceRef {
        name: uploaded_source_name(project_id, &source_id),
        spec,
    };

    let dir = layout.sources_dir(project_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create sources dir: {}", dir.display()))?;
    let path = layout.source_path(project_id, &source_id);
    if !path.exists() {
        let content = toml::to_string(&source)
            .with_context(|| format!("failed serializing source: {}", source.name))?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write source: {}", path.display()))?;
    }

    tracing::debug!(source = %source.name, location, "created source from location");
    Ok(source)
}

pub fn read_source(layout: &StateLayout, source_name: &str) -> Result<SourceRef> {
    let (project_id, source_id) = parse_uploaded_source_name(source_name)
        .ok_or_else(|| anyhow!("'{source_name}' is not an uploaded source name"))?;
    let path = layout.source_path(project_id, source_id);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read source {source_name}: {}", path.display()))?;
    let source: SourceRef = toml::from_str(&raw)
        .with_context(|| format!("failed to parse source: {}", path.display()))?;
    if source.name != source_name {
        return Err(anyhow!(
            "source file {} declares name {}",
            path.display(),
            source.name
        ));
    }
    Ok(source)
}

fn parse_uploaded_source_name(source_name: &str) -> Option<(&str, &str)> {
    let rest = source_name.strip_prefix("projects/")?;
    let (project_id, source_id) = rest.split_once("/sources/")?;
    let valid_id = !source_id.is_empty() && source_id.bytes().all(|b| b.is_ascii_hexdigit());
    if project_id.is_empty() || project_id.contains('/') || !valid_id {
        return None;
    }
    Some((project_id, source_id))
}

fn read_local_spec(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a directory", dir.display()));
    }
    let path = dir.join(SPEC_FILE_NAME);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read extension spec: {}", path.display()))
}

fn fetch_remote_spec(url: &str) -> Result<String> {
    let spec_url = if url.ends_with(".toml") {
        url.to_string()
    } else {
        format!("{}/{SPEC_FILE_NAME}", url.trim_end_matches('/'))
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(REMOTE_FETCH_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(&spec_url)
        .send()
        .with_context(|| format!("failed to fetch extension spec: {spec_url}"))?
        .error_for_status()
        .with_context(|| format!("extension spec request failed: {spec_url}"))?;
    response
        .text()
        .with_context(|| format!("failed to read extension spec body: {spec_url}"))
}
