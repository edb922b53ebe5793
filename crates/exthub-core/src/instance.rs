use std::collections::BTreeMap;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::spec::{is_identifier_token, ExtensionSpec};

/// An immutable, addressable extension source. Updating an instance points
/// it at a different `SourceRef`; sources are never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub name: String,
    pub spec: ExtensionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    pub source: SourceRef,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionInstance {
    pub project_id: String,
    pub instance_id: String,
    pub config: InstanceConfig,
    #[serde(default)]
    pub created_at_unix: u64,
    #[serde(default)]
    pub updated_at_unix: u64,
}

impl ExtensionInstance {
    pub fn spec(&self) -> &ExtensionSpec {
        &self.config.source.spec
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.config.params
    }

    pub fn source_name(&self) -> &str {
        &self.config.source.name
    }
}

pub fn validate_instance_id(instance_id: &str) -> anyhow::Result<()> {
    if instance_id.trim().is_empty() {
        return Err(anyhow!("instance id must not be empty"));
    }
    if !is_identifier_token(instance_id) {
        return Err(anyhow!(
            "invalid instance id '{instance_id}': use lowercase letters, digits and '-' (max 64 chars)"
        ));
    }
    Ok(())
}

/// Override locations starting with an http(s) scheme are URLs; anything else
/// is a local directory.
pub fn is_url_location(location: &str) -> bool {
    let location = location.trim();
    location.starts_with("https://") || location.starts_with("http://")
}
