use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: &str = "latest";

/// Official version index for one published extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub publisher: String,
    pub latest: Option<Version>,
    pub versions: BTreeMap<Version, String>,
    pub update_warnings: Vec<RegistryUpdateWarning>,
}

/// Publisher-declared notice shown when updating away from matching versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryUpdateWarning {
    pub from: VersionReq,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl RegistryEntry {
    /// Resolves `"latest"` or a semver requirement to a published version.
    pub fn target_version(&self, selector: &str) -> Result<Version> {
        let selector = selector.trim();
        if selector == LATEST_VERSION {
            return self.latest_version().ok_or_else(|| {
                anyhow!("extension '{}' has no published versions", self.name)
            });
        }

        let requirement = VersionReq::parse(selector).with_context(|| {
            format!("invalid version requirement for '{}': {selector}", self.name)
        })?;
        self.versions
            .keys()
            .filter(|version| requirement.matches(version))
            .max()
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "no published version of '{}' matches '{selector}'",
                    self.name
                )
            })
    }

    pub fn source_location(&self, extension_name: &str, version: &Version) -> Result<String> {
        if extension_name != self.name {
            return Err(anyhow!(
                "registry entry '{}' cannot resolve sources for extension '{extension_name}'",
                self.name
            ));
        }
        self.versions.get(version).cloned().ok_or_else(|| {
            anyhow!(
                "version {version} of '{}' is not published in the registry",
                self.name
            )
        })
    }

    pub fn is_official_source(&self, source_name: &str) -> bool {
        self.versions
            .values()
            .any(|location| location == source_name)
    }

    pub fn warnings_for(&self, current: &Version) -> Vec<&RegistryUpdateWarning> {
        self.update_warnings
            .iter()
            .filter(|warning| warning.from.matches(current))
            .collect()
    }

    fn latest_version(&self) -> Option<Version> {
        if let Some(latest) = &self.latest {
            if self.versions.contains_key(latest) {
                return Some(latest.clone());
            }
        }
        self.versions
            .keys()
            .filter(|version| version.pre.is_empty())
            .max()
            .or_else(|| self.versions.keys().max())
            .cloned()
    }
}

pub fn official_source_name(publisher: &str, extension_name: &str, version: &Version) -> String {
    format!("{publisher}/{extension_name}@{version}")
}

pub fn parse_official_source_name(location: &str) -> Option<(String, String, Version)> {
    let (publisher, rest) = location.split_once('/')?;
    let (name, version) = rest.split_once('@')?;
    if publisher.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    let version = Version::parse(version).ok()?;
    Some((publisher.to_string(), name.to_string(), version))
}
