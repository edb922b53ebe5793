use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use exthub_core::{validate_extension_name, ExtensionSpec, SourceRef};
use exthub_security::TrustedKey;
use semver::Version;
use serde::Deserialize;

use crate::entry::{
    official_source_name, parse_official_source_name, RegistryEntry, RegistryUpdateWarning,
};

/// Filesystem registry:
///
/// ```text
/// <root>/registry.pub
/// <root>/index/<extension>/entry.toml
/// <root>/index/<extension>/<version>.toml
/// <root>/index/<extension>/<version>.toml.sig
/// ```
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RegistryEntryFile {
    publisher: String,
    #[serde(default)]
    latest: Option<Version>,
    #[serde(default)]
    update_warnings: Vec<RegistryUpdateWarning>,
}

impl RegistryIndex {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve_entry(&self, extension_name: &str) -> Result<RegistryEntry> {
        validate_extension_name(extension_name)?;
        let extension_dir = self.extension_dir(extension_name);
        let entry_path = extension_dir.join("entry.toml");
        if !entry_path.exists() {
            return Err(anyhow!(
                "extension '{extension_name}' is not published in the registry at {}",
                self.root.display()
            ));
        }

        let raw = fs::read_to_string(&entry_path)
            .with_context(|| format!("failed reading registry entry: {}", entry_path.display()))?;
        let file: RegistryEntryFile = toml::from_str(&raw)
            .with_context(|| format!("failed parsing registry entry: {}", entry_path.display()))?;
        if file.publisher.trim().is_empty() || file.publisher.contains('/') {
            return Err(anyhow!(
                "registry entry '{extension_name}' has an invalid publisher: '{}'",
                file.publisher
            ));
        }

        let mut versions = BTreeMap::new();
        for entry in fs::read_dir(&extension_dir).with_context(|| {
            format!(
                "failed reading registry extension directory: {}",
                extension_dir.display()
            )
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|v| v.to_str()) else {
                continue;
            };
            if stem == "entry" {
                continue;
            }

            let Ok(version) = Version::parse(stem) else {
                tracing::warn!(
                    path = %path.display(),
                    "skipping registry file with a non-semver name"
                );
                continue;
            };
            let location = official_source_name(&file.publisher, extension_name, &version);
            versions.insert(version, location);
        }

        tracing::debug!(
            extension = extension_name,
            versions = versions.len(),
            "resolved registry entry"
        );

        Ok(RegistryEntry {
            name: extension_name.to_string(),
            publisher: file.publisher,
            latest: file.latest,
            versions,
            update_warnings: file.update_warnings,
        })
    }

    /// Loads the signed spec behind an official source location.
    pub fn official_source(&self, location: &str) -> Result<SourceRef> {
        let (publisher, extension_name, version) = parse_official_source_name(location)
            .ok_or_else(|| anyhow!("'{location}' is not an official source location"))?;
        let entry = self.resolve_entry(&extension_name)?;
        if entry.publisher != publisher {
            return Err(anyhow!(
                "source '{location}' is not published by '{}'",
                entry.publisher
            ));
        }

        let spec_path = self
            .extension_dir(&extension_name)
            .join(format!("{version}.toml"));
        let spec_bytes = fs::read(&spec_path)
            .with_context(|| format!("failed reading registry spec: {}", spec_path.display()))?;

        let key = self.trusted_key()?;
        let signature_path = spec_path.with_extension("toml.sig");
        let signature_hex = fs::read_to_string(&signature_path).with_context(|| {
            format!(
                "failed reading spec signature for key {}: {}",
                key.key_id(),
                signature_path.display()
            )
        })?;
        let verified = key.verify_hex(&spec_bytes, &signature_hex).with_context(|| {
            format!(
                "failed verifying spec signature for key {}: {}",
                key.key_id(),
                spec_path.display()
            )
        })?;
        if !verified {
            return Err(anyhow!(
                "invalid registry signature for key {}: {}",
                key.key_id(),
                spec_path.display()
            ));
        }

        let raw = String::from_utf8(spec_bytes)
            .with_context(|| format!("registry spec is not UTF-8: {}", spec_path.display()))?;
        let spec = ExtensionSpec::from_toml_str(&raw)
            .with_context(|| format!("failed parsing registry spec: {}", spec_path.display()))?;
        if spec.name != extension_name || spec.version != version {
            return Err(anyhow!(
                "registry spec {} declares {}@{}, expected {extension_name}@{version}",
                spec_path.display(),
                spec.name,
                spec.version
            ));
        }

        Ok(SourceRef {
            name: location.to_string(),
            spec,
        })
    }

    fn extension_dir(&self, extension_name: &str) -> PathBuf {
        self.root.join("index").join(extension_name)
    }

    fn trusted_key(&self) -> Result<TrustedKey> {
        let path = self.root.join("registry.pub");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read trusted registry key: {}", path.display()))?;
        TrustedKey::from_hex(&raw)
            .with_context(|| format!("invalid trusted registry key: {}", path.display()))
    }
}
