use exthub_core::{is_url_location, ExtensionInstance, SourceRef};
use exthub_registry::{RegistryEntry, LATEST_VERSION};

use crate::error::UpdateError;
use crate::ports::{Registry, SourceBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProvenance {
    Official,
    Local,
    Url,
}

impl SourceProvenance {
    pub fn for_override(location: &str) -> Self {
        if is_url_location(location) {
            Self::Url
        } else {
            Self::Local
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Local => "local",
            Self::Url => "url",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source: SourceRef,
    pub provenance: SourceProvenance,
    /// Registry location or the override path/URL the source was built from.
    pub location: String,
    /// Entry for the installed extension. Always present on the official
    /// path; on the override path `None` means the lookup failed.
    pub registry_entry: Option<RegistryEntry>,
    /// Whether the installed source is one of the registry's official sources.
    pub was_official: bool,
}

pub struct SourceResolver<'a> {
    registry: &'a dyn Registry,
    sources: &'a dyn SourceBuilder,
    allow_override: bool,
}

impl<'a> SourceResolver<'a> {
    pub fn new(
        registry: &'a dyn Registry,
        sources: &'a dyn SourceBuilder,
        allow_override: bool,
    ) -> Self {
        Self {
            registry,
            sources,
            allow_override,
        }
    }

    /// The override that will actually be honored.
    pub fn effective_override<'l>(&self, override_location: Option<&'l str>) -> Option<&'l str> {
        if self.allow_override {
            override_location
        } else {
            None
        }
    }

    pub fn resolve(
        &self,
        project_id: &str,
        instance: &ExtensionInstance,
        override_location: Option<&str>,
    ) -> Result<ResolvedSource, UpdateError> {
        match self.effective_override(override_location) {
            Some(location) => self.resolve_override(project_id, instance, location),
            None => self.resolve_official(instance),
        }
    }

    fn resolve_official(&self, instance: &ExtensionInstance) -> Result<ResolvedSource, UpdateError> {
        let current = instance.spec();
        let entry = self.registry.resolve_entry(&current.name).map_err(|err| {
            tracing::debug!(
                extension = %current.name,
                error = %format!("{err:#}"),
                "registry entry did not resolve"
            );
            UpdateError::NoLocalOrUrlSource {
                instance_id: instance.instance_id.clone(),
            }
        })?;

        let target_version = self.registry.resolve_target_version(&entry, LATEST_VERSION)?;
        let location =
            self.registry
                .resolve_source_location(&entry, &current.name, &target_version)?;
        let source = self.sources.get_source(&location)?;
        if source.spec.name != current.name {
            return Err(anyhow::anyhow!(
                "registry source {location} declares extension '{}', expected '{}'",
                source.spec.name,
                current.name
            )
            .into());
        }

        let was_official = self
            .registry
            .is_official_source(&entry, instance.source_name());
        tracing::debug!(location = %location, version = %target_version, "resolved official source");

        Ok(ResolvedSource {
            source,
            provenance: SourceProvenance::Official,
            location,
            registry_entry: Some(entry),
            was_official,
        })
    }

    fn resolve_override(
        &self,
        project_id: &str,
        instance: &ExtensionInstance,
        location: &str,
    ) -> Result<ResolvedSource, UpdateError> {
        let provenance = SourceProvenance::for_override(location);
        let source = self
            .sources
            .create_from_location(project_id, location)
            .map_err(|err| UpdateError::InvalidOverrideSource {
                instance_id: instance.instance_id.clone(),
                location: location.to_string(),
                source: err,
            })?;

        let registry_entry = match self.registry.resolve_entry(&instance.spec().name) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(
                    extension = %instance.spec().name,
                    error = %format!("{err:#}"),
                    "installed extension is not in the registry; treating it as non-official"
                );
                None
            }
        };
        let was_official = registry_entry
            .as_ref()
            .is_some_and(|entry| self.registry.is_official_source(entry, instance.source_name()));

        Ok(ResolvedSource {
            source,
            provenance,
            location: location.to_string(),
            registry_entry,
            was_official,
        })
    }
}
