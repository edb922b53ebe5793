use anyhow::Result;
use exthub_core::{ExtensionInstance, SourceRef};
use exthub_registry::{RegistryEntry, RegistryIndex};
use exthub_state::{
    apply_instance_update, create_source_from_location, enable_billing, is_billing_enabled,
    read_instance, read_source, StateLayout,
};
use exthub_update::{BillingService, InstanceStore, Registry, SourceBuilder, UpdatePayload};

/// Local state directory plus a filesystem registry, serving every
/// collaborator the update workflow needs.
pub struct LocalBackend {
    layout: StateLayout,
    index: RegistryIndex,
}

impl LocalBackend {
    pub fn new(layout: StateLayout, index: RegistryIndex) -> Self {
        Self { layout, index }
    }
}

impl InstanceStore for LocalBackend {
    fn get(&self, project_id: &str, instance_id: &str) -> Result<Option<ExtensionInstance>> {
        read_instance(&self.layout, project_id, instance_id)
    }

    fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &UpdatePayload,
    ) -> Result<ExtensionInstance> {
        apply_instance_update(
            &self.layout,
            project_id,
            instance_id,
            payload.source.clone(),
            payload.params.clone(),
        )
    }
}

impl Registry for LocalBackend {
    fn resolve_entry(&self, extension_name: &str) -> Result<RegistryEntry> {
        self.index.resolve_entry(extension_name)
    }
}

impl SourceBuilder for LocalBackend {
    fn create_from_location(&self, project_id: &str, location: &str) -> Result<SourceRef> {
        create_source_from_location(&self.layout, project_id, location)
    }

    fn get_source(&self, source_name: &str) -> Result<SourceRef> {
        if source_name.starts_with("projects/") {
            read_source(&self.layout, source_name)
        } else {
            self.index.official_source(source_name)
        }
    }
}

impl BillingService for LocalBackend {
    fn is_enabled(&self, project_id: &str) -> Result<bool> {
        is_billing_enabled(&self.layout, project_id)
    }

    fn enable(&self, project_id: &str, instance_id: &str) -> Result<()> {
        enable_billing(&self.layout, project_id, instance_id)
    }
}
