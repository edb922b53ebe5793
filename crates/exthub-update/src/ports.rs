//! Collaborators the workflow sequences but does not implement.
//!
//! Every call is blocking; the workflow never issues two calls at once.

use anyhow::Result;
use exthub_core::{ExtensionInstance, ParamDefinition, SourceRef};
use exthub_registry::RegistryEntry;
use semver::Version;

use crate::changes::SpecChanges;
use crate::executor::UpdatePayload;
use crate::warnings::UpdateWarning;
use crate::workflow::UpdateNotice;

pub trait InstanceStore {
    /// `Ok(None)` when the instance does not exist.
    fn get(&self, project_id: &str, instance_id: &str) -> Result<Option<ExtensionInstance>>;

    fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &UpdatePayload,
    ) -> Result<ExtensionInstance>;
}

pub trait Registry {
    fn resolve_entry(&self, extension_name: &str) -> Result<RegistryEntry>;

    fn resolve_target_version(&self, entry: &RegistryEntry, selector: &str) -> Result<Version> {
        entry.target_version(selector)
    }

    fn resolve_source_location(
        &self,
        entry: &RegistryEntry,
        extension_name: &str,
        version: &Version,
    ) -> Result<String> {
        entry.source_location(extension_name, version)
    }

    fn is_official_source(&self, entry: &RegistryEntry, source_name: &str) -> bool {
        entry.is_official_source(source_name)
    }
}

pub trait SourceBuilder {
    fn create_from_location(&self, project_id: &str, location: &str) -> Result<SourceRef>;

    fn get_source(&self, source_name: &str) -> Result<SourceRef>;
}

pub trait BillingService {
    fn is_enabled(&self, project_id: &str) -> Result<bool>;

    fn enable(&self, project_id: &str, instance_id: &str) -> Result<()>;
}

/// The person (or automation) driving the update.
pub trait Operator {
    fn notify(&self, notice: &UpdateNotice);

    fn confirm_warning(&self, warning: &UpdateWarning) -> Result<bool>;

    fn confirm_retry(&self, instance_id: &str, version: &Version) -> Result<bool>;

    fn present_changes(&self, changes: &SpecChanges);

    fn confirm_changes(&self, changes: &SpecChanges) -> Result<bool>;

    fn prompt_param(
        &self,
        project_id: &str,
        param: &ParamDefinition,
        suggestion: Option<&str>,
    ) -> Result<String>;
}
