use std::collections::BTreeMap;

use exthub_core::{ExtensionInstance, SourceRef};

use crate::error::UpdateError;
use crate::ports::InstanceStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePayload {
    pub source: SourceRef,
    /// `None` leaves the stored parameters untouched.
    pub params: Option<BTreeMap<String, String>>,
}

pub fn build_update_payload(
    source: SourceRef,
    new_params: &BTreeMap<String, String>,
    current_params: &BTreeMap<String, String>,
) -> UpdatePayload {
    let params = (new_params != current_params).then(|| new_params.clone());
    UpdatePayload { source, params }
}

pub fn execute_update(
    store: &dyn InstanceStore,
    project_id: &str,
    instance_id: &str,
    payload: &UpdatePayload,
) -> Result<ExtensionInstance, UpdateError> {
    let instance = store.update(project_id, instance_id, payload)?;
    Ok(instance)
}

pub fn console_url(base_url: &str, project_id: &str, instance_id: &str) -> String {
    format!(
        "{}/project/{project_id}/extensions/instances/{instance_id}?tab=usage",
        base_url.trim_end_matches('/')
    )
}
